use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "sqlite-grid")]
pub struct Args {
    /// Logging level (stderr). Also supports RUST_LOG.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Page size used when a grid request does not specify one.
    #[arg(long, default_value_t = 20)]
    pub default_page_size: usize,

    /// Upper bound applied to requested page sizes.
    #[arg(long, default_value_t = 500)]
    pub max_page_size: usize,

    /// Soft timeout for a single request. In-flight statements are interrupted when it expires.
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Allowed directory whitelist (repeatable).
    #[arg(long)]
    pub allowed_dir: Vec<PathBuf>,

    /// Name prefix of synthetic primary-key columns (e.g. `Id_Users`).
    #[arg(long, default_value = "Id_")]
    pub pk_prefix: String,

    /// Column shown in place of foreign ids pointing at TABLE (repeatable, TABLE=COLUMN).
    #[arg(long, value_parser = parse_display_column)]
    pub display_column: Vec<(String, String)>,

    /// Do not install the built-in `Users=Username` display mapping.
    #[arg(long)]
    pub no_default_display_columns: bool,
}

fn parse_display_column(s: &str) -> Result<(String, String), String> {
    let (table, column) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=COLUMN, got {s:?}"))?;
    let (table, column) = (table.trim(), column.trim());
    if table.is_empty() || column.is_empty() {
        return Err(format!("expected TABLE=COLUMN, got {s:?}"));
    }
    Ok((table.to_string(), column.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_column_pairs_are_parsed() {
        let args = Args::parse_from([
            "sqlite-grid",
            "--display-column",
            "Teams=Name",
            "--display-column",
            " Users = Email ",
        ]);
        assert_eq!(
            args.display_column,
            vec![
                ("Teams".to_string(), "Name".to_string()),
                ("Users".to_string(), "Email".to_string()),
            ]
        );
        assert_eq!(args.default_page_size, 20);
        assert_eq!(args.pk_prefix, "Id_");
    }

    #[test]
    fn malformed_display_column_is_rejected() {
        assert!(Args::try_parse_from(["sqlite-grid", "--display-column", "Teams"]).is_err());
        assert!(Args::try_parse_from(["sqlite-grid", "--display-column", "=Name"]).is_err());
    }
}
