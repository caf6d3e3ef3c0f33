use std::collections::HashMap;

use crate::{
    cli::Args,
    core::identifier::Identifier,
    error::{AppError, AppResult},
};

/// Engine settings shared by every request of a process.
#[derive(Debug, Clone)]
pub struct GridConfig {
    /// Prefix of synthetic key columns, hidden from the visible grid.
    pub pk_prefix: String,
    /// Lowercased target table -> column shown in place of a foreign id.
    display_columns: HashMap<String, String>,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        let mut display_columns = HashMap::new();
        display_columns.insert("users".to_string(), "Username".to_string());
        Self {
            pk_prefix: "Id_".to_string(),
            display_columns,
            default_page_size: 20,
            max_page_size: 500,
        }
    }
}

impl GridConfig {
    pub fn from_args(args: &Args) -> AppResult<Self> {
        if args.default_page_size == 0 || args.max_page_size == 0 {
            return Err(AppError::InvalidRequest("page sizes must be positive".into()));
        }

        let mut cfg = Self {
            pk_prefix: args.pk_prefix.clone(),
            default_page_size: args.default_page_size,
            max_page_size: args.max_page_size,
            ..Self::default()
        };
        if args.no_default_display_columns {
            cfg.display_columns.clear();
        }
        for (table, column) in &args.display_column {
            cfg.set_display_column(table, column)?;
        }
        Ok(cfg)
    }

    pub fn set_display_column(&mut self, table: &str, column: &str) -> AppResult<()> {
        let table = Identifier::parse(table)?;
        let column = Identifier::parse(column)?;
        self.display_columns
            .insert(table.as_str().to_ascii_lowercase(), column.to_string());
        Ok(())
    }

    pub fn display_column(&self, table: &str) -> Option<&str> {
        self.display_columns
            .get(&table.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn default_maps_users_to_username() {
        let cfg = GridConfig::default();
        assert_eq!(cfg.display_column("USERS"), Some("Username"));
        assert!(cfg.display_column("Teams").is_none());
    }

    #[test]
    fn args_extend_and_override_mappings() {
        let args = Args::parse_from([
            "sqlite-grid",
            "--no-default-display-columns",
            "--display-column",
            "Teams=Name",
            "--pk-prefix",
            "Key_",
        ]);
        let cfg = GridConfig::from_args(&args).unwrap();
        assert!(cfg.display_column("Users").is_none());
        assert_eq!(cfg.display_column("teams"), Some("Name"));
        assert_eq!(cfg.pk_prefix, "Key_");
    }

    #[test]
    fn invalid_mapping_is_rejected() {
        let args = Args::parse_from(["sqlite-grid", "--display-column", "Teams=Name;--"]);
        assert!(matches!(
            GridConfig::from_args(&args),
            Err(AppError::InvalidIdentifier(_))
        ));
    }
}
