use std::fmt;

use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Returns true for non-empty names made only of `[A-Za-z0-9_]`.
///
/// Table and column names cannot be bound as parameters, so this check is the
/// only thing standing between request input and the SQL text.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// A table or column name that passed [`is_valid_identifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(s: &str) -> AppResult<Self> {
        if is_valid_identifier(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(AppError::InvalidIdentifier(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text. Validation already rules out embedded quotes.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["Users", "Id_Users", "review_2024", "_x", "42"] {
            assert!(is_valid_identifier(name), "{name}");
        }
    }

    #[test]
    fn rejects_injection_attempts() {
        for name in [
            "",
            "Users; DROP TABLE Users",
            "Users--",
            "Users ",
            "\"Users\"",
            "main.Users",
            "Us'ers",
            "Üsers",
        ] {
            assert!(!is_valid_identifier(name), "{name:?}");
            assert!(matches!(
                Identifier::parse(name),
                Err(AppError::InvalidIdentifier(n)) if n == name
            ));
        }
    }

    #[test]
    fn quoted_wraps_in_double_quotes() {
        let id = Identifier::parse("Order").unwrap();
        assert_eq!(id.quoted(), "\"Order\"");
        assert!(id.eq_ignore_case("order"));
    }
}
