use rusqlite::types::Value;

use crate::core::identifier::Identifier;

/// Named parameters in rusqlite form (`"@name"`, value).
pub type SqlParams = Vec<(String, Value)>;

/// SQL text plus its bound parameters.
///
/// Text can only come from `&'static str` literals and validated [`Identifier`]s;
/// anything else has to go through [`SqlFragment::push_param`] and ends up bound,
/// never spliced into the statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    sql: String,
    params: SqlParams,
}

impl SqlFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: &'static str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    pub fn push_ident(&mut self, ident: &Identifier) -> &mut Self {
        self.sql.push_str(&ident.quoted());
        self
    }

    /// Writes `@name` and binds `value` to it. Rebinding a name replaces the earlier value.
    pub fn push_param(&mut self, name: &'static str, value: impl Into<Value>) -> &mut Self {
        let key = format!("@{name}");
        self.sql.push_str(&key);
        self.bind(key, value.into());
        self
    }

    fn bind(&mut self, key: String, value: Value) {
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
    }

    /// Appends another fragment, separated by a single space when both sides are non-empty.
    pub fn append(&mut self, other: SqlFragment) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        if !self.sql.is_empty() && !self.sql.ends_with(' ') {
            self.sql.push(' ');
        }
        self.push_fragment(other)
    }

    /// Appends another fragment verbatim and takes over its bindings.
    pub fn push_fragment(&mut self, other: SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        for (key, value) in other.params {
            self.bind(key, value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    #[cfg(test)]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|(k, _)| k.strip_prefix('@') == Some(name))
            .map(|(_, v)| v)
    }
}
