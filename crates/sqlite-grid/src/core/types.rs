use std::collections::HashMap;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::identifier::Identifier;

/// One raw result row keyed by result column name.
pub type DbRow = HashMap<String, Value>;

/// A looked-up record rendered to display strings.
pub type Record = HashMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<DbRow>,
}

// Schema

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub name: String,
    pub declared_type: String,
    pub is_primary_key: bool,
}

impl SchemaColumn {
    pub fn is_text(&self) -> bool {
        let t = self.declared_type.to_ascii_lowercase();
        ["text", "char", "clob"].iter().any(|k| t.contains(k))
    }

    pub fn is_numeric(&self) -> bool {
        let t = self.declared_type.to_ascii_lowercase();
        ["int", "real", "double"].iter().any(|k| t.contains(k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

/// Columns and foreign keys of one table, read once per request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub table: Identifier,
    pub columns: Vec<SchemaColumn>,
    pub foreign_keys: Vec<ForeignKeyRef>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn foreign_key(&self, column: &str) -> Option<&ForeignKeyRef> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.from_column.eq_ignore_ascii_case(column))
    }

    /// Key column used for row ids and record lookups: `{prefix}{table}` if present,
    /// else the first declared primary key, else the first column.
    pub fn primary_key_column(&self, pk_prefix: &str) -> Option<&SchemaColumn> {
        let synthetic = format!("{pk_prefix}{}", self.table);
        self.column(&synthetic)
            .or_else(|| self.columns.iter().find(|c| c.is_primary_key))
            .or_else(|| self.columns.first())
    }

    /// First text column that is not the key column.
    pub fn first_text_column(&self, pk_prefix: &str) -> Option<&SchemaColumn> {
        let key = self.primary_key_column(pk_prefix).map(|c| c.name.as_str());
        self.columns
            .iter()
            .find(|c| c.is_text() && Some(c.name.as_str()) != key)
    }
}

// Grid model

/// Relationship detected for one column. The foreign side is only present when
/// the column really is a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyInfo {
    table_name: String,
    column_name: String,
    is_foreign_key: bool,
    foreign_table: Option<String>,
    foreign_column: Option<String>,
}

impl ForeignKeyInfo {
    pub fn linked(table: &str, column: &str, foreign_table: &str, foreign_column: &str) -> Self {
        Self {
            table_name: table.to_string(),
            column_name: column.to_string(),
            is_foreign_key: true,
            foreign_table: Some(foreign_table.to_string()),
            foreign_column: Some(foreign_column.to_string()),
        }
    }

    pub fn unlinked(table: &str, column: &str) -> Self {
        Self {
            table_name: table.to_string(),
            column_name: column.to_string(),
            is_foreign_key: false,
            foreign_table: None,
            foreign_column: None,
        }
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn is_foreign_key(&self) -> bool {
        self.is_foreign_key
    }

    pub fn foreign_table(&self) -> Option<&str> {
        self.foreign_table.as_deref()
    }

    pub fn foreign_column(&self) -> Option<&str> {
        self.foreign_column.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    pub table_name: String,
    pub display_name: String,
    pub internal_name: String,
    pub ordinal: usize,
    pub is_last_column: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_foreign_key: Option<ForeignKeyInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub row_id: i64,
    #[serde(rename = "values")]
    pub values_by_column_name: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Only `desc` (any case) sorts descending; everything else is ascending.
    pub fn parse_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRequest {
    pub table_name: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub search_column: Option<String>,
    #[serde(default)]
    pub sort_field: String,
    #[serde(default = "default_sort_direction")]
    pub sort_direction: String,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> usize {
    20
}

fn default_sort_direction() -> String {
    "asc".to_string()
}

impl GridRequest {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            page: default_page(),
            page_size: default_page_size(),
            search_term: String::new(),
            search_column: None,
            sort_field: String::new(),
            sort_direction: default_sort_direction(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridResult {
    pub columns: Vec<ColumnDescriptor>,
    #[serde(rename = "items")]
    pub rows: Vec<GridRow>,
    pub current_page: i64,
    pub page_size: usize,
    pub total_count: u64,
    pub total_pages: u64,
    pub search_term: String,
    pub search_column: Option<String>,
    pub sort_field: String,
    pub sort_direction: SortDirection,
    pub table_name: String,
}

/// `ceil(total / page_size)`; zero rows means zero pages.
pub fn total_pages(total_count: u64, page_size: usize) -> u64 {
    let page_size = page_size.max(1) as u64;
    total_count.div_ceil(page_size)
}

/// Wire shape of a grid answer: the result flattened next to `success`, or a message.
#[derive(Debug, Serialize)]
pub struct GridEnvelope {
    pub success: bool,
    #[serde(flatten)]
    pub result: Option<GridResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GridEnvelope {
    pub fn ok(result: GridResult) -> Self {
        Self {
            success: true,
            result: Some(result),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Limits {
    pub page_size: usize,
}
