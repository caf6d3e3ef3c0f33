use rusqlite::types::Value;

use crate::{
    core::{
        executor::SqlExecutor,
        identifier::Identifier,
        sql::SqlFragment,
        types::{ForeignKeyInfo, ForeignKeyRef, SchemaColumn, TableSchema},
    },
    error::AppResult,
};

/// Reads SQLite's catalog through an [`SqlExecutor`].
///
/// Every operation takes a validated [`Identifier`]; the table name is still
/// passed as a bound value to the `pragma_*` table-valued functions. Unknown
/// tables produce empty results rather than errors.
pub struct SchemaIntrospector<'a, E: SqlExecutor + ?Sized> {
    exec: &'a E,
    pk_prefix: &'a str,
}

impl<'a, E: SqlExecutor + ?Sized> SchemaIntrospector<'a, E> {
    pub fn new(exec: &'a E, pk_prefix: &'a str) -> Self {
        Self { exec, pk_prefix }
    }

    pub fn list_tables(&self) -> AppResult<Vec<String>> {
        let mut q = SqlFragment::new();
        q.push("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name");
        let rs = self.exec.query(&q)?;
        Ok(rs
            .rows
            .iter()
            .filter_map(|r| text(r.get("name")))
            .collect())
    }

    pub fn table_exists(&self, table: &Identifier) -> AppResult<bool> {
        let mut q = SqlFragment::new();
        q.push("SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ")
            .push_param("table", table.to_string())
            .push(" COLLATE NOCASE");
        Ok(self.exec.count(&q)? > 0)
    }

    /// Columns in physical order.
    pub fn get_columns(&self, table: &Identifier) -> AppResult<Vec<SchemaColumn>> {
        let mut q = SqlFragment::new();
        q.push("SELECT name, type, pk FROM pragma_table_info(")
            .push_param("table", table.to_string())
            .push(") ORDER BY cid");
        let rs = self.exec.query(&q)?;
        Ok(rs
            .rows
            .iter()
            .filter_map(|r| {
                let name = text(r.get("name"))?;
                Some(SchemaColumn {
                    name,
                    declared_type: text(r.get("type")).unwrap_or_default(),
                    is_primary_key: matches!(r.get("pk"), Some(Value::Integer(n)) if *n > 0),
                })
            })
            .collect())
    }

    /// Foreign keys declared on `table`. A reference without an explicit target
    /// column points at the target table's key column.
    pub fn get_foreign_keys(&self, table: &Identifier) -> AppResult<Vec<ForeignKeyRef>> {
        let mut q = SqlFragment::new();
        q.push("SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(")
            .push_param("table", table.to_string())
            .push(") ORDER BY id, seq");
        let rs = self.exec.query(&q)?;

        let mut out = Vec::with_capacity(rs.rows.len());
        for r in &rs.rows {
            let (Some(from_column), Some(to_table)) = (text(r.get("from")), text(r.get("table"))) else {
                continue;
            };
            let to_column = match text(r.get("to")) {
                Some(c) => c,
                None => match self.implicit_target_column(&to_table)? {
                    Some(c) => c,
                    None => {
                        tracing::debug!(table = %table, column = %from_column, target = %to_table, "foreign key target has no resolvable key column");
                        continue;
                    }
                },
            };
            out.push(ForeignKeyRef {
                from_column,
                to_table,
                to_column,
            });
        }
        Ok(out)
    }

    pub fn foreign_key_info(&self, table: &Identifier, column: &Identifier) -> AppResult<ForeignKeyInfo> {
        let fks = self.get_foreign_keys(table)?;
        Ok(match fks.iter().find(|fk| column.eq_ignore_case(&fk.from_column)) {
            Some(fk) => ForeignKeyInfo::linked(table.as_str(), &fk.from_column, &fk.to_table, &fk.to_column),
            None => ForeignKeyInfo::unlinked(table.as_str(), column.as_str()),
        })
    }

    pub fn describe(&self, table: &Identifier) -> AppResult<TableSchema> {
        Ok(TableSchema {
            table: table.clone(),
            columns: self.get_columns(table)?,
            foreign_keys: self.get_foreign_keys(table)?,
        })
    }

    /// Like [`describe`](Self::describe) without reading foreign keys.
    pub fn describe_columns(&self, table: &Identifier) -> AppResult<TableSchema> {
        Ok(TableSchema {
            table: table.clone(),
            columns: self.get_columns(table)?,
            foreign_keys: Vec::new(),
        })
    }

    fn implicit_target_column(&self, to_table: &str) -> AppResult<Option<String>> {
        let Ok(target) = Identifier::parse(to_table) else {
            return Ok(None);
        };
        let schema = self.describe_columns(&target)?;
        Ok(schema.primary_key_column(self.pk_prefix).map(|c| c.name.clone()))
    }
}

fn text(v: Option<&Value>) -> Option<String> {
    match v {
        Some(Value::Text(s)) => Some(s.clone()),
        _ => None,
    }
}
