use std::{cell::RefCell, collections::HashMap};

use crate::{
    core::{
        config::GridConfig,
        executor::{RecordLookup, SqlExecutor},
        identifier::Identifier,
        rows::display_value,
        schema::SchemaIntrospector,
        sql::SqlFragment,
        types::{ColumnDescriptor, GridRow, Record},
    },
    error::{AppError, AppResult},
};

/// [`RecordLookup`] over any [`SqlExecutor`], keyed by the discovered primary-key column.
///
/// The key column of each table is read from the catalog once per lookup instance.
pub struct SqlRecordLookup<'a, E: SqlExecutor + ?Sized> {
    exec: &'a E,
    pk_prefix: &'a str,
    key_columns: RefCell<HashMap<Identifier, Option<Identifier>>>,
}

impl<'a, E: SqlExecutor + ?Sized> SqlRecordLookup<'a, E> {
    pub fn new(exec: &'a E, pk_prefix: &'a str) -> Self {
        Self {
            exec,
            pk_prefix,
            key_columns: RefCell::new(HashMap::new()),
        }
    }

    fn key_column(&self, table: &Identifier) -> AppResult<Option<Identifier>> {
        if let Some(key) = self.key_columns.borrow().get(table) {
            return Ok(key.clone());
        }
        let schema = SchemaIntrospector::new(self.exec, self.pk_prefix).describe_columns(table)?;
        let key = schema
            .primary_key_column(self.pk_prefix)
            .map(|c| Identifier::parse(&c.name))
            .transpose()?;
        self.key_columns.borrow_mut().insert(table.clone(), key.clone());
        Ok(key)
    }
}

impl<E: SqlExecutor + ?Sized> RecordLookup for SqlRecordLookup<'_, E> {
    fn record_by_primary_key(&self, table: &Identifier, id: i64) -> AppResult<Option<Record>> {
        let Some(pk) = self.key_column(table)? else {
            return Ok(None);
        };

        let mut q = SqlFragment::new();
        q.push("SELECT * FROM ")
            .push_ident(table)
            .push(" WHERE ")
            .push_ident(&pk)
            .push(" = ")
            .push_param("id", id)
            .push(" LIMIT 1");
        let rs = self.exec.query(&q)?;

        Ok(rs.rows.into_iter().next().map(|row| {
            row.iter()
                .map(|(k, v)| (k.clone(), display_value(v)))
                .collect()
        }))
    }
}

/// Replaces foreign ids in `rows` with a readable value from the referenced record.
///
/// Anything that goes wrong for a cell leaves the raw id in place and is logged.
/// Only cancellation is propagated: a half-resolved page must not look complete.
/// Each distinct raw value is looked up once per column.
pub fn resolve_foreign_display<E, L>(
    introspector: &SchemaIntrospector<'_, E>,
    lookup: &L,
    config: &GridConfig,
    columns: &[ColumnDescriptor],
    rows: &mut [GridRow],
) -> AppResult<()>
where
    E: SqlExecutor + ?Sized,
    L: RecordLookup + ?Sized,
{
    for col in columns {
        let Some(fk) = col.linked_foreign_key.as_ref().filter(|fk| fk.is_foreign_key()) else {
            continue;
        };
        let (Some(target), Some(target_column)) = (fk.foreign_table(), fk.foreign_column()) else {
            continue;
        };
        let target = match Identifier::parse(target) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(column = %col.internal_name, error = %e, "foreign key target is not a usable table name");
                continue;
            }
        };
        let display_col = display_column(introspector, config, &target, target_column)?;
        tracing::debug!(column = %fk.column_name(), target = %target, display = %display_col, "resolving foreign key column");

        let mut resolved: HashMap<String, Option<String>> = HashMap::new();
        for row in rows.iter_mut() {
            let Some(cell) = row.values_by_column_name.get_mut(&col.internal_name) else {
                continue;
            };
            let value = match resolved.get(cell.as_str()) {
                Some(hit) => hit.clone(),
                None => {
                    let value = match lookup_display(lookup, &target, &display_col, cell) {
                        Ok(v) => v,
                        Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                        Err(e) => {
                            tracing::warn!(row_id = row.row_id, column = %col.internal_name, error = %e, "foreign lookup failed; keeping raw value");
                            None
                        }
                    };
                    resolved.insert(cell.clone(), value.clone());
                    value
                }
            };
            if let Some(v) = value {
                *cell = v;
            }
        }
    }
    Ok(())
}

/// Configured mapping, else the target's first non-key text column, else the referenced column.
fn display_column<E: SqlExecutor + ?Sized>(
    introspector: &SchemaIntrospector<'_, E>,
    config: &GridConfig,
    target: &Identifier,
    target_column: &str,
) -> AppResult<String> {
    if let Some(c) = config.display_column(target.as_str()) {
        return Ok(c.to_string());
    }
    match introspector.describe_columns(target) {
        Ok(schema) => {
            Ok(schema
                .first_text_column(&config.pk_prefix)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| target_column.to_string()))
        }
        Err(AppError::Cancelled) => Err(AppError::Cancelled),
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "could not inspect foreign table; using referenced column");
            Ok(target_column.to_string())
        }
    }
}

fn lookup_display<L: RecordLookup + ?Sized>(
    lookup: &L,
    target: &Identifier,
    display: &str,
    cell: &str,
) -> AppResult<Option<String>> {
    let id: i64 = cell
        .trim()
        .parse()
        .map_err(|_| AppError::ForeignLookup(format!("{cell:?} is not an integer id")))?;
    let record = lookup
        .record_by_primary_key(target, id)?
        .ok_or_else(|| AppError::ForeignLookup(format!("no {target} record with id {id}")))?;
    Ok(record.get(display).cloned())
}
