use std::collections::HashMap;

use rusqlite::types::Value;

use crate::{
    core::types::{ColumnDescriptor, DbRow, GridRow},
    error::{AppError, AppResult},
};

/// Display string for a raw cell. NULL renders as the empty string.
pub fn display_value(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Integer(n) => n.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("[blob {} bytes]", b.len()),
    }
}

/// Projects a raw row onto the visible columns.
///
/// Columns missing from the raw row are left out. `pk_column` must hold an
/// integer (or integer text) on every row.
pub fn project_row(
    table: &str,
    raw: &DbRow,
    columns: &[ColumnDescriptor],
    pk_column: &str,
) -> AppResult<GridRow> {
    let row_id = row_id(raw, pk_column).ok_or_else(|| AppError::MissingRowIdentifier {
        table: table.to_string(),
        column: pk_column.to_string(),
    })?;

    let mut values = HashMap::with_capacity(columns.len());
    for col in columns {
        if let Some(v) = raw.get(&col.internal_name) {
            values.insert(col.internal_name.clone(), display_value(v));
        }
    }

    Ok(GridRow {
        row_id,
        values_by_column_name: values,
    })
}

fn row_id(raw: &DbRow, pk_column: &str) -> Option<i64> {
    let v = raw.get(pk_column).or_else(|| {
        raw.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(pk_column))
            .map(|(_, v)| v)
    })?;
    match v {
        Value::Integer(n) => Some(*n),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
