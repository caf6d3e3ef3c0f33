use crate::core::types::{ColumnDescriptor, ForeignKeyInfo, TableSchema};

/// Turns a table schema into the visible grid columns.
///
/// A leading synthetic key column (name starting with `pk_prefix`) is hidden; the
/// row id is read from the raw row separately. Ordinals count output positions.
pub fn resolve_columns(schema: &TableSchema, pk_prefix: &str) -> Vec<ColumnDescriptor> {
    let table = schema.table.as_str();
    let skip = match schema.columns.first() {
        Some(first) if has_prefix(&first.name, pk_prefix) => 1,
        _ => 0,
    };

    let mut out: Vec<ColumnDescriptor> = schema
        .columns
        .iter()
        .skip(skip)
        .enumerate()
        .map(|(ordinal, col)| {
            let fk = schema.foreign_key(&col.name);
            ColumnDescriptor {
                table_name: table.to_string(),
                display_name: col.name.clone(),
                internal_name: col.name.clone(),
                ordinal,
                is_last_column: false,
                linked_foreign_key: fk.map(|fk| {
                    ForeignKeyInfo::linked(table, &col.name, &fk.to_table, &fk.to_column)
                }),
                join_alias: fk.map(|fk| format!("{}_{}", fk.to_table, col.name)),
            }
        })
        .collect();

    if let Some(last) = out.last_mut() {
        last.is_last_column = true;
    }
    out
}

fn has_prefix(name: &str, prefix: &str) -> bool {
    !prefix.is_empty()
        && name.len() >= prefix.len()
        && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        identifier::Identifier,
        types::{ForeignKeyRef, SchemaColumn},
    };

    fn col(name: &str, ty: &str) -> SchemaColumn {
        SchemaColumn {
            name: name.into(),
            declared_type: ty.into(),
            is_primary_key: false,
        }
    }

    fn reviews() -> TableSchema {
        TableSchema {
            table: Identifier::parse("Reviews").unwrap(),
            columns: vec![
                col("Id_Reviews", "INTEGER"),
                col("Body", "TEXT"),
                col("AuthorId", "INTEGER"),
                col("Stars", "INTEGER"),
            ],
            foreign_keys: vec![ForeignKeyRef {
                from_column: "AuthorId".into(),
                to_table: "Users".into(),
                to_column: "Id_Users".into(),
            }],
        }
    }

    #[test]
    fn hides_synthetic_key_and_renumbers() {
        let cols = resolve_columns(&reviews(), "Id_");
        let names: Vec<_> = cols.iter().map(|c| c.internal_name.as_str()).collect();
        assert_eq!(names, ["Body", "AuthorId", "Stars"]);
        assert_eq!(cols.iter().map(|c| c.ordinal).collect::<Vec<_>>(), [0, 1, 2]);
        assert!(cols.iter().all(|c| c.display_name == c.internal_name));
        assert!(cols.iter().all(|c| c.table_name == "Reviews"));
    }

    #[test]
    fn only_last_column_is_flagged() {
        let cols = resolve_columns(&reviews(), "Id_");
        let flags: Vec<_> = cols.iter().map(|c| c.is_last_column).collect();
        assert_eq!(flags, [false, false, true]);
    }

    #[test]
    fn links_foreign_key_columns() {
        let cols = resolve_columns(&reviews(), "Id_");
        let author = &cols[1];
        let fk = author.linked_foreign_key.as_ref().unwrap();
        assert_eq!(fk.foreign_table(), Some("Users"));
        assert_eq!(fk.foreign_column(), Some("Id_Users"));
        assert_eq!(author.join_alias.as_deref(), Some("Users_AuthorId"));
        assert!(cols[0].linked_foreign_key.is_none());
        assert!(cols[0].join_alias.is_none());
    }

    #[test]
    fn keeps_first_column_without_prefix() {
        let schema = TableSchema {
            table: Identifier::parse("Tags").unwrap(),
            columns: vec![col("id", "INTEGER"), col("Label", "TEXT")],
            foreign_keys: vec![],
        };
        let cols = resolve_columns(&schema, "Id_");
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].internal_name, "id");
    }

    #[test]
    fn only_the_first_column_is_ever_skipped() {
        let schema = TableSchema {
            table: Identifier::parse("Links").unwrap(),
            columns: vec![col("Url", "TEXT"), col("Id_Owner", "INTEGER")],
            foreign_keys: vec![],
        };
        let cols = resolve_columns(&schema, "Id_");
        assert_eq!(cols.len(), 2);
        assert!(cols[1].is_last_column);
    }
}
