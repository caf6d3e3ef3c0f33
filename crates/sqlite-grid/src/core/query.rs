use rusqlite::types::Value;

use crate::{
    core::{
        identifier::Identifier,
        sql::SqlFragment,
        types::{SchemaColumn, SortDirection, TableSchema},
    },
    error::{AppError, AppResult},
};

/// `WHERE (...)` over the searchable columns, or an empty fragment.
///
/// Text columns match `LIKE %term%`; numeric columns match by equality when the
/// term parses as a number. With `search_column` only that column is considered.
/// A term no column can match yields no predicate at all.
pub fn build_search_predicate(
    schema: &TableSchema,
    search_term: &str,
    search_column: Option<&str>,
) -> AppResult<SqlFragment> {
    let restricted = search_column
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|name| schema_column(schema, name, "search column"))
        .transpose()?;

    let term = search_term.trim();
    if term.is_empty() {
        return Ok(SqlFragment::new());
    }

    let candidates: Vec<&SchemaColumn> = match restricted {
        Some(col) => vec![col],
        None => schema.columns.iter().collect(),
    };
    let numeric = parse_number(term);

    let mut branches: Vec<SqlFragment> = Vec::new();
    for col in candidates {
        let Ok(ident) = Identifier::parse(&col.name) else {
            tracing::debug!(table = %schema.table, column = %col.name, "skipping non-identifier column in search");
            continue;
        };
        if col.is_text() {
            let mut b = SqlFragment::new();
            b.push_ident(&ident)
                .push(" LIKE ")
                .push_param("searchTerm", format!("%{term}%"));
            branches.push(b);
        } else if col.is_numeric() {
            if let Some(n) = &numeric {
                let mut b = SqlFragment::new();
                b.push_ident(&ident)
                    .push(" = ")
                    .push_param("searchTermNumeric", n.clone());
                branches.push(b);
            }
        }
    }

    if branches.is_empty() {
        return Ok(SqlFragment::new());
    }

    let mut q = SqlFragment::new();
    q.push("WHERE (");
    for (i, b) in branches.into_iter().enumerate() {
        if i > 0 {
            q.push(" OR ");
        }
        q.push_fragment(b);
    }
    q.push(")");
    Ok(q)
}

/// `SELECT COUNT(*)` over the same predicate the page query uses.
pub fn build_count_query(
    schema: &TableSchema,
    search_term: &str,
    search_column: Option<&str>,
) -> AppResult<SqlFragment> {
    let predicate = build_search_predicate(schema, search_term, search_column)?;
    let mut q = SqlFragment::new();
    q.push("SELECT COUNT(*) FROM ").push_ident(&schema.table);
    q.append(predicate);
    Ok(q)
}

#[derive(Debug, Clone, Copy)]
pub struct PageSpec<'a> {
    pub page: i64,
    pub page_size: usize,
    pub search_term: &'a str,
    pub search_column: Option<&'a str>,
    pub sort_field: &'a str,
    pub sort_direction: SortDirection,
}

/// One page of `table.*`, filtered and optionally ordered. `page` is expected to be >= 1.
pub fn build_page_query(schema: &TableSchema, paging: &PageSpec<'_>) -> AppResult<SqlFragment> {
    let order_by = build_order_by(schema, paging.sort_field, paging.sort_direction)?;
    let predicate = build_search_predicate(schema, paging.search_term, paging.search_column)?;

    let page_size = i64::try_from(paging.page_size).unwrap_or(i64::MAX);
    let offset = (paging.page.max(1) - 1).saturating_mul(page_size);

    let mut q = SqlFragment::new();
    q.push("SELECT ")
        .push_ident(&schema.table)
        .push(".* FROM ")
        .push_ident(&schema.table);
    q.append(predicate);
    q.append(order_by);

    let mut tail = SqlFragment::new();
    tail.push("LIMIT ")
        .push_param("pageSize", page_size)
        .push(" OFFSET ")
        .push_param("offset", offset);
    q.append(tail);
    Ok(q)
}

fn build_order_by(schema: &TableSchema, sort_field: &str, dir: SortDirection) -> AppResult<SqlFragment> {
    let field = sort_field.trim();
    let mut q = SqlFragment::new();
    if field.is_empty() {
        return Ok(q);
    }
    let col = schema_column(schema, field, "sort field")?;
    let ident = Identifier::parse(&col.name)?;
    q.push("ORDER BY ").push_ident(&ident);
    q.push(match dir {
        SortDirection::Asc => " ASC",
        SortDirection::Desc => " DESC",
    });
    Ok(q)
}

/// Validates `name` and resolves it against the table's columns. SQLite reads an
/// unknown double-quoted name as a string literal, so unknown names are refused here.
fn schema_column<'s>(schema: &'s TableSchema, name: &str, what: &str) -> AppResult<&'s SchemaColumn> {
    let ident = Identifier::parse(name)?;
    schema.column(ident.as_str()).ok_or_else(|| {
        AppError::InvalidRequest(format!("unknown {what} {ident} for table {}", schema.table))
    })
}

fn parse_number(term: &str) -> Option<Value> {
    if let Ok(n) = term.parse::<i64>() {
        return Some(Value::Integer(n));
    }
    term.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(Value::Real)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, ty: &str) -> SchemaColumn {
        SchemaColumn {
            name: name.into(),
            declared_type: ty.into(),
            is_primary_key: false,
        }
    }

    fn notes() -> TableSchema {
        TableSchema {
            table: Identifier::parse("Notes").unwrap(),
            columns: vec![
                col("Id_Notes", "INTEGER"),
                col("Title", "TEXT"),
                col("Score", "REAL"),
                col("Payload", "BLOB"),
            ],
            foreign_keys: vec![],
        }
    }

    fn first_page<'a>() -> PageSpec<'a> {
        PageSpec {
            page: 1,
            page_size: 20,
            search_term: "",
            search_column: None,
            sort_field: "",
            sort_direction: SortDirection::Asc,
        }
    }

    #[test]
    fn blank_term_has_no_predicate() {
        for term in ["", "   ", "\t"] {
            let p = build_search_predicate(&notes(), term, None).unwrap();
            assert!(p.is_empty());
            assert!(p.params().is_empty());
        }
    }

    #[test]
    fn numeric_term_searches_text_and_numbers() {
        let p = build_search_predicate(&notes(), " 42 ", None).unwrap();
        assert_eq!(
            p.sql(),
            "WHERE (\"Id_Notes\" = @searchTermNumeric OR \"Title\" LIKE @searchTerm OR \"Score\" = @searchTermNumeric)"
        );
        assert_eq!(p.param("searchTerm"), Some(&Value::Text("%42%".into())));
        assert_eq!(p.param("searchTermNumeric"), Some(&Value::Integer(42)));
    }

    #[test]
    fn text_term_skips_numeric_columns() {
        let p = build_search_predicate(&notes(), "hello", None).unwrap();
        assert_eq!(p.sql(), "WHERE (\"Title\" LIKE @searchTerm)");
        assert!(p.param("searchTermNumeric").is_none());
    }

    #[test]
    fn fractional_term_binds_real() {
        let p = build_search_predicate(&notes(), "2.5", None).unwrap();
        assert_eq!(p.param("searchTermNumeric"), Some(&Value::Real(2.5)));
    }

    #[test]
    fn no_searchable_column_means_no_filter() {
        let schema = TableSchema {
            table: Identifier::parse("Files").unwrap(),
            columns: vec![col("Data", "BLOB"), col("Size", "INTEGER")],
            foreign_keys: vec![],
        };
        assert!(build_search_predicate(&schema, "abc", None).unwrap().is_empty());
    }

    #[test]
    fn search_column_restricts_branches() {
        let p = build_search_predicate(&notes(), "42", Some("Title")).unwrap();
        assert_eq!(p.sql(), "WHERE (\"Title\" LIKE @searchTerm)");

        let err = build_search_predicate(&notes(), "42", Some("Title;--")).unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
        let err = build_search_predicate(&notes(), "42", Some("Nope")).unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn search_column_is_checked_even_without_a_term() {
        for term in ["", "  "] {
            let err = build_search_predicate(&notes(), term, Some("Users; DROP TABLE Users")).unwrap_err();
            assert!(matches!(err, AppError::InvalidIdentifier(_)), "{term:?}");
        }
        assert!(build_search_predicate(&notes(), "", Some("Title")).unwrap().is_empty());
    }

    #[test]
    fn count_and_page_share_the_predicate() {
        let count = build_count_query(&notes(), "x", None).unwrap();
        assert_eq!(count.sql(), "SELECT COUNT(*) FROM \"Notes\" WHERE (\"Title\" LIKE @searchTerm)");

        let page = build_page_query(&notes(), &PageSpec { search_term: "x", ..first_page() }).unwrap();
        assert_eq!(
            page.sql(),
            "SELECT \"Notes\".* FROM \"Notes\" WHERE (\"Title\" LIKE @searchTerm) LIMIT @pageSize OFFSET @offset"
        );
        assert_eq!(page.param("searchTerm"), count.param("searchTerm"));
    }

    #[test]
    fn offset_follows_page() {
        let q = build_page_query(&notes(), &PageSpec { page: 3, page_size: 7, ..first_page() }).unwrap();
        assert_eq!(q.param("pageSize"), Some(&Value::Integer(7)));
        assert_eq!(q.param("offset"), Some(&Value::Integer(14)));
    }

    #[test]
    fn order_by_direction_defaults_to_asc() {
        for (dir, expected) in [
            ("desc", "DESC"),
            ("DeSc", "DESC"),
            ("", "ASC"),
            ("foo", "ASC"),
            ("ASCENDING", "ASC"),
        ] {
            let q = build_page_query(
                &notes(),
                &PageSpec {
                    sort_field: "Title",
                    sort_direction: SortDirection::parse_lenient(dir),
                    ..first_page()
                },
            )
            .unwrap();
            assert!(
                q.sql().contains(&format!("ORDER BY \"Title\" {expected} LIMIT")),
                "{dir:?}: {}",
                q.sql()
            );
        }
    }

    #[test]
    fn no_sort_field_means_no_order_by() {
        let q = build_page_query(&notes(), &first_page()).unwrap();
        assert!(!q.sql().contains("ORDER BY"));
    }

    #[test]
    fn malicious_sort_field_is_rejected() {
        let err = build_page_query(
            &notes(),
            &PageSpec {
                sort_field: "Title; DROP TABLE Notes",
                ..first_page()
            },
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }
}
