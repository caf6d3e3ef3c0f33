use rusqlite::{types::Value, Connection, ToSql};

use crate::{
    core::{
        identifier::Identifier,
        sql::SqlFragment,
        types::{Record, ResultSet},
    },
    error::AppResult,
};

/// Runs parameterized SQL. Timeouts and connection handling belong to the implementor.
pub trait SqlExecutor {
    fn execute_query(&self, sql: &str, params: &[(String, Value)]) -> AppResult<ResultSet>;

    fn execute_scalar_count(&self, sql: &str, params: &[(String, Value)]) -> AppResult<u64>;

    fn query(&self, q: &SqlFragment) -> AppResult<ResultSet> {
        tracing::debug!(sql = q.sql(), params = q.params().len(), "query");
        self.execute_query(q.sql(), q.params())
    }

    fn count(&self, q: &SqlFragment) -> AppResult<u64> {
        tracing::debug!(sql = q.sql(), params = q.params().len(), "count");
        self.execute_scalar_count(q.sql(), q.params())
    }
}

/// Fetches one row of an arbitrary table by primary key, rendered for display.
pub trait RecordLookup {
    fn record_by_primary_key(&self, table: &Identifier, id: i64) -> AppResult<Option<Record>>;
}

impl SqlExecutor for Connection {
    fn execute_query(&self, sql: &str, params: &[(String, Value)]) -> AppResult<ResultSet> {
        let mut stmt = self.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        let named = named_params(params);
        let mut rows = Vec::new();
        let mut r = stmt.query(named.as_slice())?;
        while let Some(row) = r.next()? {
            let mut out = std::collections::HashMap::with_capacity(columns.len());
            for (i, name) in columns.iter().enumerate() {
                out.insert(name.clone(), Value::from(row.get_ref(i)?));
            }
            rows.push(out);
        }

        Ok(ResultSet { columns, rows })
    }

    fn execute_scalar_count(&self, sql: &str, params: &[(String, Value)]) -> AppResult<u64> {
        let mut stmt = self.prepare(sql)?;
        let named = named_params(params);
        let n: i64 = stmt.query_row(named.as_slice(), |r| r.get(0))?;
        Ok(n.max(0) as u64)
    }
}

fn named_params(params: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}
