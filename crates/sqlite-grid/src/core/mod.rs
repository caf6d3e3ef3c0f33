pub mod columns;
pub mod config;
pub mod connection;
pub mod executor;
pub mod foreign;
pub mod grid;
pub mod identifier;
pub mod limits;
pub mod query;
pub mod rows;
pub mod schema;
pub mod sql;
pub mod types;
