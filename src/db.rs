//! The relational engine as seen by the mapper.

use crate::ddl::{IndexDef, TableDef};
use crate::query::SelectQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One row, keyed by column name.
pub type Record = Map<String, Value>;

/// One result row partitioned by source table. A left join without a match
/// leaves the joined table out entirely.
pub type NestedRow = BTreeMap<String, Record>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("table '{0}' does not exist")]
    NoSuchTable(String),
    #[error("column '{column}' does not exist on '{table}'")]
    NoSuchColumn { table: String, column: String },
    #[error("foreign key '{table}.{column}' references missing '{target}'")]
    MissingReference {
        table: String,
        column: String,
        target: String,
    },
    #[error("index '{0}' already exists")]
    IndexExists(String),
    #[error("constraint violation on '{table}': {detail}")]
    Constraint { table: String, detail: String },
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Capabilities the mapper needs from a relational engine.
///
/// Every call suspends the caller until the engine answers; callers never
/// issue two schema changes concurrently.
#[async_trait]
pub trait Database: Send + Sync {
    async fn has_table(&self, table: &str) -> Result<bool, DbError>;

    /// Create the table with its columns and column-level constraints
    /// (unique, index, foreign key). `TableDef::indexes` is not applied here;
    /// those are added one by one through `create_index`.
    async fn create_table(&self, table: &TableDef) -> Result<(), DbError>;

    async fn create_index(&self, table: &str, index: &IndexDef) -> Result<(), DbError>;

    /// Drop the table if it exists. No cascading.
    async fn drop_table(&self, table: &str) -> Result<(), DbError>;

    async fn select(&self, query: &SelectQuery) -> Result<Vec<NestedRow>, DbError>;

    /// Insert one row and return its identity.
    async fn insert(&self, table: &str, row: &Record) -> Result<i64, DbError>;

    /// Delete rows matching every `column = value` pair; returns the affected count.
    async fn delete(&self, table: &str, filter: &Record) -> Result<u64, DbError>;
}
