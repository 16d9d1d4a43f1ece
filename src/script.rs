//! Backend that records schema statements instead of executing them.

use crate::db::{Database, DbError, NestedRow, Record};
use crate::ddl::{self, IndexDef, TableDef};
use crate::dialect::Dialect;
use crate::query::SelectQuery;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Script {
    tables: BTreeSet<String>,
    statements: Vec<String>,
}

/// Collects the DDL a migration would run, rendered for one dialect.
///
/// Tracks created tables so `has_table` answers consistently; it does not
/// know about tables that exist in a live database.
pub struct ScriptDatabase {
    dialect: Dialect,
    script: Mutex<Script>,
}

impl ScriptDatabase {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            script: Mutex::new(Script::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn script(&self) -> String {
        join_statements(&self.lock().statements)
    }
}

/// One statement per line, each terminated by `;`.
pub fn join_statements(statements: &[String]) -> String {
    statements.iter().map(|s| format!("{s};\n")).collect()
}

#[async_trait]
impl Database for ScriptDatabase {
    async fn has_table(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.lock().tables.contains(table))
    }

    async fn create_table(&self, table: &TableDef) -> Result<(), DbError> {
        let mut script = self.lock();
        if !script.tables.insert(table.name.clone()) {
            return Err(DbError::TableExists(table.name.clone()));
        }
        script.statements.extend(table.create_statements(self.dialect));
        Ok(())
    }

    async fn create_index(&self, table: &str, index: &IndexDef) -> Result<(), DbError> {
        let statement = ddl::index_statement(table, index, self.dialect);
        self.lock().statements.push(statement);
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        let statement = ddl::drop_statement(table, self.dialect);
        let mut script = self.lock();
        script.tables.remove(table);
        script.statements.push(statement);
        Ok(())
    }

    async fn select(&self, _query: &SelectQuery) -> Result<Vec<NestedRow>, DbError> {
        Err(DbError::Unsupported("select"))
    }

    async fn insert(&self, _table: &str, _row: &Record) -> Result<i64, DbError> {
        Err(DbError::Unsupported("insert"))
    }

    async fn delete(&self, _table: &str, _filter: &Record) -> Result<u64, DbError> {
        Err(DbError::Unsupported("delete"))
    }
}
