//! In-process relational backend.
//!
//! Enforces the constraints a real engine would: referenced tables must
//! exist at creation, and inserts are checked for nullability, uniqueness
//! and foreign keys.

use crate::column::DefaultValue;
use crate::db::{Database, DbError, NestedRow, Record};
use crate::ddl::{ColumnKind, IndexDef, TableDef, index_name};
use crate::query::SelectQuery;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

struct MemTable {
    def: TableDef,
    indexes: Vec<IndexDef>,
    rows: Vec<Record>,
    next_id: i64,
}

impl MemTable {
    fn has_column(&self, column: &str) -> bool {
        self.def.column(column).is_some()
    }

    /// Whether a row already holds `values` in `columns`. Nulls never collide.
    fn collides(&self, columns: &[String], values: &[&Value]) -> bool {
        if values.iter().any(|v| v.is_null()) {
            return false;
        }
        self.rows.iter().any(|row| {
            columns
                .iter()
                .zip(values)
                .all(|(c, v)| row.get(c).is_some_and(|existing| existing == *v))
        })
    }
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, MemTable>,
    ddl: usize,
}

#[derive(Default)]
pub struct MemoryDatabase {
    state: Mutex<State>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schema statements applied so far.
    pub fn ddl_count(&self) -> usize {
        self.lock().ddl
    }

    pub fn has_index(&self, table: &str, name: &str) -> bool {
        self.lock()
            .tables
            .get(table)
            .is_some_and(|t| t.indexes.iter().any(|i| i.name == name))
    }

    /// Snapshot of a table's rows, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }
}

fn now() -> Value {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Value::String(secs.to_string())
}

fn default_value(default: &DefaultValue) -> Value {
    match default {
        DefaultValue::CurrentTimestamp | DefaultValue::CurrentTimestampOnUpdate => now(),
        DefaultValue::Literal(value) => value.clone(),
        DefaultValue::Raw(sql) => Value::String(sql.clone()),
    }
}

fn matches(row: &Record, filter: &[(String, Value)]) -> bool {
    filter
        .iter()
        .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
}

fn no_such_table(table: &str) -> DbError {
    DbError::NoSuchTable(table.to_string())
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn has_table(&self, table: &str) -> Result<bool, DbError> {
        Ok(self.lock().tables.contains_key(table))
    }

    async fn create_table(&self, table: &TableDef) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.tables.contains_key(&table.name) {
            return Err(DbError::TableExists(table.name.clone()));
        }

        for column in &table.columns {
            let Some(fk) = &column.references else {
                continue;
            };
            // Self-references resolve against the table being created.
            let resolves = if fk.table == table.name {
                table.column(&fk.column).is_some()
            } else {
                state.tables.get(&fk.table).is_some_and(|t| t.has_column(&fk.column))
            };
            if !resolves {
                return Err(DbError::MissingReference {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    target: format!("{}.{}", fk.table, fk.column),
                });
            }
        }

        let indexes = table
            .columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| IndexDef {
                name: index_name(&table.name, std::slice::from_ref(&c.name), "index"),
                columns: vec![c.name.clone()],
                unique: false,
                kind: None,
            })
            .collect();

        state.tables.insert(
            table.name.clone(),
            MemTable {
                def: table.clone(),
                indexes,
                rows: Vec::new(),
                next_id: 1,
            },
        );
        state.ddl += 1;
        trace!(table = %table.name, "memory: create table");
        Ok(())
    }

    async fn create_index(&self, table: &str, index: &IndexDef) -> Result<(), DbError> {
        let mut state = self.lock();
        let t = state.tables.get_mut(table).ok_or_else(|| no_such_table(table))?;

        if let Some(column) = index.columns.iter().find(|c| !t.has_column(c)) {
            return Err(DbError::NoSuchColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }
        if t.indexes.iter().any(|i| i.name == index.name) {
            return Err(DbError::IndexExists(index.name.clone()));
        }
        if index.unique {
            let mut seen: Vec<Vec<&Value>> = Vec::new();
            for row in &t.rows {
                let key: Vec<&Value> = index
                    .columns
                    .iter()
                    .map(|c| row.get(c).unwrap_or(&Value::Null))
                    .collect();
                if key.iter().any(|v| v.is_null()) {
                    continue;
                }
                if seen.contains(&key) {
                    return Err(DbError::Constraint {
                        table: table.to_string(),
                        detail: format!("duplicate entries for '{}'", index.name),
                    });
                }
                seen.push(key);
            }
        }

        t.indexes.push(index.clone());
        state.ddl += 1;
        Ok(())
    }

    async fn drop_table(&self, table: &str) -> Result<(), DbError> {
        let mut state = self.lock();
        if state.tables.remove(table).is_some() {
            state.ddl += 1;
        }
        Ok(())
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<NestedRow>, DbError> {
        let state = self.lock();
        let base = state.tables.get(&query.table).ok_or_else(|| no_such_table(&query.table))?;

        let mut joined_tables = Vec::with_capacity(query.joins.len());
        for join in &query.joins {
            let t = state.tables.get(&join.table).ok_or_else(|| no_such_table(&join.table))?;
            joined_tables.push((join, t));
        }

        let mut out = Vec::new();
        for row in base.rows.iter().filter(|r| matches(r, &query.filter)) {
            let mut sources: BTreeMap<&str, &Record> = BTreeMap::new();
            sources.insert(&query.table, row);

            for (join, t) in &joined_tables {
                let key = row.get(&join.from).unwrap_or(&Value::Null);
                if key.is_null() {
                    continue;
                }
                if let Some(hit) = t.rows.iter().find(|r| r.get(&join.to) == Some(key)) {
                    sources.insert(&join.table, hit);
                }
            }

            let mut nested = NestedRow::new();
            for column in &query.columns {
                let Some(source) = sources.get(column.table.as_str()) else {
                    continue;
                };
                let partition = if query.nest_tables {
                    column.table.clone()
                } else {
                    query.table.clone()
                };
                nested.entry(partition).or_default().insert(
                    column.key().to_string(),
                    source.get(&column.column).cloned().unwrap_or(Value::Null),
                );
            }
            out.push(nested);
        }

        Ok(out)
    }

    async fn insert(&self, table: &str, row: &Record) -> Result<i64, DbError> {
        let mut state = self.lock();
        let t = state.tables.get(table).ok_or_else(|| no_such_table(table))?;

        if let Some(column) = row.keys().find(|c| !t.has_column(c)) {
            return Err(DbError::NoSuchColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }

        let id = t.next_id;
        let mut full = Record::new();
        for column in &t.def.columns {
            let value = if column.kind == ColumnKind::Identity {
                Value::from(id)
            } else if let Some(value) = row.get(&column.name) {
                value.clone()
            } else {
                column.default.as_ref().map(default_value).unwrap_or(Value::Null)
            };
            full.insert(column.name.clone(), value);
        }

        let violation = |detail: String| DbError::Constraint {
            table: table.to_string(),
            detail,
        };

        for column in &t.def.columns {
            let value = full.get(&column.name).unwrap_or(&Value::Null);
            if column.not_null && value.is_null() {
                return Err(violation(format!("'{}' cannot be null", column.name)));
            }
            if column.unique && t.collides(std::slice::from_ref(&column.name), &[value]) {
                return Err(violation(format!("duplicate value for '{}'", column.name)));
            }
            if let (Some(fk), false) = (&column.references, value.is_null()) {
                let target = if fk.table == table {
                    Some(t)
                } else {
                    state.tables.get(&fk.table)
                };
                let found = target.is_some_and(|target| {
                    target.rows.iter().any(|r| r.get(&fk.column) == Some(value))
                        || (fk.table == table && full.get(&fk.column) == Some(value))
                });
                if !found {
                    return Err(violation(format!(
                        "'{}' = {} has no match in '{}.{}'",
                        column.name, value, fk.table, fk.column
                    )));
                }
            }
        }

        for index in t.indexes.iter().filter(|i| i.unique) {
            let values: Vec<&Value> = index
                .columns
                .iter()
                .map(|c| full.get(c).unwrap_or(&Value::Null))
                .collect();
            if t.collides(&index.columns, &values) {
                return Err(violation(format!("duplicate entry for '{}'", index.name)));
            }
        }

        let t = state.tables.get_mut(table).ok_or_else(|| no_such_table(table))?;
        t.rows.push(full);
        t.next_id += 1;
        Ok(id)
    }

    async fn delete(&self, table: &str, filter: &Record) -> Result<u64, DbError> {
        let mut state = self.lock();
        let t = state.tables.get_mut(table).ok_or_else(|| no_such_table(table))?;

        if let Some(column) = filter.keys().find(|c| !t.has_column(c)) {
            return Err(DbError::NoSuchColumn {
                table: table.to_string(),
                column: column.clone(),
            });
        }

        let filter: Vec<(String, Value)> = filter.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let before = t.rows.len();
        t.rows.retain(|row| !matches(row, &filter));
        Ok((before - t.rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::query::{LeftJoin, SelectColumn};
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_requires_referenced_table() {
        let db = MemoryDatabase::new();
        let err = fixtures::membership().create_table(&db).await.unwrap_err();
        assert!(matches!(err, DbError::MissingReference { column, .. } if column == "team_id"));
    }

    #[tokio::test]
    async fn test_insert_assigns_ids_and_defaults() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;

        let rows = db.rows("membership");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[1]["id"], json!(2));
        assert_eq!(rows[0]["role"], json!("member"));
        assert!(rows[0]["created"].is_string());
    }

    #[tokio::test]
    async fn test_insert_constraints() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;

        let err = db
            .insert("membership", &record(json!({ "team_id": 42, "user_id": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Constraint { .. }));

        let err = db.insert("team", &Record::new()).await.unwrap_err();
        assert!(matches!(err, DbError::Constraint { detail, .. } if detail.contains("name")));

        let err = db
            .insert("team", &record(json!({ "name": "x", "colour": "red" })))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NoSuchColumn { .. }));
    }

    #[tokio::test]
    async fn test_select_left_join_omits_missing() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;

        let query = SelectQuery {
            table: "membership".to_string(),
            columns: vec![
                SelectColumn {
                    table: "membership".to_string(),
                    column: "user_id".to_string(),
                    alias: Some("userId".to_string()),
                },
                SelectColumn {
                    table: "team".to_string(),
                    column: "name".to_string(),
                    alias: None,
                },
            ],
            joins: vec![LeftJoin {
                table: "team".to_string(),
                from: "team_id".to_string(),
                to: "id".to_string(),
            }],
            filter: Vec::new(),
            nest_tables: true,
        };

        let rows = db.select(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["membership"]["userId"], json!(1));
        assert_eq!(rows[0]["team"]["name"], json!("core"));
        assert!(!rows[1].contains_key("team"));
    }

    #[tokio::test]
    async fn test_delete_counts() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;

        assert_eq!(db.delete("membership", &record(json!({ "id": 7 }))).await.unwrap(), 0);
        assert_eq!(db.delete("membership", &record(json!({ "user_id": 2 }))).await.unwrap(), 1);
        assert_eq!(db.rows("membership").len(), 1);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let db = MemoryDatabase::new();
        let team = fixtures::team();
        team.create_table(&db).await.unwrap();
        db.create_index(
            "team",
            &IndexDef {
                name: "team_name_unique".to_string(),
                columns: vec!["name".to_string()],
                unique: true,
                kind: None,
            },
        )
        .await
        .unwrap();

        db.insert("team", &record(json!({ "name": "core" }))).await.unwrap();
        let err = db.insert("team", &record(json!({ "name": "core" }))).await.unwrap_err();
        assert!(matches!(err, DbError::Constraint { .. }));
    }
}
