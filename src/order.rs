//! Dependency-ordered table creation.

use crate::db::{Database, DbError};
use crate::ddl::CreateReport;
use crate::registry::Registry;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    /// The path that closes on itself, first table repeated at the end.
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error("failed to create table '{table}': {source}")]
    Create { table: String, source: DbError },
    #[error("failed to drop table '{table}': {source}")]
    Drop { table: String, source: DbError },
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Every registered table, each after all tables it references.
///
/// Depth-first over tables in name order with dependencies in name order,
/// so the result does not depend on declaration order.
pub fn creation_order(registry: &Registry) -> Result<Vec<String>, OrderError> {
    let pending = |table: &str| -> Vec<String> {
        registry.dependencies(table).into_iter().rev().collect()
    };

    let mut marks: HashMap<String, Mark> = HashMap::with_capacity(registry.len());
    let mut order = Vec::with_capacity(registry.len());

    for root in registry.tables() {
        if marks.contains_key(root) {
            continue;
        }
        marks.insert(root.to_string(), Mark::Visiting);
        let mut stack = vec![(root.to_string(), pending(root))];

        while let Some((table, deps)) = stack.last_mut() {
            match deps.pop() {
                Some(dep) => match marks.get(&dep) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let start = stack.iter().position(|(t, _)| *t == dep).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..].iter().map(|(t, _)| t.clone()).collect();
                        cycle.push(dep);
                        return Err(OrderError::Cycle(cycle));
                    }
                    None => {
                        marks.insert(dep.clone(), Mark::Visiting);
                        let next = pending(&dep);
                        stack.push((dep, next));
                    }
                },
                None => {
                    let table = table.clone();
                    marks.insert(table.clone(), Mark::Done);
                    order.push(table);
                    stack.pop();
                }
            }
        }
    }

    Ok(order)
}

/// What a full migration did, in creation order.
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub order: Vec<String>,
    pub tables: Vec<CreateReport>,
}

impl MigrationReport {
    /// Tables created without some of their indexes.
    pub fn partial_failures(&self) -> impl Iterator<Item = &CreateReport> {
        self.tables.iter().filter(|t| t.is_partial())
    }

    pub fn created(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().filter(|t| t.created).map(|t| t.table.as_str())
    }
}

/// Create every table in dependency order, one at a time.
///
/// Stops at the first table the engine refuses. A table that only lost
/// some indexes does not stop its dependents.
pub async fn create_all_tables(registry: &Registry, db: &dyn Database) -> Result<MigrationReport, MigrateError> {
    let order = creation_order(registry)?;
    let mut tables = Vec::with_capacity(order.len());

    for model in order.iter().filter_map(|t| registry.get(t)) {
        info!(table = model.table_name(), "creating table");
        let report = model.create_table(db).await.map_err(|source| MigrateError::Create {
            table: model.table_name().to_string(),
            source,
        })?;
        tables.push(report);
    }

    info!(count = tables.len(), "all tables created");
    Ok(MigrationReport { order, tables })
}

/// Drop every table, dependents first. Returns the tables in drop order.
pub async fn drop_all_tables(registry: &Registry, db: &dyn Database) -> Result<Vec<String>, MigrateError> {
    let mut order = creation_order(registry)?;
    order.reverse();

    for model in order.iter().filter_map(|t| registry.get(t)) {
        info!(table = model.table_name(), "dropping table");
        model.drop_table(db).await.map_err(|source| MigrateError::Drop {
            table: model.table_name().to_string(),
            source,
        })?;
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnSpec, DataType, IndexSpec, ReferenceSpec};
    use crate::fixtures;
    use crate::memory::MemoryDatabase;
    use crate::model::{Model, ModelDecl};

    fn position(order: &[String], table: &str) -> usize {
        order.iter().position(|t| t == table).unwrap()
    }

    fn model(name: &str, references: &[&str]) -> Model {
        references
            .iter()
            .fold(ModelDecl::new(name), |decl, target| decl.reference(ReferenceSpec::new(*target)))
            .build()
            .unwrap()
    }

    #[test]
    fn test_dependencies_come_first() {
        let order = creation_order(&fixtures::registry()).unwrap();
        assert_eq!(order, vec!["team", "user", "membership"]);
    }

    #[test]
    fn test_order_independent_of_declaration() {
        let forward = Registry::new([
            model("Alpha", &[]),
            model("Beta", &[]),
            model("Link", &["Alpha", "Beta"]),
            model("Leaf", &["Link"]),
        ])
        .unwrap();
        let backward = Registry::new([
            model("Leaf", &["Link"]),
            model("Link", &["Alpha", "Beta"]),
            model("Beta", &[]),
            model("Alpha", &[]),
        ])
        .unwrap();

        let order = creation_order(&forward).unwrap();
        assert_eq!(order, creation_order(&backward).unwrap());
        assert!(position(&order, "alpha") < position(&order, "link"));
        assert!(position(&order, "beta") < position(&order, "link"));
        assert!(position(&order, "link") < position(&order, "leaf"));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_column_level_foreign_keys_count() {
        let registry = Registry::new([
            ModelDecl::new("Post")
                .column(ColumnSpec::new("author_id", DataType::Integer).references("author.id"))
                .build()
                .unwrap(),
            model("Author", &[]),
        ])
        .unwrap();
        assert_eq!(creation_order(&registry).unwrap(), vec!["author", "post"]);
    }

    #[test]
    fn test_cycle_reported() {
        let registry = Registry::new([model("Chicken", &["Egg"]), model("Egg", &["Chicken"])]).unwrap();
        let err = creation_order(&registry).unwrap_err();
        let OrderError::Cycle(path) = &err;
        assert_eq!(path, &vec!["chicken", "egg", "chicken"]);
        assert_eq!(err.to_string(), "dependency cycle: chicken -> egg -> chicken");
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let registry = Registry::new([model("Node", &["Node"])]).unwrap();
        let OrderError::Cycle(path) = creation_order(&registry).unwrap_err();
        assert_eq!(path, vec!["node", "node"]);
    }

    #[tokio::test]
    async fn test_create_all_tables() {
        let registry = fixtures::registry();
        let db = MemoryDatabase::new();

        let report = create_all_tables(&registry, &db).await.unwrap();
        assert_eq!(report.created().collect::<Vec<_>>(), vec!["team", "user", "membership"]);
        assert_eq!(report.partial_failures().count(), 0);

        // second run creates nothing
        let again = create_all_tables(&registry, &db).await.unwrap();
        assert_eq!(again.created().count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_creates_nothing() {
        let registry = Registry::new([model("Chicken", &["Egg"]), model("Egg", &["Chicken"])]).unwrap();
        let db = MemoryDatabase::new();

        let err = create_all_tables(&registry, &db).await.unwrap_err();
        assert!(matches!(err, MigrateError::Order(_)));
        assert_eq!(db.ddl_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_index_failure_does_not_block_dependents() {
        let team = ModelDecl::new("Team")
            .column(fixtures::name_column())
            .index(IndexSpec::new(["missing"]))
            .build()
            .unwrap();
        let registry = fixtures::registry_with_team(team);
        let db = MemoryDatabase::new();

        let report = create_all_tables(&registry, &db).await.unwrap();
        let partial: Vec<&str> = report.partial_failures().map(|t| t.table.as_str()).collect();
        assert_eq!(partial, vec!["team"]);
        assert!(db.has_table("membership").await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_all_tables_reverse_order() {
        let registry = fixtures::registry();
        let db = MemoryDatabase::new();
        create_all_tables(&registry, &db).await.unwrap();

        let dropped = drop_all_tables(&registry, &db).await.unwrap();
        assert_eq!(dropped, vec!["membership", "user", "team"]);
        assert!(!db.has_table("team").await.unwrap());
    }
}
