pub mod api;
pub mod case;
pub mod column;
pub mod config;
pub mod db;
pub mod ddl;
pub mod dialect;
pub mod discover;
pub mod memory;
pub mod model;
pub mod order;
pub mod query;
pub mod registry;
pub mod script;

#[cfg(test)]
mod fixtures;

use wasm_bindgen::prelude::*;

use ddl::TableDef;
use dialect::Dialect;
use model::ModelDecl;
use registry::Registry;

pub use api::{ApiError, ApiSchema, Executor};
pub use db::{Database, DbError, Record};
pub use model::{Model, ModelError};
pub use order::{MigrateError, OrderError, create_all_tables, creation_order, drop_all_tables};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Discover(#[from] discover::DiscoverError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("invalid declaration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Render the ordered DDL script for a JSON document of model declarations
#[wasm_bindgen(js_name = "planMigration")]
pub fn plan_migration(declarations: &str, dialect: Option<String>) -> Result<String, String> {
    let dialect = dialect
        .as_deref()
        .and_then(Dialect::from_str)
        .unwrap_or_default();

    plan(declarations, dialect).map_err(|e| e.to_string())
}

/// Parse declarations, order them by dependency and render every table's
/// statements, indexes included.
pub fn plan(declarations: &str, dialect: Dialect) -> Result<String, Error> {
    let models = discover::parse_declarations(declarations)?
        .into_iter()
        .map(ModelDecl::build)
        .collect::<Result<Vec<_>, _>>()?;
    let registry = Registry::new(models)?;

    let mut statements = Vec::new();
    for table in creation_order(&registry)?.iter().filter_map(|t| registry.get(t)) {
        let def = TableDef::from_model(table);
        statements.extend(def.create_statements(dialect));
        statements.extend(def.indexes.iter().map(|i| ddl::index_statement(&def.name, i, dialect)));
    }

    Ok(script::join_statements(&statements))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECLS: &str = r#"[
        { "name": "Membership", "references": [{ "target": "Team", "joinByDefault": true }],
          "uniques": [["team_id", "created"]] },
        { "name": "Team", "columns": [{ "name": "name", "dataType": "string", "typeParams": [64] }] }
    ]"#;

    #[test]
    fn test_plan_orders_tables() {
        let script = plan(DECLS, Dialect::MySql).unwrap();
        let team = script.find("CREATE TABLE IF NOT EXISTS `team`").unwrap();
        let membership = script.find("CREATE TABLE IF NOT EXISTS `membership`").unwrap();
        assert!(team < membership);
        assert!(script.contains("CREATE UNIQUE INDEX `membership_team_id_created_unique`"));
        assert!(script.contains("`name` varchar(64)"));
    }

    #[test]
    fn test_plan_postgres_enum_needs_no_type() {
        let decls = r#"[{ "name": "Membership",
            "columns": [{ "name": "role", "dataType": "enum", "typeParams": ["owner", "member"] }] }]"#;
        let script = plan(decls, Dialect::Postgres).unwrap();
        assert!(script.contains("\"role\" varchar CHECK"));
        assert!(!script.contains("membership_role"));
    }

    #[test]
    fn test_plan_migration_errors_are_strings() {
        let err = plan_migration("[{ \"name\": \"A\", \"references\": [{ \"target\": \"B\" }] }]", None)
            .unwrap_err();
        assert!(err.contains("unknown model 'B'"));
        assert!(plan_migration("nope", Some("sqlite".to_string())).is_err());
    }
}
