//! Shared test models: teams, users and the memberships between them.

use crate::column::{ColumnSpec, DataType, DefaultValue, ReferenceSpec};
use crate::db::{Database, Record};
use crate::memory::MemoryDatabase;
use crate::model::{Model, ModelDecl};
use crate::order::create_all_tables;
use crate::registry::Registry;
use serde_json::{Value, json};

pub fn name_column() -> ColumnSpec {
    ColumnSpec::new("name", DataType::String).param(64).not_nullable()
}

pub fn team() -> Model {
    ModelDecl::new("Team").column(name_column()).build().unwrap()
}

pub fn user() -> Model {
    ModelDecl::new("User")
        .column(ColumnSpec::new("email", DataType::String).unique().not_nullable())
        .column(ColumnSpec::new("password", DataType::String).hidden())
        .build()
        .unwrap()
}

/// Joins its team by default, but not its user.
pub fn membership() -> Model {
    ModelDecl::new("Membership")
        .reference(ReferenceSpec::new("Team").join())
        .reference(ReferenceSpec::new("User"))
        .column(
            ColumnSpec::new("role", DataType::Enum)
                .param("owner")
                .param("member")
                .default_to(DefaultValue::Literal(json!("member"))),
        )
        .build()
        .unwrap()
}

pub fn registry() -> Registry {
    registry_with_team(team())
}

pub fn registry_with_team(team: Model) -> Registry {
    Registry::new([team, user(), membership()]).unwrap()
}

fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

/// Team 1 "core"; users 1 and 2; membership 1 joins team 1, membership 2 has no team.
pub async fn seeded(registry: &Registry) -> MemoryDatabase {
    let db = MemoryDatabase::new();
    create_all_tables(registry, &db).await.unwrap();

    for (table, row) in [
        ("team", json!({ "name": "core" })),
        ("user", json!({ "email": "alice@example.com", "password": "secret" })),
        ("user", json!({ "email": "bob@example.com" })),
        ("membership", json!({ "team_id": 1, "user_id": 1 })),
        ("membership", json!({ "user_id": 2 })),
    ] {
        db.insert(table, &record(row)).await.unwrap();
    }

    db
}
