//! Table definitions derived from models, and idempotent table creation.

use crate::column::{ColumnSpec, DataType, DefaultValue, IndexKind};
use crate::db::{Database, DbError};
use crate::dialect::{Dialect, render};
use crate::model::Model;
use sea_query::{
    Alias, Expr, ForeignKey, Index, IndexType, SimpleExpr, Table,
};
use serde_json::Value;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnKind {
    /// Auto-incrementing primary key.
    Identity,
    Integer,
    BigInteger,
    /// Foreign keys, whatever their declared type.
    UnsignedInteger,
    String(Option<u32>),
    Float,
    Enum(Vec<String>),
    Timestamp,
    Json,
}

impl ColumnKind {
    pub fn of(spec: &ColumnSpec) -> Self {
        if spec.is_foreign_key() {
            return Self::UnsignedInteger;
        }

        match spec.data_type {
            DataType::Identity => Self::Identity,
            DataType::Integer => Self::Integer,
            DataType::BigInteger => Self::BigInteger,
            DataType::String => Self::String(
                spec.type_params
                    .first()
                    .and_then(Value::as_u64)
                    .and_then(|len| u32::try_from(len).ok()),
            ),
            DataType::Float => Self::Float,
            DataType::Enum => Self::Enum(
                spec.type_params
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            DataType::Timestamp => Self::Timestamp,
            DataType::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub unique: bool,
    pub indexed: bool,
    pub not_null: bool,
    pub default: Option<DefaultValue>,
    pub references: Option<ForeignKeyDef>,
}

impl ColumnDef {
    pub fn from_spec(spec: &ColumnSpec) -> Self {
        let references = match (spec.referenced_table(), spec.referenced_column()) {
            (Some(table), Some(column)) => Some(ForeignKeyDef {
                table: table.to_string(),
                column: column.to_string(),
            }),
            _ => None,
        };

        Self {
            name: spec.name.clone(),
            kind: ColumnKind::of(spec),
            unique: spec.flags.unique,
            indexed: spec.flags.indexed,
            not_null: spec.flags.not_nullable,
            default: spec.default_value.clone(),
            references,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub kind: Option<IndexKind>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Composite indexes and uniqueness constraints, applied after the table exists.
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn from_model(model: &Model) -> Self {
        let table = model.table_name();
        let columns = model.columns().iter().map(ColumnDef::from_spec).collect();

        let mut indexes: Vec<IndexDef> = model
            .indexes()
            .iter()
            .map(|i| IndexDef {
                name: i
                    .name
                    .clone()
                    .unwrap_or_else(|| index_name(table, &i.columns, "index")),
                columns: i.columns.clone(),
                unique: false,
                kind: i.kind,
            })
            .collect();
        indexes.extend(model.uniques().iter().map(|columns| IndexDef {
            name: index_name(table, columns, "unique"),
            columns: columns.clone(),
            unique: true,
            kind: None,
        }));

        Self {
            name: table.to_string(),
            columns,
            indexes,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// CREATE TABLE plus one CREATE INDEX per indexed column.
    pub fn create_statements(&self, dialect: Dialect) -> Vec<String> {
        let mut stmt = Table::create();
        stmt.table(Alias::new(&self.name)).if_not_exists();

        for column in &self.columns {
            stmt.col(&mut column_def(column, &self.name, dialect));
        }
        for column in &self.columns {
            if let Some(fk) = &column.references {
                stmt.foreign_key(
                    ForeignKey::create()
                        .name(index_name(&self.name, std::slice::from_ref(&column.name), "foreign"))
                        .from(Alias::new(&self.name), Alias::new(&column.name))
                        .to(Alias::new(&fk.table), Alias::new(&fk.column)),
                );
            }
        }

        let mut statements = vec![render!(stmt, dialect)];
        statements.extend(
            self.columns
                .iter()
                .filter(|c| c.indexed)
                .map(|c| IndexDef {
                    name: index_name(&self.name, std::slice::from_ref(&c.name), "index"),
                    columns: vec![c.name.clone()],
                    unique: false,
                    kind: None,
                })
                .map(|index| index_statement(&self.name, &index, dialect)),
        );
        statements
    }

    pub fn drop_statement(&self, dialect: Dialect) -> String {
        drop_statement(&self.name, dialect)
    }
}

/// `<table>_<col>_<col>_<suffix>`, the conventional constraint name.
pub fn index_name(table: &str, columns: &[String], suffix: &str) -> String {
    format!("{}_{}_{}", table, columns.join("_"), suffix)
}

pub fn index_statement(table: &str, index: &IndexDef, dialect: Dialect) -> String {
    let mut stmt = Index::create();
    stmt.name(&index.name).table(Alias::new(table));
    for column in &index.columns {
        stmt.col(Alias::new(column));
    }
    if index.unique {
        stmt.unique();
    }
    match index.kind {
        Some(IndexKind::BTree) => {
            stmt.index_type(IndexType::BTree);
        }
        Some(IndexKind::Hash) => {
            stmt.index_type(IndexType::Hash);
        }
        Some(IndexKind::FullText) => {
            stmt.full_text();
        }
        None => {}
    }
    render!(stmt, dialect)
}

pub fn drop_statement(table: &str, dialect: Dialect) -> String {
    let stmt = Table::drop().table(Alias::new(table)).if_exists().to_owned();
    render!(stmt, dialect)
}

fn column_def(column: &ColumnDef, table: &str, dialect: Dialect) -> sea_query::ColumnDef {
    let mut def = sea_query::ColumnDef::new(Alias::new(&column.name));

    match &column.kind {
        ColumnKind::Identity => {
            // Foreign keys are unsigned on MySQL, so the key they point at must be too.
            if dialect == Dialect::MySql {
                def.unsigned();
            } else {
                def.integer();
            }
            def.not_null().auto_increment().primary_key();
        }
        ColumnKind::Integer => {
            def.integer();
        }
        ColumnKind::BigInteger => {
            def.big_integer();
        }
        ColumnKind::UnsignedInteger => {
            def.unsigned();
        }
        ColumnKind::String(Some(len)) => {
            def.string_len(*len);
        }
        ColumnKind::String(None) => {
            def.string();
        }
        ColumnKind::Float => {
            def.float();
        }
        ColumnKind::Enum(variants) if dialect == Dialect::MySql => {
            def.enumeration(
                Alias::new(format!("{}_{}", table, column.name)),
                variants.iter().map(|v| Alias::new(v.as_str())),
            );
        }
        // Elsewhere a named enum type would need its own CREATE TYPE.
        ColumnKind::Enum(variants) => {
            def.string()
                .check(Expr::col(Alias::new(&column.name)).is_in(variants.iter().map(String::as_str)));
        }
        ColumnKind::Timestamp => {
            def.timestamp();
        }
        ColumnKind::Json => {
            def.json();
        }
    }

    if column.unique {
        def.unique_key();
    }
    if column.not_null {
        def.not_null();
    }
    match &column.default {
        Some(DefaultValue::CurrentTimestamp) => {
            def.default(Expr::current_timestamp());
        }
        Some(DefaultValue::CurrentTimestampOnUpdate) => {
            def.default(Expr::current_timestamp());
            if dialect == Dialect::MySql {
                def.extra("ON UPDATE CURRENT_TIMESTAMP");
            }
        }
        Some(DefaultValue::Literal(value)) => {
            def.default(literal(value));
        }
        Some(DefaultValue::Raw(sql)) => {
            def.default(Expr::cust(sql.clone()));
        }
        None => {}
    }

    def
}

fn literal(value: &Value) -> SimpleExpr {
    match value {
        Value::Null => Expr::cust("NULL"),
        Value::Bool(b) => SimpleExpr::Value((*b).into()),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SimpleExpr::Value(i.into()),
            None => SimpleExpr::Value(n.as_f64().unwrap_or_default().into()),
        },
        Value::String(s) => SimpleExpr::Value(s.clone().into()),
        other => SimpleExpr::Value(other.to_string().into()),
    }
}

/// What `create_table` did.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateReport {
    pub table: String,
    /// False when the table already existed and nothing was issued.
    pub created: bool,
    /// Indexes and uniqueness constraints that could not be added.
    pub failures: Vec<IndexFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexFailure {
    pub index: String,
    pub error: String,
}

impl CreateReport {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl Model {
    /// Create this model's table unless it already exists.
    ///
    /// Composite indexes and uniqueness constraints are added one at a time;
    /// a failing one is recorded in the report and the rest still run.
    pub async fn create_table(&self, db: &dyn Database) -> Result<CreateReport, DbError> {
        let table = TableDef::from_model(self);

        if db.has_table(&table.name).await? {
            debug!(table = %table.name, "table exists, skipping");
            return Ok(CreateReport {
                table: table.name,
                created: false,
                failures: Vec::new(),
            });
        }

        db.create_table(&table).await?;
        info!(table = %table.name, "created table");

        let mut failures = Vec::new();
        for index in &table.indexes {
            if let Err(e) = db.create_index(&table.name, index).await {
                warn!(table = %table.name, index = %index.name, error = %e, "failed to add index");
                failures.push(IndexFailure {
                    index: index.name.clone(),
                    error: e.to_string(),
                });
            }
        }

        Ok(CreateReport {
            table: table.name,
            created: true,
            failures,
        })
    }

    /// Drop this model's table if it exists.
    pub async fn drop_table(&self, db: &dyn Database) -> Result<(), DbError> {
        db.drop_table(self.table_name()).await
    }
}
