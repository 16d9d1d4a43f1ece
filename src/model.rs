//! Model declarations and their derived names and effective columns.

use crate::case;
use crate::column::{ColumnSpec, DataType, DefaultValue, IndexSpec, ReferenceSpec};
use crate::db::Record;
use crate::query::{QueryStrategy, SelectColumn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

pub const IDENTITY_COLUMN: &str = "id";
pub const CREATED_COLUMN: &str = "created";
pub const MODIFIED_COLUMN: &str = "modified";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model name must not be empty")]
    EmptyName,
    #[error("duplicate column '{column}' in model '{model}'")]
    DuplicateColumn { model: String, column: String },
    #[error("table '{0}' is declared by more than one model")]
    DuplicateTable(String),
    #[error("model '{model}' references unknown model '{target}'")]
    UnknownModel { model: String, target: String },
    #[error("model '{model}' joins table '{table}' more than once")]
    DuplicateJoin { model: String, table: String },
    #[error("column '{model}.{column}' references unknown table '{table}'")]
    UnknownTable {
        model: String,
        column: String,
        table: String,
    },
}

/// Static declaration of one table.
///
/// Starts from empty defaults; each model overrides what it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDecl {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Own columns, without identity, reference and audit columns.
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
    #[serde(default)]
    pub references: Vec<ReferenceSpec>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    #[serde(default)]
    pub uniques: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plural_name: Option<String>,
}

impl ModelDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub fn reference(mut self, reference: ReferenceSpec) -> Self {
        self.references.push(reference);
        self
    }

    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.uniques.push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural_name = Some(plural.into());
        self
    }

    pub fn build(self) -> Result<Model, ModelError> {
        self.build_with(Hooks::default())
    }

    pub fn build_with(self, hooks: Hooks) -> Result<Model, ModelError> {
        Model::new(self, hooks)
    }
}

pub type SerializeFn = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// Per-model behavior overrides, fixed at declaration time.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Replaces the default join/filter query entirely.
    pub query: Option<Arc<dyn QueryStrategy>>,
    /// Applied to every row of this model read by a query.
    pub serialize: Option<SerializeFn>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("query", &self.query.is_some())
            .field("serialize", &self.serialize.is_some())
            .finish()
    }
}

#[derive(Debug)]
pub struct Model {
    decl: ModelDecl,
    hooks: Hooks,
    table_name: OnceLock<Arc<str>>,
    camel_name: OnceLock<Arc<str>>,
    camel_plural_name: OnceLock<Arc<str>>,
}

impl Model {
    pub fn new(decl: ModelDecl, hooks: Hooks) -> Result<Self, ModelError> {
        if decl.name.is_empty() {
            return Err(ModelError::EmptyName);
        }

        let model = Self {
            decl,
            hooks,
            table_name: OnceLock::new(),
            camel_name: OnceLock::new(),
            camel_plural_name: OnceLock::new(),
        };

        let mut seen = HashSet::new();
        for column in model.columns() {
            if !seen.insert(column.name.clone()) {
                return Err(ModelError::DuplicateColumn {
                    model: model.decl.name.clone(),
                    column: column.name,
                });
            }
        }

        Ok(model)
    }

    /// Declared identifier, e.g. `TeamMember`.
    pub fn display_name(&self) -> &str {
        &self.decl.name
    }

    pub fn description(&self) -> &str {
        &self.decl.description
    }

    /// `TeamMember` -> `team_member`
    pub fn table_name(&self) -> &str {
        self.table_name
            .get_or_init(|| case::to_snake(&self.decl.name))
    }

    /// `team_member` -> `teamMember`
    pub fn camel_name(&self) -> &str {
        self.camel_name
            .get_or_init(|| case::to_camel(self.table_name()))
    }

    pub fn camel_plural_name(&self) -> &str {
        self.camel_plural_name.get_or_init(|| match &self.decl.plural_name {
            Some(plural) => Arc::from(plural.as_str()),
            None => Arc::from(format!("{}s", self.camel_name())),
        })
    }

    pub fn own_columns(&self) -> &[ColumnSpec] {
        &self.decl.columns
    }

    pub fn references(&self) -> &[ReferenceSpec] {
        &self.decl.references
    }

    pub fn joined_references(&self) -> impl Iterator<Item = &ReferenceSpec> {
        self.decl.references.iter().filter(|r| r.join_by_default)
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.decl.indexes
    }

    pub fn uniques(&self) -> &[Vec<String>] {
        &self.decl.uniques
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Identity, reference, own and audit columns, in that order.
    /// Rebuilt on every call.
    pub fn columns(&self) -> Vec<ColumnSpec> {
        let mut columns = Vec::with_capacity(self.decl.columns.len() + self.decl.references.len() + 3);

        columns.push(
            ColumnSpec::new(IDENTITY_COLUMN, DataType::Identity)
                .immutable()
                .queryable(),
        );
        columns.extend(self.decl.references.iter().map(ReferenceSpec::column_spec));
        columns.extend(self.decl.columns.iter().cloned());
        columns.push(
            ColumnSpec::new(CREATED_COLUMN, DataType::Timestamp)
                .default_to(DefaultValue::CurrentTimestamp)
                .immutable()
                .sortable()
                .indexed(),
        );
        columns.push(
            ColumnSpec::new(MODIFIED_COLUMN, DataType::Timestamp)
                .default_to(DefaultValue::CurrentTimestampOnUpdate)
                .immutable()
                .sortable()
                .indexed(),
        );

        columns
    }

    pub fn column(&self, name: &str) -> Option<ColumnSpec> {
        self.columns().into_iter().find(|c| c.name == name)
    }

    /// Tables this model points at through foreign keys, in declaration order.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        for column in self.columns() {
            if let Some(table) = column.referenced_table() {
                if !tables.iter().any(|t| t == table) {
                    tables.push(table.to_string());
                }
            }
        }
        tables
    }

    /// Non-hidden columns of `table` projected under their camelCase alias.
    pub fn aliased_columns(&self, table: &str) -> Vec<SelectColumn> {
        self.columns()
            .into_iter()
            .filter(|c| !c.flags.hidden)
            .map(|c| SelectColumn {
                table: table.to_string(),
                alias: Some(case::to_camel(&c.name).to_string()),
                column: c.name,
            })
            .collect()
    }

    /// `table.column AS alias` for every non-hidden column.
    pub fn aliased_column_names(&self, table: &str) -> Vec<String> {
        self.aliased_columns(table)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Run the serialization hook, identity when none is installed.
    pub fn serialize(&self, row: Record) -> Record {
        match &self.hooks.serialize {
            Some(serialize) => serialize(row),
            None => row,
        }
    }
}
