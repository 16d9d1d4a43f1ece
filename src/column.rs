//! Column and reference metadata declared by models.

use crate::case;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Declared column data types.
///
/// Adding a variant means extending both the DDL dispatch in `ddl` and the
/// scalar mapping in `api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DataType {
    #[serde(alias = "increments")]
    Identity,
    Integer,
    BigInteger,
    String,
    Float,
    Enum,
    Timestamp,
    Json,
}

/// Column default: a literal or an engine expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DefaultValue {
    /// Current timestamp at insert.
    CurrentTimestamp,
    /// Current timestamp at insert, refreshed on every update.
    CurrentTimestampOnUpdate,
    Literal(Value),
    /// Raw SQL expression, passed through untouched.
    Raw(String),
}

/// Boolean column flags. Shared between own columns and the foreign-key
/// columns derived from references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnFlags {
    pub unique: bool,
    pub indexed: bool,
    pub not_nullable: bool,
    pub immutable: bool,
    pub hidden: bool,
    pub queryable: bool,
    pub sortable: bool,
    /// Immutable, but still settable when the row is created.
    pub can_create_despite_immutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
    /// Type specific parameters: string length, enum variants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<Value>,
    #[serde(flatten)]
    pub flags: ColumnFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<DefaultValue>,
    /// `table.column` this column is a foreign key to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            type_params: Vec::new(),
            flags: ColumnFlags::default(),
            default_value: None,
            references_table: None,
            description: None,
        }
    }

    pub fn param(mut self, param: impl Into<Value>) -> Self {
        self.type_params.push(param.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.flags.unique = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.flags.indexed = true;
        self
    }

    pub fn not_nullable(mut self) -> Self {
        self.flags.not_nullable = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.flags.immutable = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.flags.hidden = true;
        self
    }

    pub fn queryable(mut self) -> Self {
        self.flags.queryable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.flags.sortable = true;
        self
    }

    pub fn can_create(mut self) -> Self {
        self.flags.can_create_despite_immutable = true;
        self
    }

    pub fn default_to(mut self, value: DefaultValue) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Make this column a foreign key to `table.column` (or `table`, meaning `table.id`).
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.references_table = Some(target.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_foreign_key(&self) -> bool {
        self.references_table.is_some()
    }

    /// Table part of `references_table`.
    pub fn referenced_table(&self) -> Option<&str> {
        self.references_table
            .as_deref()
            .map(|target| target.split('.').next().unwrap_or(target))
    }

    /// Column part of `references_table`, `id` when omitted.
    pub fn referenced_column(&self) -> Option<&str> {
        self.references_table
            .as_deref()
            .map(|target| target.split_once('.').map_or("id", |(_, column)| column))
    }

    /// Whether the API may set this column when creating a row.
    pub fn is_creatable(&self) -> bool {
        !self.flags.immutable || self.flags.can_create_despite_immutable
    }
}

/// A model-to-model edge. The referencing model gains a foreign-key column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceSpec {
    /// Declared name of the referenced model.
    pub target: String,
    /// Foreign-key column on the referencing table, default `<target table>_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Referenced column, default `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub join_by_default: bool,
    /// Flags merged into the derived foreign-key column.
    #[serde(default)]
    pub column: ColumnFlags,
}

impl ReferenceSpec {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            from: None,
            to: None,
            join_by_default: false,
            column: ColumnFlags::default(),
        }
    }

    pub fn from_column(mut self, column: impl Into<String>) -> Self {
        self.from = Some(column.into());
        self
    }

    pub fn to_column(mut self, column: impl Into<String>) -> Self {
        self.to = Some(column.into());
        self
    }

    pub fn join(mut self) -> Self {
        self.join_by_default = true;
        self
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.column = flags;
        self
    }

    pub fn target_table(&self) -> Arc<str> {
        case::to_snake(&self.target)
    }

    pub fn source_column(&self) -> String {
        self.from
            .clone()
            .unwrap_or_else(|| format!("{}_id", self.target_table()))
    }

    pub fn target_column(&self) -> &str {
        self.to.as_deref().unwrap_or("id")
    }

    /// The foreign-key column this reference contributes to the effective list.
    pub fn column_spec(&self) -> ColumnSpec {
        ColumnSpec {
            flags: self.column.clone(),
            references_table: Some(format!("{}.{}", self.target_table(), self.target_column())),
            ..ColumnSpec::new(self.source_column(), DataType::Integer)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    BTree,
    Hash,
    FullText,
}

/// A named composite index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<IndexKind>,
}

impl IndexSpec {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            name: None,
            kind: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn kind(mut self, kind: IndexKind) -> Self {
        self.kind = Some(kind);
        self
    }
}
