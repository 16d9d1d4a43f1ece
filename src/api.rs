//! Typed API surface derived from models.
//!
//! Each model gets an output object type, an input type for creation, a
//! list query with one equality argument per column, and create/delete
//! mutations. API names are camelCase, stored rows are snake_case; the
//! conversion happens here and nowhere else.

use crate::case;
use crate::column::{ColumnSpec, DataType};
use crate::db::{Database, DbError, Record};
use crate::model::{CREATED_COLUMN, IDENTITY_COLUMN, MODIFIED_COLUMN, Model};
use crate::query::{self, QueryContext, QueryError};
use crate::registry::Registry;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("type '{ty}' has no field '{field}'")]
    UnknownField { ty: String, field: String },
    #[error("'{field}' takes no argument '{argument}'")]
    UnknownArgument { field: String, argument: String },
    #[error("missing required value for '{0}'")]
    MissingValue(String),
    #[error("'{field}' expects {expected}")]
    InvalidValue { field: String, expected: TypeRef },
    #[error("duplicate field '{field}' on type '{ty}'")]
    DuplicateField { ty: String, field: String },
    #[error("join cycle: {0}")]
    CyclicJoin(String),
    #[error("row {0} was inserted but could not be read back")]
    MissingCreated(i64),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("create failed: {0}")]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    String,
    Boolean,
}

impl ScalarType {
    /// Foreign keys are always `Int`, whatever their declared type.
    pub fn of(spec: &ColumnSpec) -> Self {
        if spec.is_foreign_key() {
            return Self::Int;
        }

        match spec.data_type {
            DataType::Identity | DataType::Integer | DataType::BigInteger => Self::Int,
            DataType::Float => Self::Float,
            DataType::String | DataType::Enum | DataType::Timestamp | DataType::Json => Self::String,
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::Boolean => "Boolean",
        }
    }
}

#[derive(Debug, Clone)]
pub enum TypeRef {
    Scalar(ScalarType),
    Object(Arc<ObjectType>),
    Input(Arc<InputType>),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    pub fn non_null(self) -> Self {
        Self::NonNull(Box::new(self))
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// The scalar underneath any non-null wrapper.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(s) => Some(*s),
            Self::NonNull(inner) => inner.scalar(),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => f.write_str(s.name()),
            Self::Object(o) => f.write_str(&o.name),
            Self::Input(i) => f.write_str(&i.name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldSource {
    /// Read the row value under this column name.
    Column(String),
    /// Read the nested record attached under this joined table name.
    Join(String),
}

#[derive(Debug, Clone)]
pub struct OutputField {
    pub name: Arc<str>,
    pub ty: TypeRef,
    pub description: Option<String>,
    pub source: FieldSource,
}

#[derive(Debug)]
pub struct ObjectType {
    pub name: String,
    pub description: String,
    pub fields: Vec<OutputField>,
}

impl ObjectType {
    pub fn field(&self, name: &str) -> Option<&OutputField> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Resolve every field of this type from a query record. Joined fields
    /// whose record is missing are left out.
    pub fn resolve(&self, row: &Record) -> Record {
        let mut out = Record::new();

        for field in &self.fields {
            match (&field.source, &field.ty) {
                (FieldSource::Column(column), _) => {
                    out.insert(
                        field.name.to_string(),
                        row.get(column).cloned().unwrap_or(Value::Null),
                    );
                }
                (FieldSource::Join(table), TypeRef::Object(ty)) => {
                    if let Some(Value::Object(joined)) = row.get(table) {
                        out.insert(field.name.to_string(), Value::Object(ty.resolve(joined)));
                    }
                }
                (FieldSource::Join(_), _) => {}
            }
        }

        out
    }
}

#[derive(Debug, Clone)]
pub struct InputField {
    pub name: Arc<str>,
    pub ty: TypeRef,
    pub column: String,
}

#[derive(Debug)]
pub struct InputType {
    pub name: String,
    pub fields: Vec<InputField>,
}

impl InputType {
    pub fn field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|f| &*f.name == name)
    }

    /// Validate a camelCase input and turn it into a snake_case row.
    pub fn coerce(&self, input: &Record) -> Result<Record, ApiError> {
        let mut row = Record::new();

        for (key, value) in input {
            let field = self.field(key).ok_or_else(|| ApiError::UnknownField {
                ty: self.name.clone(),
                field: key.clone(),
            })?;
            check_value(&field.name, &field.ty, value)?;
            row.insert(field.column.clone(), value.clone());
        }

        for field in self.fields.iter().filter(|f| f.ty.is_non_null()) {
            if input.get(&*field.name).is_none_or(Value::is_null) {
                return Err(ApiError::MissingValue(field.name.to_string()));
            }
        }

        Ok(row)
    }
}

fn check_value(name: &str, ty: &TypeRef, value: &Value) -> Result<(), ApiError> {
    if value.is_null() {
        return if ty.is_non_null() {
            Err(ApiError::MissingValue(name.to_string()))
        } else {
            Ok(())
        };
    }

    match ty.scalar() {
        Some(scalar) if !scalar.accepts(value) => Err(ApiError::InvalidValue {
            field: name.to_string(),
            expected: ty.clone(),
        }),
        _ => Ok(()),
    }
}

fn check_unique<'a>(ty: &str, names: impl Iterator<Item = &'a Arc<str>>) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ApiError::DuplicateField {
                ty: ty.to_string(),
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

/// The output type of a model, built once per registry.
///
/// Joined models contribute their own cached output type, so the type a
/// model exposes and the type nested under whatever joins it are the same
/// `Arc`.
pub fn output_type(registry: &Registry, table: &str) -> Result<Arc<ObjectType>, ApiError> {
    build_output_type(registry, table, &mut Vec::new())
}

fn build_output_type(
    registry: &Registry,
    table: &str,
    visiting: &mut Vec<String>,
) -> Result<Arc<ObjectType>, ApiError> {
    let entry = registry
        .entry(table)
        .ok_or_else(|| ApiError::UnknownModel(table.to_string()))?;
    if let Some(ty) = entry.output.get() {
        return Ok(Arc::clone(ty));
    }
    if visiting.iter().any(|t| t == table) {
        visiting.push(table.to_string());
        return Err(ApiError::CyclicJoin(visiting.join(" -> ")));
    }
    visiting.push(table.to_string());

    let model = &entry.model;
    let mut fields: Vec<OutputField> = model
        .columns()
        .into_iter()
        .filter(|c| !c.flags.hidden)
        .map(|c| OutputField {
            name: case::to_camel(&c.name),
            ty: TypeRef::Scalar(ScalarType::of(&c)),
            description: c.description.clone(),
            source: FieldSource::Column(c.name),
        })
        .collect();

    for reference in model.joined_references() {
        let target_table = reference.target_table();
        let target = build_output_type(registry, &target_table, visiting)?;
        let description = Some(target.description.clone());
        fields.push(OutputField {
            name: case::to_camel(&target_table),
            ty: TypeRef::Object(target),
            description,
            source: FieldSource::Join(target_table.to_string()),
        });
    }
    visiting.pop();

    check_unique(model.display_name(), fields.iter().map(|f| &f.name))?;

    let description = if model.description().is_empty() {
        format!("Table {}", model.table_name())
    } else {
        model.description().to_string()
    };
    let built = Arc::new(ObjectType {
        name: model.display_name().to_string(),
        description,
        fields,
    });
    Ok(Arc::clone(entry.output.get_or_init(|| built)))
}

/// The creation input type of a model, built once per registry.
///
/// Leaves out the identity and audit columns and every immutable column
/// that cannot be set at creation.
pub fn input_type(registry: &Registry, table: &str) -> Result<Arc<InputType>, ApiError> {
    let entry = registry
        .entry(table)
        .ok_or_else(|| ApiError::UnknownModel(table.to_string()))?;
    if let Some(ty) = entry.input.get() {
        return Ok(Arc::clone(ty));
    }

    let model = &entry.model;
    let fields: Vec<InputField> = model
        .columns()
        .into_iter()
        .filter(|c| ![IDENTITY_COLUMN, CREATED_COLUMN, MODIFIED_COLUMN].contains(&c.name.as_str()))
        .filter(ColumnSpec::is_creatable)
        .map(|c| {
            let scalar = TypeRef::Scalar(ScalarType::of(&c));
            InputField {
                name: case::to_camel(&c.name),
                ty: if c.flags.not_nullable { scalar.non_null() } else { scalar },
                column: c.name,
            }
        })
        .collect();

    let name = format!("{}Attributes", model.display_name());
    check_unique(&name, fields.iter().map(|f| &f.name))?;

    let built = Arc::new(InputType { name, fields });
    Ok(Arc::clone(entry.input.get_or_init(|| built)))
}

#[derive(Debug, Clone)]
pub struct Argument {
    pub name: Arc<str>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct QueryField {
    pub name: String,
    pub table: String,
    pub ty: TypeRef,
    pub args: Vec<Argument>,
}

impl QueryField {
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.iter().find(|a| &*a.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Delete,
}

#[derive(Debug, Clone)]
pub struct MutationField {
    pub name: String,
    pub table: String,
    pub kind: MutationKind,
    pub ty: TypeRef,
    pub args: Vec<Argument>,
}

/// `<camelPluralName>(<column>: <scalar>, ...): [<Model>]`
pub fn query_field(registry: &Registry, model: &Model) -> Result<QueryField, ApiError> {
    let output = output_type(registry, model.table_name())?;
    let args = model
        .columns()
        .iter()
        .map(|c| Argument {
            name: case::to_camel(&c.name),
            ty: TypeRef::Scalar(ScalarType::of(c)),
        })
        .collect();

    Ok(QueryField {
        name: model.camel_plural_name().to_string(),
        table: model.table_name().to_string(),
        ty: TypeRef::Object(output).list(),
        args,
    })
}

/// `create<Model>(input: <Model>Attributes!): <Model>` and
/// `delete<Model>(id: Int!): Boolean`
pub fn mutation_fields(registry: &Registry, model: &Model) -> Result<[MutationField; 2], ApiError> {
    let table = model.table_name();
    let output = output_type(registry, table)?;
    let input = input_type(registry, table)?;

    Ok([
        MutationField {
            name: format!("create{}", model.display_name()),
            table: table.to_string(),
            kind: MutationKind::Create,
            ty: TypeRef::Object(output),
            args: vec![Argument {
                name: Arc::from("input"),
                ty: TypeRef::Input(input).non_null(),
            }],
        },
        MutationField {
            name: format!("delete{}", model.display_name()),
            table: table.to_string(),
            kind: MutationKind::Delete,
            ty: TypeRef::Scalar(ScalarType::Boolean),
            args: vec![Argument {
                name: case::to_camel(IDENTITY_COLUMN),
                ty: TypeRef::Scalar(ScalarType::Int).non_null(),
            }],
        },
    ])
}

/// Root query and mutation field maps for every registered model.
#[derive(Debug, Clone, Default)]
pub struct ApiSchema {
    pub queries: BTreeMap<String, QueryField>,
    pub mutations: BTreeMap<String, MutationField>,
}

impl ApiSchema {
    pub fn build(registry: &Registry) -> Result<Self, ApiError> {
        let mut schema = Self::default();

        for model in registry.models() {
            let query = query_field(registry, model)?;
            if schema.queries.contains_key(&query.name) {
                return Err(ApiError::DuplicateField {
                    ty: "Query".to_string(),
                    field: query.name,
                });
            }
            schema.queries.insert(query.name.clone(), query);

            for mutation in mutation_fields(registry, model)? {
                if schema.mutations.contains_key(&mutation.name) {
                    return Err(ApiError::DuplicateField {
                        ty: "Mutation".to_string(),
                        field: mutation.name,
                    });
                }
                schema.mutations.insert(mutation.name.clone(), mutation);
            }
        }

        Ok(schema)
    }
}

/// Resolves root fields against a database.
pub struct Executor<'a> {
    registry: &'a Registry,
    db: &'a dyn Database,
    schema: ApiSchema,
}

impl<'a> Executor<'a> {
    pub fn new(registry: &'a Registry, db: &'a dyn Database) -> Result<Self, ApiError> {
        Ok(Self {
            registry,
            db,
            schema: ApiSchema::build(registry)?,
        })
    }

    pub fn schema(&self) -> &ApiSchema {
        &self.schema
    }

    fn model(&self, table: &str) -> Result<&'a Arc<Model>, ApiError> {
        self.registry
            .get(table)
            .ok_or_else(|| ApiError::UnknownModel(table.to_string()))
    }

    /// Resolve a list query. `args` are camelCase column filters.
    pub async fn query(&self, field: &str, args: &Record) -> Result<Vec<Record>, ApiError> {
        let root = self.schema.queries.get(field).ok_or_else(|| ApiError::UnknownField {
            ty: "Query".to_string(),
            field: field.to_string(),
        })?;
        for (name, value) in args {
            let arg = root.arg(name).ok_or_else(|| ApiError::UnknownArgument {
                field: field.to_string(),
                argument: name.clone(),
            })?;
            check_value(&arg.name, &arg.ty, value)?;
        }

        let model = self.model(&root.table)?;
        let output = output_type(self.registry, &root.table)?;
        let cx = QueryContext {
            registry: self.registry,
            db: self.db,
            model,
        };
        let rows = query::run(&cx, args).await?;

        Ok(rows.iter().map(|row| output.resolve(row)).collect())
    }

    /// Resolve a mutation: `{"input": {...}}` for create, `{"id": n}` for delete.
    pub async fn mutate(&self, field: &str, args: &Record) -> Result<Value, ApiError> {
        let root = self.schema.mutations.get(field).ok_or_else(|| ApiError::UnknownField {
            ty: "Mutation".to_string(),
            field: field.to_string(),
        })?;

        match root.kind {
            MutationKind::Create => {
                let input = args
                    .get("input")
                    .and_then(Value::as_object)
                    .ok_or_else(|| ApiError::MissingValue("input".to_string()))?;
                Ok(Value::Object(self.create(&root.table, input).await?))
            }
            MutationKind::Delete => {
                let id = args
                    .get(IDENTITY_COLUMN)
                    .and_then(Value::as_i64)
                    .ok_or_else(|| ApiError::MissingValue(IDENTITY_COLUMN.to_string()))?;
                Ok(Value::Bool(self.delete(&root.table, id).await?))
            }
        }
    }

    /// Insert a row from a camelCase input and return it as the output type.
    pub async fn create(&self, table: &str, input: &Record) -> Result<Record, ApiError> {
        let model = self.model(table)?;
        let row = input_type(self.registry, table)?.coerce(input)?;
        let id = self.db.insert(table, &row).await?;

        let mut filter = Record::new();
        filter.insert(IDENTITY_COLUMN.to_string(), Value::from(id));
        let cx = QueryContext {
            registry: self.registry,
            db: self.db,
            model,
        };
        let rows = query::default_query(&cx, &filter).await?;
        let output = output_type(self.registry, table)?;

        rows.first()
            .map(|row| output.resolve(row))
            .ok_or(ApiError::MissingCreated(id))
    }

    /// Delete by identity. True iff a row was removed; engine failures are
    /// logged and reported as false.
    pub async fn delete(&self, table: &str, id: i64) -> Result<bool, ApiError> {
        self.model(table)?;

        let mut filter = Record::new();
        filter.insert(IDENTITY_COLUMN.to_string(), Value::from(id));
        match self.db.delete(table, &filter).await {
            Ok(affected) => Ok(affected > 0),
            Err(e) => {
                warn!(table, id, error = %e, "delete failed");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ReferenceSpec;
    use crate::fixtures;
    use crate::memory::MemoryDatabase;
    use crate::model::ModelDecl;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn field_names(ty: &ObjectType) -> Vec<&str> {
        ty.fields.iter().map(|f| &*f.name).collect()
    }

    #[test]
    fn test_output_type_fields() {
        let registry = fixtures::registry();
        let ty = output_type(&registry, "membership").unwrap();

        assert_eq!(ty.name, "Membership");
        assert_eq!(ty.description, "Table membership");
        assert_eq!(
            field_names(&ty),
            vec!["id", "teamId", "userId", "role", "created", "modified", "team"]
        );
        assert_eq!(ty.field("teamId").unwrap().ty.scalar(), Some(ScalarType::Int));
        assert_eq!(ty.field("role").unwrap().ty.scalar(), Some(ScalarType::String));
        assert_eq!(
            ty.field("team").unwrap().source,
            FieldSource::Join("team".to_string())
        );
    }

    #[test]
    fn test_hidden_column_not_exposed() {
        let registry = fixtures::registry();
        let ty = output_type(&registry, "user").unwrap();
        assert!(ty.field("password").is_none());
        assert!(ty.field("email").is_some());
    }

    #[test]
    fn test_output_types_are_shared() {
        let registry = fixtures::registry();
        let membership = output_type(&registry, "membership").unwrap();
        let team = output_type(&registry, "team").unwrap();

        assert!(Arc::ptr_eq(&membership, &output_type(&registry, "membership").unwrap()));
        match &membership.field("team").unwrap().ty {
            TypeRef::Object(nested) => assert!(Arc::ptr_eq(nested, &team)),
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_string_foreign_key_is_int() {
        let registry = Registry::new([
            fixtures::user(),
            ModelDecl::new("Note")
                .column(ColumnSpec::new("author", DataType::String).references("user.id"))
                .build()
                .unwrap(),
        ])
        .unwrap();

        let output = output_type(&registry, "note").unwrap();
        assert_eq!(output.field("author").unwrap().ty.scalar(), Some(ScalarType::Int));
        let input = input_type(&registry, "note").unwrap();
        assert_eq!(input.field("author").unwrap().ty.scalar(), Some(ScalarType::Int));
    }

    #[test]
    fn test_input_type_fields() {
        let registry = Registry::new([ModelDecl::new("Account")
            .column(ColumnSpec::new("handle", DataType::String).not_nullable())
            .column(ColumnSpec::new("slug", DataType::String).immutable())
            .column(ColumnSpec::new("code", DataType::String).immutable().can_create())
            .column(ColumnSpec::new("score", DataType::Float))
            .build()
            .unwrap()])
        .unwrap();

        let input = input_type(&registry, "account").unwrap();
        assert_eq!(input.name, "AccountAttributes");
        let names: Vec<&str> = input.fields.iter().map(|f| &*f.name).collect();
        assert_eq!(names, vec!["handle", "code", "score"]);
        assert_eq!(input.field("handle").unwrap().ty.to_string(), "String!");
        assert_eq!(input.field("score").unwrap().ty.to_string(), "Float");
        assert!(Arc::ptr_eq(&input, &input_type(&registry, "account").unwrap()));
    }

    #[test]
    fn test_coerce_input() {
        let registry = fixtures::registry();
        let input = input_type(&registry, "membership").unwrap();

        let row = input.coerce(&record(json!({ "teamId": 1, "userId": 2 }))).unwrap();
        assert_eq!(row, record(json!({ "team_id": 1, "user_id": 2 })));

        let err = input.coerce(&record(json!({ "teamId": "one" }))).unwrap_err();
        assert!(matches!(err, ApiError::InvalidValue { field, .. } if field == "teamId"));

        let err = input.coerce(&record(json!({ "id": 4 }))).unwrap_err();
        assert!(matches!(err, ApiError::UnknownField { field, .. } if field == "id"));

        let users = input_type(&registry, "user").unwrap();
        let err = users.coerce(&Record::new()).unwrap_err();
        assert!(matches!(err, ApiError::MissingValue(field) if field == "email"));
    }

    #[test]
    fn test_schema_root_fields() {
        let registry = fixtures::registry();
        let schema = ApiSchema::build(&registry).unwrap();

        let memberships = &schema.queries["memberships"];
        assert_eq!(memberships.ty.to_string(), "[Membership]");
        assert_eq!(memberships.arg("teamId").unwrap().ty.scalar(), Some(ScalarType::Int));
        // hidden columns stay filterable
        assert!(schema.queries["users"].arg("password").is_some());

        let create = &schema.mutations["createTeam"];
        assert_eq!(create.kind, MutationKind::Create);
        assert_eq!(create.args[0].ty.to_string(), "TeamAttributes!");
        let delete = &schema.mutations["deleteTeam"];
        assert_eq!(delete.ty.to_string(), "Boolean");
        assert_eq!(delete.args[0].ty.to_string(), "Int!");
    }

    #[test]
    fn test_cyclic_join_detected() {
        let registry = Registry::new([
            ModelDecl::new("Egg")
                .reference(ReferenceSpec::new("Hen").join())
                .build()
                .unwrap(),
            ModelDecl::new("Hen")
                .reference(ReferenceSpec::new("Egg").join())
                .build()
                .unwrap(),
        ])
        .unwrap();

        let err = output_type(&registry, "egg").unwrap_err();
        assert!(matches!(err, ApiError::CyclicJoin(path) if path == "egg -> hen -> egg"));
    }

    #[tokio::test]
    async fn test_query_resolves_nested_join() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;
        let executor = Executor::new(&registry, &db).unwrap();

        let rows = executor.query("memberships", &Record::new()).await.unwrap();
        assert_eq!(rows.len(), 2);

        let joined = rows.iter().find(|r| r["userId"] == json!(1)).unwrap();
        assert_eq!(joined["teamId"], json!(1));
        assert_eq!(joined["team"]["name"], json!("core"));
        assert_eq!(joined["role"], json!("member"));

        let orphan = rows.iter().find(|r| r["userId"] == json!(2)).unwrap();
        assert!(orphan.get("team").is_none());
        assert_eq!(orphan["teamId"], Value::Null);
    }

    #[tokio::test]
    async fn test_query_argument_checks() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;
        let executor = Executor::new(&registry, &db).unwrap();

        let err = executor
            .query("memberships", &record(json!({ "colour": 1 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownArgument { argument, .. } if argument == "colour"));

        let err = executor
            .query("memberships", &record(json!({ "teamId": "x" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidValue { .. }));

        let err = executor.query("nothing", &Record::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::UnknownField { .. }));
    }

    #[tokio::test]
    async fn test_create_returns_output_record() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;
        let executor = Executor::new(&registry, &db).unwrap();

        let created = executor
            .mutate(
                "createMembership",
                &record(json!({ "input": { "teamId": 1, "userId": 2, "role": "owner" } })),
            )
            .await
            .unwrap();

        assert_eq!(created["id"], json!(3));
        assert_eq!(created["role"], json!("owner"));
        assert_eq!(created["team"]["name"], json!("core"));
        assert!(created["created"].is_string());
    }

    #[tokio::test]
    async fn test_create_constraint_violation_propagates() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;
        let executor = Executor::new(&registry, &db).unwrap();

        // email is unique
        let err = executor
            .create("user", &record(json!({ "email": "alice@example.com" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Db(DbError::Constraint { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let registry = fixtures::registry();
        let db = fixtures::seeded(&registry).await;
        let executor = Executor::new(&registry, &db).unwrap();

        let missing = executor
            .mutate("deleteMembership", &record(json!({ "id": 999 })))
            .await
            .unwrap();
        assert_eq!(missing, json!(false));

        let removed = executor
            .mutate("deleteMembership", &record(json!({ "id": 1 })))
            .await
            .unwrap();
        assert_eq!(removed, json!(true));

        let rows = executor
            .query("memberships", &record(json!({ "id": 1 })))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_delete_engine_error_is_false() {
        let registry = fixtures::registry();
        // tables never created
        let db = MemoryDatabase::new();
        let executor = Executor::new(&registry, &db).unwrap();
        assert!(!executor.delete("team", 1).await.unwrap());
    }
}
