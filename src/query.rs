//! Select/join/filter queries over a model and the models it joins.

use crate::case;
use crate::db::{Database, DbError, NestedRow, Record};
use crate::dialect::{Dialect, render};
use crate::model::Model;
use crate::registry::Registry;
use async_trait::async_trait;
use sea_query::{Alias, Expr, Query};
use serde_json::Value;
use std::fmt;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("'{model}' has no column '{column}'")]
    UnknownColumn { model: String, column: String },
    #[error(transparent)]
    Db(#[from] DbError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub table: String,
    pub column: String,
    /// Key the value is returned under; the column name when absent.
    pub alias: Option<String>,
}

impl SelectColumn {
    pub fn key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{}.{} AS {}", self.table, self.column, alias),
            None => write!(f, "{}.{}", self.table, self.column),
        }
    }
}

/// `LEFT JOIN table ON base.from = table.to`
#[derive(Debug, Clone, PartialEq)]
pub struct LeftJoin {
    pub table: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: Vec<SelectColumn>,
    pub joins: Vec<LeftJoin>,
    /// `base.column = value`, all of which must hold.
    pub filter: Vec<(String, Value)>,
    /// Partition each row by source table instead of returning it flat
    /// under the base table.
    pub nest_tables: bool,
}

impl SelectQuery {
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut stmt = Query::select();
        stmt.from(Alias::new(&self.table));

        for c in &self.columns {
            let col = Expr::col((Alias::new(&c.table), Alias::new(&c.column)));
            match &c.alias {
                Some(alias) => stmt.expr_as(col, Alias::new(alias)),
                None => stmt.column((Alias::new(&c.table), Alias::new(&c.column))),
            };
        }
        for join in &self.joins {
            stmt.left_join(
                Alias::new(&join.table),
                Expr::col((Alias::new(&self.table), Alias::new(&join.from)))
                    .equals((Alias::new(&join.table), Alias::new(&join.to))),
            );
        }
        for (column, value) in &self.filter {
            let col = Expr::col((Alias::new(&self.table), Alias::new(column)));
            let cond = match value {
                Value::Null => col.is_null(),
                Value::Bool(b) => col.eq(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => col.eq(i),
                    None => col.eq(n.as_f64().unwrap_or_default()),
                },
                Value::String(s) => col.eq(s.as_str()),
                other => col.eq(other.to_string()),
            };
            stmt.and_where(cond);
        }

        render!(stmt, dialect)
    }
}

/// Everything a query strategy may need.
pub struct QueryContext<'a> {
    pub registry: &'a Registry,
    pub db: &'a dyn Database,
    pub model: &'a Model,
}

/// Replaces a model's default query.
#[async_trait]
pub trait QueryStrategy: Send + Sync {
    /// `params` are the caller's camelCase filter arguments.
    async fn query(&self, cx: &QueryContext<'_>, params: &Record) -> Result<Vec<Record>, QueryError>;
}

/// Run the model's installed strategy, or the default query.
pub async fn run(cx: &QueryContext<'_>, params: &Record) -> Result<Vec<Record>, QueryError> {
    match &cx.model.hooks().query {
        Some(strategy) => {
            debug!(model = cx.model.display_name(), "dispatching to query override");
            strategy.query(cx, params).await
        }
        None => default_query(cx, params).await,
    }
}

/// Select, left-join every `join_by_default` reference, filter by equality
/// and attach each matched joined record under the joined table's name.
pub async fn default_query(cx: &QueryContext<'_>, params: &Record) -> Result<Vec<Record>, QueryError> {
    let query = base_query(cx.registry, cx.model, &case::keys_to_snake(params))?;
    let rows = cx.db.select(&query).await?;
    flatten(cx.registry, cx.model, rows)
}

pub fn base_query(registry: &Registry, model: &Model, filter: &Record) -> Result<SelectQuery, QueryError> {
    let table = model.table_name();
    let mut columns = visible_columns(model, table);
    let mut joins = Vec::new();

    for reference in model.joined_references() {
        let target_table = reference.target_table();
        let target = registry
            .get(&target_table)
            .ok_or_else(|| QueryError::UnknownModel(reference.target.clone()))?;

        columns.extend(visible_columns(target, &target_table));
        joins.push(LeftJoin {
            table: target_table.to_string(),
            from: reference.source_column(),
            to: reference.target_column().to_string(),
        });
    }

    Ok(SelectQuery {
        table: table.to_string(),
        columns,
        joins,
        filter: equality_filter(model, filter)?,
        nest_tables: true,
    })
}

/// Flat, API-shaped projection of the base table alone.
pub fn projection_query(model: &Model, filter: &Record) -> Result<SelectQuery, QueryError> {
    let table = model.table_name();
    Ok(SelectQuery {
        table: table.to_string(),
        columns: model.aliased_columns(table),
        joins: Vec::new(),
        filter: equality_filter(model, filter)?,
        nest_tables: false,
    })
}

fn visible_columns(model: &Model, table: &str) -> Vec<SelectColumn> {
    model
        .columns()
        .into_iter()
        .filter(|c| !c.flags.hidden)
        .map(|c| SelectColumn {
            table: table.to_string(),
            column: c.name,
            alias: None,
        })
        .collect()
}

fn equality_filter(model: &Model, filter: &Record) -> Result<Vec<(String, Value)>, QueryError> {
    let columns = model.columns();
    filter
        .iter()
        .map(|(column, value)| {
            if columns.iter().any(|c| &c.name == column) {
                Ok((column.clone(), value.clone()))
            } else {
                Err(QueryError::UnknownColumn {
                    model: model.display_name().to_string(),
                    column: column.clone(),
                })
            }
        })
        .collect()
}

fn flatten(registry: &Registry, model: &Model, rows: Vec<NestedRow>) -> Result<Vec<Record>, QueryError> {
    let table = model.table_name();

    rows.into_iter()
        .map(|mut row| {
            let mut record = model.serialize(row.remove(table).unwrap_or_default());

            for reference in model.references() {
                let target_table = reference.target_table();
                let Some(joined) = row.remove(&*target_table) else {
                    continue;
                };
                let target = registry
                    .get(&target_table)
                    .ok_or_else(|| QueryError::UnknownModel(reference.target.clone()))?;
                record.insert(target_table.to_string(), Value::Object(target.serialize(joined)));
            }

            Ok(record)
        })
        .collect()
}
