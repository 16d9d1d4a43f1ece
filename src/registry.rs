//! The set of declared models, keyed by table name.
//!
//! Populated once after discovery and read-only afterwards. Compiled API
//! types are cached per model here for the registry's lifetime.

use crate::api::{InputType, ObjectType};
use crate::model::{Model, ModelError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) model: Arc<Model>,
    pub(crate) output: OnceLock<Arc<ObjectType>>,
    pub(crate) input: OnceLock<Arc<InputType>>,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    /// Build and validate a registry. Every reference and foreign key must
    /// point at a registered table.
    pub fn new(models: impl IntoIterator<Item = Model>) -> Result<Self, ModelError> {
        let mut entries = BTreeMap::new();

        for model in models {
            let table = model.table_name().to_string();
            if entries.contains_key(&table) {
                return Err(ModelError::DuplicateTable(table));
            }
            entries.insert(
                table,
                Entry {
                    model: Arc::new(model),
                    output: OnceLock::new(),
                    input: OnceLock::new(),
                },
            );
        }

        for entry in entries.values() {
            let model = &entry.model;

            for reference in model.references() {
                if !entries.contains_key(&*reference.target_table()) {
                    return Err(ModelError::UnknownModel {
                        model: model.display_name().to_string(),
                        target: reference.target.clone(),
                    });
                }
            }

            // Joined rows are keyed by table name, so each table joins at most once.
            let mut joined = BTreeSet::new();
            for reference in model.joined_references() {
                let table = reference.target_table();
                if !joined.insert(Arc::clone(&table)) {
                    return Err(ModelError::DuplicateJoin {
                        model: model.display_name().to_string(),
                        table: table.to_string(),
                    });
                }
            }

            for column in model.own_columns() {
                if let Some(table) = column.referenced_table() {
                    if !entries.contains_key(table) {
                        return Err(ModelError::UnknownTable {
                            model: model.display_name().to_string(),
                            column: column.name.clone(),
                            table: table.to_string(),
                        });
                    }
                }
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, table: &str) -> Option<&Arc<Model>> {
        self.entries.get(table).map(|e| &e.model)
    }

    /// Look a model up by its declared name.
    pub fn by_name(&self, name: &str) -> Option<&Arc<Model>> {
        self.models().find(|m| m.display_name() == name)
    }

    /// Models in table-name order.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.entries.values().map(|e| &e.model)
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tables `table` depends on through foreign keys, self-references included.
    pub fn dependencies(&self, table: &str) -> BTreeSet<String> {
        self.get(table)
            .map(|m| m.referenced_tables().into_iter().collect())
            .unwrap_or_default()
    }

    pub(crate) fn entry(&self, table: &str) -> Option<&Entry> {
        self.entries.get(table)
    }
}
