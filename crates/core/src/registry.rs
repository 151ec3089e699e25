//! Read-only table registry populated once at configuration time.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::table::TableDescriptor;

/// Table descriptors keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRegistry {
    tables: BTreeMap<String, TableDescriptor>,
}

#[derive(Deserialize)]
struct RegistryFile {
    tables: Vec<TableDescriptor>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor. Names must be unique.
    pub fn register(mut self, descriptor: TableDescriptor) -> Result<Self> {
        descriptor.validate()?;
        if self.tables.contains_key(&descriptor.name) {
            return Err(CoreError::DuplicateTable(descriptor.name));
        }
        self.tables.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    /// Loads `{"tables": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: RegistryFile =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        file.tables
            .into_iter()
            .try_fold(Self::new(), |registry, descriptor| registry.register(descriptor))
    }

    pub fn get(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.get(name)
    }

    /// Like [`get`](Self::get) but fails for unknown tables.
    pub fn require(&self, name: &str) -> Result<&TableDescriptor> {
        self.get(name)
            .ok_or_else(|| CoreError::UnknownTable(name.to_string()))
    }

    /// Descriptors in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TableDescriptor> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::KeyAttribute;

    fn table(name: &str) -> TableDescriptor {
        TableDescriptor::new(name, KeyAttribute::string("PK")).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = TableRegistry::new()
            .register(table("user_logs_2"))
            .unwrap()
            .register(table("user_logs_1"))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("user_logs_1").is_some());
        let names: Vec<&str> = registry.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["user_logs_1", "user_logs_2"]);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let result = TableRegistry::new()
            .register(table("orders"))
            .unwrap()
            .register(table("orders"));
        assert_eq!(result, Err(CoreError::DuplicateTable("orders".to_string())));
    }

    #[test]
    fn test_require_unknown_table() {
        let registry = TableRegistry::new();
        assert_eq!(
            registry.require("missing"),
            Err(CoreError::UnknownTable("missing".to_string()))
        );
    }

    #[test]
    fn test_from_json_validates_descriptors() {
        let ok = r#"{"tables": [
            {"name": "user_logs", "partition_key": {"name": "PK"}, "sort_key": {"name": "SK"}}
        ]}"#;
        let registry = TableRegistry::from_json(ok).unwrap();
        assert_eq!(registry.require("user_logs").unwrap().key_names(), vec!["PK", "SK"]);

        let bad = r#"{"tables": [{"name": "x", "partition_key": {"name": "PK"}}]}"#;
        assert!(matches!(
            TableRegistry::from_json(bad),
            Err(CoreError::InvalidDescriptor(_))
        ));
    }
}
