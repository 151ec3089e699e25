//! In-memory [`AttributeStore`] implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use ddbgate_core::{
    keys, AttributeValue, Condition, Item, QueryRequest, SortOrder, TableDescription, TableDescriptor,
    TableReadinessState, UpdatePlan,
};
use tokio::sync::RwLock;

use super::condition::{compare_scalar, parse_set_update, KeyCondition};
use crate::error::{StoreError, StoreResult};
use crate::store::AttributeStore;

/// One key attribute value, compared by type tag and exact payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    S(String),
    N(String),
    B(Vec<u8>),
}

/// Row identity: the key parts in partition, sort order.
type StorageKey = Vec<KeyPart>;

#[derive(Debug)]
struct MemTable {
    descriptor: TableDescriptor,
    items: BTreeMap<StorageKey, Item>,
    pending_polls: u32,
}

impl MemTable {
    fn state(&self) -> TableReadinessState {
        if self.pending_polls > 0 {
            TableReadinessState::Creating
        } else {
            TableReadinessState::Active
        }
    }

    fn require_active(&self) -> StoreResult<()> {
        match self.state() {
            TableReadinessState::Active => Ok(()),
            _ => Err(StoreError::ResourceNotFound(format!(
                "Table {} is not active",
                self.descriptor.name
            ))),
        }
    }

    /// Storage key of an item (or key map).
    fn storage_key(&self, item: &Item) -> StoreResult<StorageKey> {
        let key = keys::key_of(&self.descriptor, item)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        self.descriptor
            .key_names()
            .into_iter()
            .map(|name| match key.get(name) {
                Some(AttributeValue::S(s)) => Ok(KeyPart::S(s.clone())),
                Some(AttributeValue::N(n)) => Ok(KeyPart::N(n.clone())),
                Some(AttributeValue::B(b)) => Ok(KeyPart::B(b.clone())),
                other => Err(StoreError::InvalidData(format!(
                    "Key attribute '{}' must be a scalar, found {}",
                    name,
                    other.map_or("nothing", AttributeValue::type_tag)
                ))),
            })
            .collect()
    }

    fn sort_ordering(&self, a: &Item, b: &Item) -> Ordering {
        let Some(sk) = &self.descriptor.sort_key else {
            return Ordering::Equal;
        };
        match (a.get(&sk.name), b.get(&sk.name)) {
            (Some(a), Some(b)) => compare_scalar(a, b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        }
    }
}

/// In-memory storage backend for testing.
///
/// Tables live in a `HashMap` wrapped in `Arc<RwLock<_>>`, so clones share
/// state. Data is not persisted and is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, MemTable>>>,
    activation_polls: u32,
    batch_capacity: Option<usize>,
}

impl InMemoryStore {
    /// Creates an empty store whose tables become active immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// New tables report `Creating` for the first `polls` describe calls.
    pub fn with_activation_delay(mut self, polls: u32) -> Self {
        self.activation_polls = polls;
        self
    }

    /// Accepts at most `capacity` items per batch write and returns the rest
    /// as unprocessed, like a throttled table.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.batch_capacity = Some(capacity);
        self
    }

    /// Number of items stored in `table`, 0 when the table does not exist.
    pub async fn item_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map_or(0, |t| t.items.len())
    }
}

fn table_not_found(table: &str) -> StoreError {
    StoreError::ResourceNotFound(format!("Table {table} not found"))
}

#[async_trait]
impl AttributeStore for InMemoryStore {
    async fn describe_table(&self, table: &str) -> StoreResult<Option<TableDescription>> {
        let mut tables = self.tables.write().await;
        let Some(mem) = tables.get_mut(table) else {
            return Ok(None);
        };

        let state = mem.state();
        mem.pending_polls = mem.pending_polls.saturating_sub(1);

        Ok(Some(TableDescription {
            name: table.to_string(),
            state,
            item_count: i64::try_from(mem.items.len()).ok(),
            size_bytes: None,
        }))
    }

    async fn create_table(&self, descriptor: &TableDescriptor) -> StoreResult<()> {
        descriptor
            .validate()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let mut tables = self.tables.write().await;
        if tables.contains_key(&descriptor.name) {
            return Err(StoreError::AlreadyExists(descriptor.name.clone()));
        }
        tables.insert(
            descriptor.name.clone(),
            MemTable {
                descriptor: descriptor.clone(),
                items: BTreeMap::new(),
                pending_polls: self.activation_polls,
            },
        );
        Ok(())
    }

    async fn delete_table(&self, table: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| table_not_found(table))
    }

    async fn list_tables(&self) -> StoreResult<Vec<String>> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mem = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        mem.require_active()?;

        let key = mem.storage_key(&item)?;
        if let Some(condition) = condition {
            if !condition.holds_for(mem.items.get(&key)) {
                return Err(StoreError::ConditionFailed);
            }
        }
        mem.items.insert(key, item);
        Ok(())
    }

    async fn batch_write_item(&self, table: &str, items: Vec<Item>) -> StoreResult<Vec<Item>> {
        let mut tables = self.tables.write().await;
        let mem = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        mem.require_active()?;

        // The whole request is rejected when any item is malformed.
        let keyed = items
            .into_iter()
            .map(|item| mem.storage_key(&item).map(|key| (key, item)))
            .collect::<StoreResult<Vec<_>>>()?;

        let capacity = self.batch_capacity.unwrap_or(usize::MAX);
        let mut unprocessed = Vec::new();
        for (i, (key, item)) in keyed.into_iter().enumerate() {
            if i < capacity {
                mem.items.insert(key, item);
            } else {
                unprocessed.push(item);
            }
        }
        Ok(unprocessed)
    }

    async fn get_item(&self, table: &str, key: Item) -> StoreResult<Option<Item>> {
        let tables = self.tables.read().await;
        let mem = tables.get(table).ok_or_else(|| table_not_found(table))?;
        mem.require_active()?;

        let key = mem.storage_key(&key)?;
        Ok(mem.items.get(&key).cloned())
    }

    async fn query(&self, table: &str, request: &QueryRequest) -> StoreResult<Vec<Item>> {
        let tables = self.tables.read().await;
        let mem = tables.get(table).ok_or_else(|| table_not_found(table))?;
        mem.require_active()?;

        let condition = KeyCondition::parse(&request.key_condition, &request.names, &request.values)?;
        let mut rows: Vec<Item> = mem
            .items
            .values()
            .filter(|item| condition.matches(item))
            .cloned()
            .collect();

        rows.sort_by(|a, b| mem.sort_ordering(a, b));
        if request.order == SortOrder::Descending {
            rows.reverse();
        }
        if let Some(limit) = request.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn update_item(&self, table: &str, key: Item, plan: &UpdatePlan) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let mem = tables.get_mut(table).ok_or_else(|| table_not_found(table))?;
        mem.require_active()?;

        let storage_key = mem.storage_key(&key)?;
        if !plan.condition.holds_for(mem.items.get(&storage_key)) {
            return Err(StoreError::ConditionFailed);
        }

        let assignments = parse_set_update(&plan.expression, &plan.names, &plan.values)?;
        let item = mem.items.entry(storage_key).or_insert(key);
        for (attribute, value) in assignments {
            item.insert(attribute, value);
        }
        Ok(())
    }
}
