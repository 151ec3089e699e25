//! The store collaborator and its backends.
//!
//! Backends are enabled through Cargo features:
//! - `dynamodb`: [`DynamoDbStore`] over `aws-sdk-dynamodb`
//! - `inmemory`: [`InMemoryStore`] for tests and local development

use async_trait::async_trait;
use ddbgate_core::{Condition, Item, QueryRequest, TableDescription, TableDescriptor, UpdatePlan};

use crate::error::StoreResult;

#[cfg(feature = "dynamodb")]
mod dynamodb;
#[cfg(feature = "inmemory")]
mod inmemory;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

/// Wide-column store operations the gateway depends on.
///
/// Items cross this boundary already marshaled. Implementations own the
/// condition-expression language; the gateway forwards expressions verbatim.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Current description of a table, `None` when it does not exist.
    async fn describe_table(&self, table: &str) -> StoreResult<Option<TableDescription>>;

    /// Requests creation. Fails with `AlreadyExists` when the name is taken.
    async fn create_table(&self, descriptor: &TableDescriptor) -> StoreResult<()>;

    /// Deletes a table. Fails with `ResourceNotFound` when it does not exist.
    async fn delete_table(&self, table: &str) -> StoreResult<()>;

    /// Names of every table visible to this store.
    async fn list_tables(&self) -> StoreResult<Vec<String>>;

    /// Writes one item, optionally guarded by a condition.
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<&Condition>,
    ) -> StoreResult<()>;

    /// Unconditional batch upsert. Returns the items the store did not accept.
    async fn batch_write_item(&self, table: &str, items: Vec<Item>) -> StoreResult<Vec<Item>>;

    /// Strongly consistent point read.
    async fn get_item(&self, table: &str, key: Item) -> StoreResult<Option<Item>>;

    /// Key-condition query, bounded by the request's limit.
    async fn query(&self, table: &str, request: &QueryRequest) -> StoreResult<Vec<Item>>;

    /// Applies an update expression to an existing item.
    async fn update_item(&self, table: &str, key: Item, plan: &UpdatePlan) -> StoreResult<()>;
}
