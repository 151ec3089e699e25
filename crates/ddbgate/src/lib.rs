//! Data-access layer over DynamoDB-style wide-column stores.
//!
//! Components share one [`AttributeStore`] handle:
//! - [`TableLifecycleManager`]: create-if-absent, poll until active, describe, list, delete
//! - [`WriteCoordinator`]: conditional inserts, chunked batch writes, partial updates
//! - [`ReadGateway`]: key lookups and key-condition queries
//!
//! Pure logic (marshaling, key validation, batch planning) lives in
//! [`ddbgate_core`], re-exported here.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use ddbgate::ddbgate_core::{KeyAttribute, NativeItem, TableDescriptor};
//! use ddbgate::{CallContext, Gateway, InMemoryStore, RetryPolicy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = Gateway::new(Arc::new(InMemoryStore::new()), RetryPolicy::immediate());
//! let users = TableDescriptor::new("users", KeyAttribute::string("user_id"))?;
//! let ctx = CallContext::new();
//!
//! let mut user = NativeItem::new();
//! user.insert("user_id".to_string(), "u-1".into());
//! user.insert("age".to_string(), 32_i64.into());
//!
//! gateway.writer().insert(&ctx, &users, &user).await?;
//! let found = gateway.reader().find_by_key(&ctx, &users, &"u-1".into(), None).await?;
//! assert_eq!(found, user);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod reader;
pub mod store;
pub mod writer;

pub use ddbgate_core;

pub use config::{RetryPolicy, StoreConfig};
pub use context::CallContext;
pub use error::{GatewayError, Result, StoreError, StoreResult};
pub use gateway::Gateway;
pub use lifecycle::TableLifecycleManager;
pub use reader::ReadGateway;
pub use store::AttributeStore;
#[cfg(feature = "dynamodb")]
pub use store::DynamoDbStore;
#[cfg(feature = "inmemory")]
pub use store::InMemoryStore;
pub use writer::{ReadinessGate, WriteCoordinator};
