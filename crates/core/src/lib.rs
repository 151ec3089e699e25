//! Pure data-access logic - no I/O, no async, no side effects.
//!
//! This crate provides:
//! - The store's tagged attribute model and a closed native value model
//! - Marshaling between the two, including a serde bridge for records
//! - Table descriptors, the table registry and key validation
//! - Batch chunking and retry bookkeeping
//! - Readiness decisions for the create-then-poll protocol
//! - Query, condition and partial-update request shapes
//!
//! # Example
//!
//! ```
//! use ddbgate_core::{codec, AttributeValue, KeyAttribute, NativeItem, TableDescriptor};
//!
//! let table = TableDescriptor::new("user_logs", KeyAttribute::string("PK"))
//!     .unwrap()
//!     .with_sort_key(KeyAttribute::string("SK"))
//!     .unwrap();
//!
//! let mut row = NativeItem::new();
//! row.insert("PK".to_string(), "USER#1".into());
//! row.insert("SK".to_string(), "#PROFILE".into());
//! row.insert("Age".to_string(), 32_i64.into());
//!
//! let item = codec::marshal_item(&table, &row).unwrap();
//! assert_eq!(item["Age"], AttributeValue::N("32".to_string()));
//! assert_eq!(codec::unmarshal_item(&item).unwrap(), row);
//! ```

pub mod batch;
pub mod codec;
mod error;
pub mod keys;
pub mod readiness;
mod registry;
pub mod request;
mod table;
mod value;

pub use batch::{BatchJob, BatchProgress, MAX_BATCH_SIZE};
pub use error::{CoreError, Result};
pub use readiness::ReadinessStep;
pub use registry::TableRegistry;
pub use request::{Condition, QueryRequest, SortOrder, UpdatePlan};
pub use table::{
    BillingMode, KeyAttribute, ScalarType, TableDescription, TableDescriptor, TableReadinessState,
};
pub use value::{AttributeValue, Item, NativeItem, NativeValue, Number};
