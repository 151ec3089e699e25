//! In-memory store backend (for testing and local development).

mod condition;
mod store;

pub use store::InMemoryStore;
