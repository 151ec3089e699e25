//! One handle bundling the lifecycle, write and read components over a shared
//! store and a table registry.

use std::sync::Arc;

use ddbgate_core::{TableDescriptor, TableRegistry};

use crate::config::RetryPolicy;
use crate::context::CallContext;
use crate::error::Result;
use crate::lifecycle::TableLifecycleManager;
use crate::reader::ReadGateway;
use crate::store::AttributeStore;
use crate::writer::{ReadinessGate, WriteCoordinator};

/// Process-wide entry point. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    lifecycle: TableLifecycleManager,
    writer: WriteCoordinator,
    reader: ReadGateway,
    registry: Arc<TableRegistry>,
}

impl Gateway {
    pub fn new(store: Arc<dyn AttributeStore>, policy: RetryPolicy) -> Self {
        Self {
            lifecycle: TableLifecycleManager::new(store.clone(), policy),
            writer: WriteCoordinator::new(store.clone(), policy),
            reader: ReadGateway::new(store),
            registry: Arc::new(TableRegistry::new()),
        }
    }

    /// Connects to DynamoDB using `StoreConfig::from_env` and `RetryPolicy::from_env`.
    #[cfg(feature = "dynamodb")]
    pub async fn dynamodb_from_env() -> Self {
        let store = crate::store::DynamoDbStore::from_env().await;
        Self::new(Arc::new(store), RetryPolicy::from_env())
    }

    pub fn with_registry(mut self, registry: TableRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.writer = self.writer.with_gate(gate);
        self
    }

    /// Makes every registered table active, then returns a gateway whose
    /// writes skip the per-call readiness check ([`ReadinessGate::AssumeReady`]).
    pub async fn start(self, ctx: &CallContext) -> Result<Self> {
        tracing::info!(tables = self.registry.len(), "Ensuring registered tables are ready");
        self.lifecycle.ensure_all_ready(ctx, &self.registry).await?;
        Ok(self.with_gate(ReadinessGate::AssumeReady))
    }

    /// Registered descriptor by name.
    pub fn table(&self, name: &str) -> Result<&TableDescriptor> {
        Ok(self.registry.require(name)?)
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &TableLifecycleManager {
        &self.lifecycle
    }

    pub fn writer(&self) -> &WriteCoordinator {
        &self.writer
    }

    pub fn reader(&self) -> &ReadGateway {
        &self.reader
    }
}
