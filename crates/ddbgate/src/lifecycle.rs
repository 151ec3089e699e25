//! Table lifecycle: create-if-absent, poll until active, describe, list, delete.

use std::sync::Arc;

use ddbgate_core::readiness::{self, ReadinessStep};
use ddbgate_core::{TableDescription, TableDescriptor, TableReadinessState, TableRegistry};

use crate::config::RetryPolicy;
use crate::context::CallContext;
use crate::error::{GatewayError, Result, StoreError};
use crate::store::AttributeStore;

/// Makes tables exist and reach `Active` before they are used.
///
/// Readiness is never cached: every [`ensure_ready`](Self::ensure_ready) call
/// re-derives the state from the store.
#[derive(Clone)]
pub struct TableLifecycleManager {
    store: Arc<dyn AttributeStore>,
    policy: RetryPolicy,
}

impl TableLifecycleManager {
    pub fn new(store: Arc<dyn AttributeStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Polls until the table is active, creating it on the first miss.
    ///
    /// At most one create request is issued per call. Transient describe
    /// failures use up an attempt. Fails with `TableNotReady` once the
    /// attempts are spent.
    pub async fn ensure_ready(&self, ctx: &CallContext, descriptor: &TableDescriptor) -> Result<()> {
        const OPERATION: &str = "ensure_ready";
        let table = descriptor.name.as_str();
        let attempts = self.policy.readiness_attempts.max(1);
        let mut create_issued = false;
        let mut last_state = None;

        tracing::debug!(operation = OPERATION, table = %table, attempts, "Checking table readiness");

        for attempt in 1..=attempts {
            if attempt > 1 {
                ctx.sleep(OPERATION, self.policy.readiness_backoff).await?;
            }

            let observed = match ctx.run(OPERATION, self.store.describe_table(table)).await? {
                Ok(description) => description.map(|d| d.state),
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        operation = OPERATION,
                        table = %table,
                        attempt,
                        error = %err,
                        "Transient describe failure"
                    );
                    continue;
                }
                Err(err) => {
                    tracing::error!(operation = OPERATION, table = %table, error = %err, "Describe failed");
                    return Err(GatewayError::store(OPERATION, table, err));
                }
            };

            if observed.is_some() {
                last_state = observed;
            }

            match readiness::next_step(observed, create_issued) {
                ReadinessStep::Ready => {
                    tracing::info!(operation = OPERATION, table = %table, attempt, "Table is active");
                    return Ok(());
                }
                ReadinessStep::Create => {
                    self.create_table(ctx, descriptor).await?;
                    create_issued = true;
                    last_state = Some(TableReadinessState::Creating);
                }
                ReadinessStep::Wait => {
                    tracing::debug!(
                        operation = OPERATION,
                        table = %table,
                        attempt,
                        state = observed.map_or("absent", |s| s.as_str()),
                        "Table not active yet"
                    );
                }
            }
        }

        tracing::warn!(operation = OPERATION, table = %table, attempts, "Table not ready");
        Err(GatewayError::TableNotReady {
            table: table.to_string(),
            attempts,
            last_state,
        })
    }

    /// Runs [`ensure_ready`](Self::ensure_ready) for every registered table, in name order.
    pub async fn ensure_all_ready(&self, ctx: &CallContext, registry: &TableRegistry) -> Result<()> {
        for descriptor in registry.iter() {
            self.ensure_ready(ctx, descriptor).await?;
        }
        Ok(())
    }

    /// Issues a create request from the descriptor's key schema and billing mode.
    pub async fn create_table(&self, ctx: &CallContext, descriptor: &TableDescriptor) -> Result<()> {
        const OPERATION: &str = "create_table";
        descriptor.validate()?;

        tracing::debug!(operation = OPERATION, table = %descriptor.name, "Creating table");

        match ctx.run(OPERATION, self.store.create_table(descriptor)).await? {
            Ok(()) => {
                tracing::info!(
                    operation = OPERATION,
                    table = %descriptor.name,
                    billing = ?descriptor.billing,
                    "Table creation requested"
                );
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                tracing::warn!(operation = OPERATION, table = %descriptor.name, "Table already exists");
                Err(GatewayError::AlreadyExists {
                    table: descriptor.name.clone(),
                })
            }
            Err(err) => {
                tracing::error!(operation = OPERATION, table = %descriptor.name, error = %err, "Create failed");
                Err(GatewayError::store(OPERATION, &descriptor.name, err))
            }
        }
    }

    /// Current description of a table. Missing tables are `NotFound`.
    pub async fn describe_table(&self, ctx: &CallContext, table: &str) -> Result<TableDescription> {
        const OPERATION: &str = "describe_table";

        match ctx.run(OPERATION, self.store.describe_table(table)).await? {
            Ok(Some(description)) => Ok(description),
            Ok(None) => {
                tracing::debug!(operation = OPERATION, table = %table, "Table not found");
                Err(GatewayError::NotFound {
                    table: table.to_string(),
                    key: None,
                })
            }
            Err(err) => {
                tracing::error!(operation = OPERATION, table = %table, error = %err, "Describe failed");
                Err(GatewayError::store(OPERATION, table, err))
            }
        }
    }

    pub async fn list_tables(&self, ctx: &CallContext) -> Result<Vec<String>> {
        const OPERATION: &str = "list_tables";

        ctx.run(OPERATION, self.store.list_tables())
            .await?
            .map_err(|err| {
                tracing::error!(operation = OPERATION, error = %err, "List tables failed");
                GatewayError::store(OPERATION, "*", err)
            })
    }

    /// Deletes a table. Missing tables are `NotFound`.
    pub async fn delete_table(&self, ctx: &CallContext, table: &str) -> Result<()> {
        const OPERATION: &str = "delete_table";

        match ctx.run(OPERATION, self.store.delete_table(table)).await? {
            Ok(()) => {
                tracing::info!(operation = OPERATION, table = %table, "Table deleted");
                Ok(())
            }
            Err(StoreError::ResourceNotFound(_)) => Err(GatewayError::NotFound {
                table: table.to_string(),
                key: None,
            }),
            Err(err) => {
                tracing::error!(operation = OPERATION, table = %table, error = %err, "Delete failed");
                Err(GatewayError::store(OPERATION, table, err))
            }
        }
    }
}
