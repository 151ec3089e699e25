//! Conditional single inserts, chunked batch inserts and partial updates.

use std::sync::Arc;

use ddbgate_core::batch::{self, BatchJob, BatchProgress, MAX_BATCH_SIZE};
use ddbgate_core::request::plan_set_update;
use ddbgate_core::{codec, keys, Condition, NativeItem, NativeValue, TableDescriptor};
use serde::Serialize;

use crate::config::RetryPolicy;
use crate::context::CallContext;
use crate::error::{GatewayError, Result, StoreError};
use crate::lifecycle::TableLifecycleManager;
use crate::store::AttributeStore;

/// Whether writes first make sure the target table is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessGate {
    /// Run `ensure_ready` before every write call.
    #[default]
    Ensure,
    /// The caller guarantees the table is active.
    AssumeReady,
}

/// Writes items to the store.
#[derive(Clone)]
pub struct WriteCoordinator {
    store: Arc<dyn AttributeStore>,
    lifecycle: TableLifecycleManager,
    policy: RetryPolicy,
    gate: ReadinessGate,
}

impl WriteCoordinator {
    pub fn new(store: Arc<dyn AttributeStore>, policy: RetryPolicy) -> Self {
        Self {
            lifecycle: TableLifecycleManager::new(store.clone(), policy),
            store,
            policy,
            gate: ReadinessGate::default(),
        }
    }

    pub fn with_gate(mut self, gate: ReadinessGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn gate(&self) -> ReadinessGate {
        self.gate
    }

    async fn pass_gate(&self, ctx: &CallContext, descriptor: &TableDescriptor) -> Result<()> {
        match self.gate {
            ReadinessGate::Ensure => self.lifecycle.ensure_ready(ctx, descriptor).await,
            ReadinessGate::AssumeReady => Ok(()),
        }
    }

    /// Inserts one item unless an item with the same key already exists.
    ///
    /// The put is conditioned on the partition key being absent. A failed
    /// condition becomes `DuplicateKey` and is never retried.
    pub async fn insert(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        item: &NativeItem,
    ) -> Result<()> {
        const OPERATION: &str = "insert";
        let table = descriptor.name.as_str();

        self.pass_gate(ctx, descriptor).await?;

        let marshaled = codec::marshal_item(descriptor, item)?;
        let key = keys::describe_key(descriptor, &marshaled);
        let condition = Condition::AttributeNotExists(descriptor.partition_key.name.clone());

        tracing::debug!(operation = OPERATION, table = %table, key = %key, "Inserting item");

        match ctx
            .run(OPERATION, self.store.put_item(table, marshaled, Some(&condition)))
            .await?
        {
            Ok(()) => {
                tracing::info!(operation = OPERATION, table = %table, key = %key, "Item inserted");
                Ok(())
            }
            Err(StoreError::ConditionFailed) => {
                tracing::warn!(operation = OPERATION, table = %table, key = %key, "Duplicate key");
                Err(GatewayError::DuplicateKey {
                    table: table.to_string(),
                    key,
                })
            }
            Err(err) => {
                tracing::error!(operation = OPERATION, table = %table, key = %key, error = %err, "Insert failed");
                Err(GatewayError::store_with_key(OPERATION, table, key, err))
            }
        }
    }

    /// Serializes `record` and inserts it.
    pub async fn insert_record<T>(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        record: &T,
    ) -> Result<()>
    where
        T: Serialize + ?Sized + Sync,
    {
        let item = codec::to_native_item(record)?;
        self.insert(ctx, descriptor, &item).await
    }

    /// Upserts `items` in chunks of [`MAX_BATCH_SIZE`].
    ///
    /// Chunks run in order. Each chunk is marshaled in full before it is
    /// submitted, so a bad item aborts the call without writing its chunk.
    /// Unprocessed items are resubmitted up to `batch_retries` times; whatever
    /// is left is reported in `PartialBatchFailure`. Earlier chunks stay written.
    pub async fn insert_batch(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        items: &[NativeItem],
    ) -> Result<()> {
        const OPERATION: &str = "insert_batch";
        let table = descriptor.name.as_str();

        self.pass_gate(ctx, descriptor).await?;

        tracing::debug!(
            operation = OPERATION,
            table = %table,
            items = items.len(),
            chunks = batch::chunk_sizes(items.len(), MAX_BATCH_SIZE).len(),
            "Writing batch"
        );

        let mut committed = 0;
        for (index, chunk) in items.chunks(MAX_BATCH_SIZE).enumerate() {
            let job = BatchJob::marshal(descriptor, index, chunk, self.policy.batch_retries)?;
            committed += self.submit_chunk(ctx, table, job, committed).await?;
        }

        tracing::info!(operation = OPERATION, table = %table, items = committed, "Batch written");
        Ok(())
    }

    /// Serializes every record and upserts them as a batch.
    pub async fn insert_batch_records<T>(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        records: &[T],
    ) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let items = records
            .iter()
            .map(codec::to_native_item)
            .collect::<ddbgate_core::Result<Vec<_>>>()?;
        self.insert_batch(ctx, descriptor, &items).await
    }

    /// Submits one chunk until it is fully accepted or the retries are spent.
    /// Returns the number of items written.
    async fn submit_chunk(
        &self,
        ctx: &CallContext,
        table: &str,
        mut job: BatchJob,
        committed_before: usize,
    ) -> Result<usize> {
        const OPERATION: &str = "insert_batch";

        loop {
            if job.attempts() > 0 {
                let delay = batch::retry_backoff(self.policy.batch_backoff, job.attempts());
                ctx.sleep(OPERATION, delay).await?;
            }

            let submission = job.pending().to_vec();
            let progress = match ctx
                .run(OPERATION, self.store.batch_write_item(table, submission))
                .await?
            {
                Ok(unprocessed) => {
                    if !unprocessed.is_empty() {
                        tracing::debug!(
                            operation = OPERATION,
                            table = %table,
                            chunk = job.index,
                            attempt = job.attempts() + 1,
                            unprocessed = unprocessed.len(),
                            "Store returned unprocessed items"
                        );
                    }
                    job.settle(unprocessed)
                }
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        operation = OPERATION,
                        table = %table,
                        chunk = job.index,
                        error = %err,
                        "Transient batch failure"
                    );
                    job.settle_failed()
                }
                Err(err) => {
                    tracing::error!(operation = OPERATION, table = %table, chunk = job.index, error = %err, "Batch write failed");
                    return Err(GatewayError::store_with_key(
                        OPERATION,
                        table,
                        format!("chunk {}", job.index),
                        err,
                    ));
                }
            };

            match progress {
                BatchProgress::Complete => return Ok(job.submitted()),
                BatchProgress::Retry => {}
                BatchProgress::Exhausted => {
                    let committed = committed_before + job.accepted();
                    let unprocessed = job.into_pending();
                    tracing::error!(
                        operation = OPERATION,
                        table = %table,
                        unprocessed = unprocessed.len(),
                        committed,
                        "Batch retries exhausted"
                    );
                    return Err(GatewayError::PartialBatchFailure {
                        table: table.to_string(),
                        unprocessed,
                        committed,
                    });
                }
            }
        }
    }

    /// Sets the given non-key attributes on an existing item.
    ///
    /// `sort` is required exactly when the table declares a sort key. A
    /// missing item is `NotFound`.
    pub async fn update_partial(
        &self,
        ctx: &CallContext,
        descriptor: &TableDescriptor,
        partition: &NativeValue,
        sort: Option<&NativeValue>,
        updates: &NativeItem,
    ) -> Result<()> {
        const OPERATION: &str = "update_partial";
        let table = descriptor.name.as_str();

        self.pass_gate(ctx, descriptor).await?;

        let key = keys::key_from_values(descriptor, partition, sort)?;
        let key_label = keys::describe_key(descriptor, &key);
        let plan = plan_set_update(descriptor, updates)?;

        tracing::debug!(
            operation = OPERATION,
            table = %table,
            key = %key_label,
            expression = %plan.expression,
            "Updating item"
        );

        match ctx
            .run(OPERATION, self.store.update_item(table, key, &plan))
            .await?
        {
            Ok(()) => {
                tracing::info!(operation = OPERATION, table = %table, key = %key_label, "Item updated");
                Ok(())
            }
            Err(StoreError::ConditionFailed) => {
                tracing::debug!(operation = OPERATION, table = %table, key = %key_label, "Item not found");
                Err(GatewayError::NotFound {
                    table: table.to_string(),
                    key: Some(key_label),
                })
            }
            Err(err) => {
                tracing::error!(operation = OPERATION, table = %table, key = %key_label, error = %err, "Update failed");
                Err(GatewayError::store_with_key(OPERATION, table, key_label, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ddbgate_core::{
        AttributeValue, CoreError, Item, KeyAttribute, QueryRequest, TableDescription,
        TableReadinessState, UpdatePlan,
    };
    use serde::Deserialize;

    use super::*;
    use crate::error::StoreResult;
    use crate::store::InMemoryStore;

    /// How the scripted store answers batch writes.
    enum BatchScript {
        /// Reject these keys the first time each is seen.
        RejectOnce(Mutex<HashSet<String>>),
        /// Reject these keys forever.
        RejectAlways(HashSet<String>),
        /// Fail the whole call this many times, then accept.
        FailTransient(Mutex<u32>),
    }

    /// Active-table store recording every batch submission.
    struct ScriptedBatchStore {
        script: BatchScript,
        submissions: Mutex<Vec<Vec<Item>>>,
        accepted: Mutex<Vec<Item>>,
    }

    impl ScriptedBatchStore {
        fn new(script: BatchScript) -> Self {
            Self {
                script,
                submissions: Mutex::new(Vec::new()),
                accepted: Mutex::new(Vec::new()),
            }
        }

        fn submission_sizes(&self) -> Vec<usize> {
            self.submissions.lock().unwrap().iter().map(Vec::len).collect()
        }

        fn accepted_ids(&self) -> HashSet<String> {
            self.accepted.lock().unwrap().iter().map(id_of).collect()
        }
    }

    fn id_of(item: &Item) -> String {
        item["id"].as_s().unwrap().to_string()
    }

    #[async_trait]
    impl AttributeStore for ScriptedBatchStore {
        async fn describe_table(&self, table: &str) -> StoreResult<Option<TableDescription>> {
            Ok(Some(TableDescription {
                name: table.to_string(),
                state: TableReadinessState::Active,
                item_count: None,
                size_bytes: None,
            }))
        }

        async fn create_table(&self, _: &TableDescriptor) -> StoreResult<()> {
            unimplemented!()
        }

        async fn delete_table(&self, _: &str) -> StoreResult<()> {
            unimplemented!()
        }

        async fn list_tables(&self) -> StoreResult<Vec<String>> {
            unimplemented!()
        }

        async fn put_item(&self, _: &str, _: Item, _: Option<&Condition>) -> StoreResult<()> {
            unimplemented!()
        }

        async fn batch_write_item(&self, _: &str, items: Vec<Item>) -> StoreResult<Vec<Item>> {
            self.submissions.lock().unwrap().push(items.clone());

            let (accepted, rejected): (Vec<Item>, Vec<Item>) = match &self.script {
                BatchScript::RejectOnce(pending) => {
                    let mut pending = pending.lock().unwrap();
                    items.into_iter().partition(|item| !pending.remove(&id_of(item)))
                }
                BatchScript::RejectAlways(ids) => {
                    items.into_iter().partition(|item| !ids.contains(&id_of(item)))
                }
                BatchScript::FailTransient(remaining) => {
                    let mut remaining = remaining.lock().unwrap();
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(StoreError::Transport("connection reset".to_string()));
                    }
                    (items, Vec::new())
                }
            };

            self.accepted.lock().unwrap().extend(accepted);
            Ok(rejected)
        }

        async fn get_item(&self, _: &str, _: Item) -> StoreResult<Option<Item>> {
            unimplemented!()
        }

        async fn query(&self, _: &str, _: &QueryRequest) -> StoreResult<Vec<Item>> {
            unimplemented!()
        }

        async fn update_item(&self, _: &str, _: Item, _: &UpdatePlan) -> StoreResult<()> {
            unimplemented!()
        }
    }

    fn logs_table() -> TableDescriptor {
        TableDescriptor::new("user_logs_1", KeyAttribute::string("PK"))
            .unwrap()
            .with_sort_key(KeyAttribute::string("SK"))
            .unwrap()
    }

    fn events_table() -> TableDescriptor {
        TableDescriptor::new("events", KeyAttribute::string("id")).unwrap()
    }

    fn event(i: usize) -> NativeItem {
        let mut item = NativeItem::new();
        item.insert("id".to_string(), format!("EVT#{i:03}").into());
        item.insert("seq".to_string(), (i as i64).into());
        item
    }

    fn events(n: usize) -> Vec<NativeItem> {
        (0..n).map(event).collect()
    }

    fn ids(range: std::ops::Range<usize>) -> HashSet<String> {
        range.map(|i| format!("EVT#{i:03}")).collect()
    }

    fn writer(store: Arc<dyn AttributeStore>) -> WriteCoordinator {
        WriteCoordinator::new(store, RetryPolicy::immediate())
    }

    fn profile(pk: &str) -> NativeItem {
        let mut item = NativeItem::new();
        item.insert("PK".to_string(), pk.into());
        item.insert("SK".to_string(), "#PROFILE".into());
        item.insert("Name".to_string(), "tom".into());
        item.insert("Age".to_string(), 32_i64.into());
        item
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let ctx = CallContext::new();

        writer.insert(&ctx, &logs_table(), &profile("USER#1")).await.unwrap();
        let result = writer.insert(&ctx, &logs_table(), &profile("USER#1")).await;

        assert_eq!(
            result,
            Err(GatewayError::DuplicateKey {
                table: "user_logs_1".to_string(),
                key: "PK=USER#1, SK=#PROFILE".to_string(),
            })
        );
        assert_eq!(store.item_count("user_logs_1").await, 1);
    }

    #[tokio::test]
    async fn test_insert_missing_key_is_rejected_before_store() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let mut item = profile("USER#1");
        item.remove("SK");

        let result = writer.insert(&CallContext::new(), &logs_table(), &item).await;

        assert!(matches!(
            result,
            Err(GatewayError::Validation(CoreError::MissingKeyAttribute { .. }))
        ));
        assert_eq!(store.item_count("user_logs_1").await, 0);
    }

    #[tokio::test]
    async fn test_insert_assume_ready_skips_table_creation() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone()).with_gate(ReadinessGate::AssumeReady);

        let result = writer
            .insert(&CallContext::new(), &logs_table(), &profile("USER#1"))
            .await;

        assert!(matches!(
            result,
            Err(GatewayError::Store {
                source: StoreError::ResourceNotFound(_),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_insert_record() {
        #[derive(Serialize, Deserialize)]
        struct Message {
            #[serde(rename = "PK")]
            pk: String,
            #[serde(rename = "SK")]
            sk: String,
            body: String,
        }

        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let message = Message {
            pk: "USER#1".to_string(),
            sk: "MSG#1".to_string(),
            body: "hello".to_string(),
        };

        writer
            .insert_record(&CallContext::new(), &logs_table(), &message)
            .await
            .unwrap();

        assert_eq!(store.item_count("user_logs_1").await, 1);
    }

    #[tokio::test]
    async fn test_insert_batch_chunks_sixty_items() {
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::RejectAlways(HashSet::new())));

        writer(store.clone())
            .insert_batch(&CallContext::new(), &events_table(), &events(60))
            .await
            .unwrap();

        assert_eq!(store.submission_sizes(), vec![25, 25, 10]);
        assert_eq!(store.accepted_ids(), ids(0..60));
    }

    #[tokio::test]
    async fn test_insert_batch_retries_rejected_subset() {
        let rejected: HashSet<String> = ["EVT#003", "EVT#007", "EVT#030"]
            .into_iter()
            .map(String::from)
            .collect();
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::RejectOnce(Mutex::new(
            rejected,
        ))));

        writer(store.clone())
            .insert_batch(&CallContext::new(), &events_table(), &events(40))
            .await
            .unwrap();

        // chunk 0: 25 then its 2 rejected; chunk 1: 15 then its 1 rejected
        assert_eq!(store.submission_sizes(), vec![25, 2, 15, 1]);
        assert_eq!(store.accepted_ids(), ids(0..40));
    }

    #[tokio::test]
    async fn test_insert_batch_always_rejecting_reports_partial_failure() {
        let rejected: HashSet<String> = ["EVT#026", "EVT#028"].into_iter().map(String::from).collect();
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::RejectAlways(rejected.clone())));

        let result = writer(store.clone())
            .insert_batch(&CallContext::new(), &events_table(), &events(30))
            .await;

        let Err(GatewayError::PartialBatchFailure {
            table,
            unprocessed,
            committed,
        }) = result
        else {
            panic!("expected PartialBatchFailure, got {result:?}");
        };

        assert_eq!(table, "events");
        assert_eq!(unprocessed.iter().map(id_of).collect::<HashSet<_>>(), rejected);
        assert_eq!(committed, 28);
        // 1 chunk of 25, then 1 + 3 retries for the second chunk
        assert_eq!(store.submission_sizes(), vec![25, 5, 2, 2, 2]);
    }

    #[tokio::test]
    async fn test_insert_batch_transient_failure_is_retried() {
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::FailTransient(Mutex::new(2))));

        writer(store.clone())
            .insert_batch(&CallContext::new(), &events_table(), &events(3))
            .await
            .unwrap();

        assert_eq!(store.submission_sizes(), vec![3, 3, 3]);
        assert_eq!(store.accepted_ids(), ids(0..3));
    }

    #[tokio::test]
    async fn test_insert_batch_bad_item_aborts_before_chunk_is_sent() {
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::RejectAlways(HashSet::new())));
        let mut items = events(30);
        items[27].remove("id");

        let result = writer(store.clone())
            .insert_batch(&CallContext::new(), &events_table(), &items)
            .await;

        assert!(matches!(result, Err(GatewayError::Validation(_))));
        assert_eq!(store.submission_sizes(), vec![25]);
    }

    #[tokio::test]
    async fn test_insert_batch_cancelled_between_chunks() {
        let store = Arc::new(ScriptedBatchStore::new(BatchScript::RejectAlways(HashSet::new())));
        let ctx = CallContext::new();
        ctx.cancel();

        let result = writer(store.clone())
            .with_gate(ReadinessGate::AssumeReady)
            .insert_batch(&ctx, &events_table(), &events(10))
            .await;

        assert_eq!(
            result,
            Err(GatewayError::Cancelled {
                operation: "insert_batch"
            })
        );
        assert!(store.submission_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_insert_batch_with_throttled_in_memory_store() {
        let store = Arc::new(InMemoryStore::new().with_batch_capacity(10));
        let writer = writer(store.clone());

        writer
            .insert_batch(&CallContext::new(), &events_table(), &events(25))
            .await
            .unwrap();

        assert_eq!(store.item_count("events").await, 25);
    }

    #[tokio::test]
    async fn test_update_partial() {
        let store = Arc::new(InMemoryStore::new());
        let writer = writer(store.clone());
        let ctx = CallContext::new();
        writer.insert(&ctx, &logs_table(), &profile("USER#1")).await.unwrap();

        let mut updates = NativeItem::new();
        updates.insert("Age".to_string(), 33_i64.into());
        updates.insert("Active".to_string(), false.into());

        writer
            .update_partial(
                &ctx,
                &logs_table(),
                &"USER#1".into(),
                Some(&"#PROFILE".into()),
                &updates,
            )
            .await
            .unwrap();

        let key = Item::from([
            ("PK".to_string(), AttributeValue::S("USER#1".to_string())),
            ("SK".to_string(), AttributeValue::S("#PROFILE".to_string())),
        ]);
        let stored = store.get_item("user_logs_1", key).await.unwrap().unwrap();
        assert_eq!(stored["Age"], AttributeValue::N("33".to_string()));
        assert_eq!(stored["Active"], AttributeValue::Bool(false));
        assert_eq!(stored["Name"], AttributeValue::S("tom".to_string()));
    }

    #[tokio::test]
    async fn test_update_partial_missing_item() {
        let writer = writer(Arc::new(InMemoryStore::new()));
        let mut updates = NativeItem::new();
        updates.insert("Age".to_string(), 33_i64.into());

        let result = writer
            .update_partial(
                &CallContext::new(),
                &logs_table(),
                &"USER#404".into(),
                Some(&"#PROFILE".into()),
                &updates,
            )
            .await;

        assert!(result.unwrap_err().is_not_found());
    }
}
