//! Batch write planning (Functional Core).
//!
//! Items are split positionally into store-sized chunks. Each chunk becomes a
//! [`BatchJob`] that tracks which items are still pending across retries.

use std::time::Duration;

use crate::codec;
use crate::error::Result;
use crate::table::TableDescriptor;
use crate::value::{Item, NativeItem};

/// Maximum number of items the store accepts in one batch write.
pub const MAX_BATCH_SIZE: usize = 25;

/// Resubmissions of unprocessed items allowed after the first attempt.
pub const DEFAULT_BATCH_RETRIES: u32 = 3;

/// Base delay before the first resubmission.
pub const DEFAULT_BATCH_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound for any single resubmission delay.
const MAX_BATCH_BACKOFF: Duration = Duration::from_secs(2);

/// Sizes of the consecutive chunks `len` items split into.
pub fn chunk_sizes(len: usize, chunk_size: usize) -> Vec<usize> {
    let chunk_size = chunk_size.max(1);
    (0..len)
        .step_by(chunk_size)
        .map(|start| chunk_size.min(len - start))
        .collect()
}

/// Outcome of recording one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchProgress {
    /// Every item of the chunk was accepted.
    Complete,
    /// Some items remain and retries are left.
    Retry,
    /// Some items remain and the retry budget is spent.
    Exhausted,
}

/// One chunk of marshaled items and its submit-and-retry state.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    /// Position of the chunk within the call.
    pub index: usize,
    submitted: usize,
    pending: Vec<Item>,
    attempts: u32,
    max_retries: u32,
}

impl BatchJob {
    /// Marshals and validates every item of a chunk. Fails on the first bad item.
    pub fn marshal(
        descriptor: &TableDescriptor,
        index: usize,
        chunk: &[NativeItem],
        max_retries: u32,
    ) -> Result<Self> {
        let items = chunk
            .iter()
            .map(|item| codec::marshal_item(descriptor, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_items(index, items, max_retries))
    }

    /// Wraps already-marshaled items.
    pub fn from_items(index: usize, items: Vec<Item>, max_retries: u32) -> Self {
        Self {
            index,
            submitted: items.len(),
            pending: items,
            attempts: 0,
            max_retries,
        }
    }

    /// Items still waiting to be accepted.
    pub fn pending(&self) -> &[Item] {
        &self.pending
    }

    /// Submissions recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Number of items the chunk started with.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Number of items accepted so far.
    pub fn accepted(&self) -> usize {
        self.submitted - self.pending.len()
    }

    /// Records a submission whose unprocessed remainder is `unprocessed`.
    ///
    /// The remainder replaces the pending set as returned, so the next attempt
    /// resubmits exactly what the store rejected.
    pub fn settle(&mut self, unprocessed: Vec<Item>) -> BatchProgress {
        self.attempts += 1;
        self.pending = unprocessed;
        self.progress()
    }

    /// Records a submission that failed as a whole with a transient error.
    pub fn settle_failed(&mut self) -> BatchProgress {
        self.attempts += 1;
        self.progress()
    }

    fn progress(&self) -> BatchProgress {
        if self.pending.is_empty() {
            BatchProgress::Complete
        } else if self.attempts > self.max_retries {
            BatchProgress::Exhausted
        } else {
            BatchProgress::Retry
        }
    }

    /// Consumes the job, returning whatever is still pending.
    pub fn into_pending(self) -> Vec<Item> {
        self.pending
    }
}

/// Exponential backoff before resubmission `retry` (1-based), capped.
pub fn retry_backoff(base: Duration, retry: u32) -> Duration {
    let factor = 1_u32 << retry.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(MAX_BATCH_BACKOFF)
}
