//! Pure decisions for the create-then-poll readiness protocol.

use std::time::Duration;

use crate::table::TableReadinessState;

/// Polls allowed before giving up on a table.
pub const DEFAULT_READINESS_ATTEMPTS: u32 = 10;

/// Pause between polls.
pub const DEFAULT_READINESS_BACKOFF: Duration = Duration::from_secs(2);

/// What the readiness loop should do after one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessStep {
    /// Table is active; stop.
    Ready,
    /// Table does not exist; issue a create request, then wait.
    Create,
    /// Table exists (or was just requested) but is not active yet.
    Wait,
}

/// Pure function: decide the next step from the observed state.
///
/// `observed` is `None` when the table was not found. Once a create request
/// has been issued in this readiness check, a missing table is treated as
/// still being created so no second create is sent.
pub fn next_step(observed: Option<TableReadinessState>, create_issued: bool) -> ReadinessStep {
    match observed {
        Some(TableReadinessState::Active) => ReadinessStep::Ready,
        Some(_) => ReadinessStep::Wait,
        None if create_issued => ReadinessStep::Wait,
        None => ReadinessStep::Create,
    }
}
