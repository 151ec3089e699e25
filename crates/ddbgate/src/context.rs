//! Per-call cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{GatewayError, Result};

/// Cooperative cancellation handle passed into every gateway call.
///
/// Checked before each store invocation and each retry iteration. Backoff
/// sleeps and in-flight store calls wake as soon as the token is cancelled or
/// the deadline passes.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that never cancels on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing token, typically a child of a shutdown token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this context and every clone of it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with `Cancelled` once the token fired or the deadline passed.
    pub fn check(&self, operation: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(GatewayError::Cancelled { operation });
        }
        Ok(())
    }

    /// Sleeps for `duration`, waking early on cancellation.
    pub async fn sleep(&self, operation: &'static str, duration: Duration) -> Result<()> {
        self.check(operation)?;
        let wake = Instant::now() + duration;
        let wake = self.deadline.map_or(wake, |deadline| deadline.min(wake));

        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(wake) => {}
        }
        self.check(operation)
    }

    /// Runs a store call, abandoning it on cancellation.
    pub async fn run<F>(&self, operation: &'static str, call: F) -> Result<F::Output>
    where
        F: Future,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(GatewayError::Cancelled { operation }),
            _ = until(self.deadline) => Err(GatewayError::Cancelled { operation }),
            output = call => Ok(output),
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
