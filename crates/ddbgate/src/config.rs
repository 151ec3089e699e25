use std::{env, time::Duration};

use ddbgate_core::batch::{DEFAULT_BATCH_BACKOFF, DEFAULT_BATCH_RETRIES};
use ddbgate_core::readiness::{DEFAULT_READINESS_ATTEMPTS, DEFAULT_READINESS_BACKOFF};

/// Where the store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Custom endpoint URL (for local DynamoDB).
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_ENDPOINT_URL` - Custom endpoint, e.g. `http://localhost:8000` (default: none)
    /// - `AWS_REGION` - Region (default: "us-east-1")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            endpoint_url: lookup("AWS_ENDPOINT_URL").filter(|url| !url.is_empty()),
            region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        }
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Bounds for readiness polling and batch resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Describe polls before `TableNotReady` (default: 10)
    pub readiness_attempts: u32,
    /// Pause between polls (default: 2s)
    pub readiness_backoff: Duration,
    /// Resubmissions of unprocessed batch items (default: 3)
    pub batch_retries: u32,
    /// Base delay before the first resubmission, doubled each time (default: 50ms)
    pub batch_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            readiness_attempts: DEFAULT_READINESS_ATTEMPTS,
            readiness_backoff: DEFAULT_READINESS_BACKOFF,
            batch_retries: DEFAULT_BATCH_RETRIES,
            batch_backoff: DEFAULT_BATCH_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Load the policy from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `DDBGATE_READINESS_ATTEMPTS`
    /// - `DDBGATE_READINESS_BACKOFF_MS`
    /// - `DDBGATE_BATCH_RETRIES`
    /// - `DDBGATE_BATCH_BACKOFF_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            readiness_attempts: number("DDBGATE_READINESS_ATTEMPTS")
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.readiness_attempts),
            readiness_backoff: number("DDBGATE_READINESS_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.readiness_backoff),
            batch_retries: number("DDBGATE_BATCH_RETRIES")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.batch_retries),
            batch_backoff: number("DDBGATE_BATCH_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.batch_backoff),
        }
    }

    /// No waiting between attempts. Useful for tests and local stores.
    pub fn immediate() -> Self {
        Self {
            readiness_backoff: Duration::ZERO,
            batch_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let policy = RetryPolicy::from_lookup(lookup(&[]));
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.readiness_attempts, 10);
        assert_eq!(policy.readiness_backoff, Duration::from_secs(2));
        assert_eq!(policy.batch_retries, 3);

        let store = StoreConfig::from_lookup(lookup(&[]));
        assert_eq!(store.region, "us-east-1");
        assert_eq!(store.endpoint_url, None);
    }

    #[test]
    fn test_overrides() {
        let policy = RetryPolicy::from_lookup(lookup(&[
            ("DDBGATE_READINESS_ATTEMPTS", "4"),
            ("DDBGATE_READINESS_BACKOFF_MS", "250"),
            ("DDBGATE_BATCH_RETRIES", "0"),
            ("DDBGATE_BATCH_BACKOFF_MS", "5"),
        ]));
        assert_eq!(policy.readiness_attempts, 4);
        assert_eq!(policy.readiness_backoff, Duration::from_millis(250));
        assert_eq!(policy.batch_retries, 0);
        assert_eq!(policy.batch_backoff, Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let policy = RetryPolicy::from_lookup(lookup(&[
            ("DDBGATE_READINESS_ATTEMPTS", "0"),
            ("DDBGATE_BATCH_RETRIES", "many"),
        ]));
        assert_eq!(policy.readiness_attempts, 10);
        assert_eq!(policy.batch_retries, 3);
    }

    #[test]
    fn test_target_display() {
        let local = StoreConfig::from_lookup(lookup(&[
            ("AWS_ENDPOINT_URL", "http://localhost:8000"),
            ("AWS_REGION", "eu-west-1"),
        ]));
        assert_eq!(local.target_display(), "Local DynamoDB (http://localhost:8000)");

        let remote = StoreConfig::from_lookup(lookup(&[("AWS_REGION", "eu-west-1")]));
        assert_eq!(remote.target_display(), "AWS DynamoDB (region: eu-west-1)");
    }
}
