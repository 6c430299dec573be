//! Graph runtime configuration
//!
//! Step ceiling, timeouts, and the retry policy applied to recoverable
//! node failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for a compiled graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Maximum node executions before the invocation is aborted
    pub max_steps: usize,

    /// Timeout for a single node execution; subgraph nodes are exempt
    #[serde(with = "humantime_serde")]
    pub node_timeout: Duration,

    /// Timeout for the entire invocation
    #[serde(with = "humantime_serde")]
    pub workflow_timeout: Duration,

    /// Retry policy for recoverable node failures
    pub retry_policy: RetryPolicy,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_steps: 64,
            node_timeout: Duration::from_secs(300),      // 5 min per node
            workflow_timeout: Duration::from_secs(3600), // 1 hour total
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl GraphConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum node executions
    pub fn with_max_steps(mut self, max: usize) -> Self {
        self.max_steps = max;
        self
    }

    /// Set node timeout
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    /// Set workflow timeout
    pub fn with_workflow_timeout(mut self, timeout: Duration) -> Self {
        self.workflow_timeout = timeout;
        self
    }

    /// Set retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Retry policy for failed node executions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts
    pub max_retries: usize,

    /// Base delay for exponential backoff
    #[serde(with = "humantime_serde")]
    pub backoff_base: Duration,

    /// Maximum delay between retries
    #[serde(with = "humantime_serde")]
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Set backoff base duration
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set maximum backoff duration
    pub fn with_backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = max;
        self
    }

    /// Calculate delay for a given retry attempt (exponential backoff)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt as u32);
        let delay = self.backoff_base.saturating_mul(multiplier);
        delay.min(self.backoff_max)
    }

    /// Check if more retries are allowed
    pub fn should_retry(&self, attempts: usize) -> bool {
        attempts < self.max_retries
    }

    /// Create a no-retry policy
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}
