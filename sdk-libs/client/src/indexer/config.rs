use std::time::Duration;

/// Per-call indexer settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexerRpcConfig {
    /// Answers from an indexer behind this slot are rejected and retried.
    pub slot: u64,
    pub retry_config: RetryConfig,
}

impl IndexerRpcConfig {
    pub fn at_slot(slot: u64, retry_config: RetryConfig) -> Self {
        Self { slot, retry_config }
    }
}

/// Exponential backoff for retryable indexer errors. A wallet waits on these
/// calls interactively, so the defaults stay short.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub num_retries: u32,
    pub delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            num_retries: 3,
            delay_ms: 400,
            max_delay_ms: 4_000,
        }
    }
}

impl RetryConfig {
    pub fn attempts(&self) -> u32 {
        self.num_retries.max(1)
    }

    /// Wait before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}
