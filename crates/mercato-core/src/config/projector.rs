use serde::{Deserialize, Serialize};

/// How events for an already-sold listing are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoldPolicy {
    /// Update and purchase still apply to a sold record; cancel deletes it.
    #[default]
    Permissive,
    /// Sold is terminal: update, purchase and cancel are ignored.
    Terminal,
}

/// Configuration for the projector and its feed runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectorConfig {
    /// Maximum number of feed entries per batch
    /// Default: 1000
    #[serde(default = "default_batch_events_max")]
    pub batch_events_max: usize,

    /// Maximum bytes per batch
    /// Default: 4MB
    #[serde(default = "default_batch_bytes_max")]
    pub batch_bytes_max: usize,

    /// Stop reading a batch after this many milliseconds
    /// Default: 100ms
    #[serde(default = "default_max_apply_latency_ms")]
    pub max_apply_latency_ms: u64,

    /// Poll interval when caught up (milliseconds)
    /// Default: 50ms
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Treatment of events that reference a sold listing
    #[serde(default)]
    pub sold_policy: SoldPolicy,

    /// Skip events whose log position is not newer than the last one
    /// applied to the same listing key
    /// Default: true
    #[serde(default = "default_enforce_key_order")]
    pub enforce_key_order: bool,
}

fn default_batch_events_max() -> usize {
    1000
}

fn default_batch_bytes_max() -> usize {
    4 * 1024 * 1024
}

fn default_max_apply_latency_ms() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_enforce_key_order() -> bool {
    true
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            batch_events_max: default_batch_events_max(),
            batch_bytes_max: default_batch_bytes_max(),
            max_apply_latency_ms: default_max_apply_latency_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            sold_policy: SoldPolicy::default(),
            enforce_key_order: default_enforce_key_order(),
        }
    }
}

impl ProjectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_events_max(mut self, max: usize) -> Self {
        self.batch_events_max = max;
        self
    }

    pub fn with_batch_bytes_max(mut self, max: usize) -> Self {
        self.batch_bytes_max = max;
        self
    }

    pub fn with_max_apply_latency_ms(mut self, ms: u64) -> Self {
        self.max_apply_latency_ms = ms;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_sold_policy(mut self, policy: SoldPolicy) -> Self {
        self.sold_policy = policy;
        self
    }

    pub fn with_enforce_key_order(mut self, enforce: bool) -> Self {
        self.enforce_key_order = enforce;
        self
    }
}
