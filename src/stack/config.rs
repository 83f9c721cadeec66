//! Construction-time configuration for [`ConcurrentStack`](super::ConcurrentStack).

/// Tuning knobs for a [`ConcurrentStack`](super::ConcurrentStack)
///
/// Neither option affects correctness; both only trade throughput against
/// observability or CPU usage under contention.
///
/// # Examples
///
/// ```rust
/// use treiberx::{ConcurrentStack, StackConfig};
///
/// let config = StackConfig::new().with_metrics(false).with_backoff(true);
/// let stack: ConcurrentStack<u32> = ConcurrentStack::with_config(config);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackConfig {
    /// Record metrics from the start. Can be toggled later at runtime.
    pub metrics_enabled: bool,
    /// Spin with exponential backoff after a failed CAS before retrying.
    pub backoff: bool,
}

impl StackConfig {
    /// The default configuration: metrics on, backoff on
    pub const fn new() -> Self {
        Self {
            metrics_enabled: true,
            backoff: true,
        }
    }

    /// Set whether metrics are recorded initially
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Set whether failed CAS attempts back off before retrying
    #[must_use]
    pub const fn with_backoff(mut self, enabled: bool) -> Self {
        self.backoff = enabled;
        self
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new()
    }
}
