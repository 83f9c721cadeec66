//! Performance Metrics Module
//!
//! Contention and latency counters for the stack. Every counter is a relaxed
//! atomic: metrics never take part in synchronisation and never influence the
//! algorithm's control flow.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;

/// A point-in-time snapshot of a stack's counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StackMetrics {
    /// Total number of completed operations (pushes, pops and empty pops)
    pub total_operations: u64,
    /// Values pushed
    pub pushes: u64,
    /// Pops that returned a value
    pub pops: u64,
    /// Pops that observed an empty stack
    pub empty_pops: u64,
    /// Failed compare-and-swap attempts that forced a retry
    pub cas_retries: u64,
    /// Average operation time in nanoseconds
    pub avg_operation_time_ns: u64,
    /// Maximum operation time in nanoseconds
    pub max_operation_time_ns: u64,
}

impl StackMetrics {
    /// CAS retries per completed operation, as a percentage
    ///
    /// Can exceed 100 under heavy contention, since a single operation may
    /// retry several times.
    pub fn contention_rate(&self) -> f64 {
        if self.total_operations == 0 {
            0.0
        } else {
            (self.cas_retries as f64 / self.total_operations as f64) * 100.0
        }
    }

    /// Share of pop attempts that found the stack empty, as a percentage
    pub fn empty_rate(&self) -> f64 {
        let attempts = self.pops + self.empty_pops;
        if attempts == 0 {
            0.0
        } else {
            (self.empty_pops as f64 / attempts as f64) * 100.0
        }
    }

    /// Get average operation time as Duration
    pub fn avg_operation_time(&self) -> Duration {
        Duration::from_nanos(self.avg_operation_time_ns)
    }

    /// Get maximum operation time as Duration
    pub fn max_operation_time(&self) -> Duration {
        Duration::from_nanos(self.max_operation_time_ns)
    }
}

/// Internal atomic metrics collection
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    pushes: AtomicU64,
    pops: AtomicU64,
    empty_pops: AtomicU64,
    cas_retries: AtomicU64,
    timed_operations: AtomicU64,
    total_time_ns: AtomicU64,
    max_time_ns: AtomicU64,
}

impl AtomicMetrics {
    /// Record a completed push
    pub fn record_push(&self, duration: Option<Duration>) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Record `count` values published by a single batch push
    pub fn record_push_batch(&self, count: u64, duration: Option<Duration>) {
        self.pushes.fetch_add(count, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Record a pop that returned a value
    pub fn record_pop(&self, duration: Option<Duration>) {
        self.pops.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Record `count` values detached at once
    pub fn record_pop_batch(&self, count: u64, duration: Option<Duration>) {
        self.pops.fetch_add(count, Ordering::Relaxed);
        self.record_duration(duration);
    }

    /// Record a pop that found the stack empty
    pub fn record_empty(&self) {
        self.empty_pops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed CAS
    pub fn record_contention(&self) {
        self.cas_retries.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, duration: Option<Duration>) {
        let Some(duration) = duration else {
            return;
        };
        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.timed_operations.fetch_add(1, Ordering::Relaxed);
        self.total_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        // Update max time if this operation was slower
        let mut current_max = self.max_time_ns.load(Ordering::Relaxed);
        while duration_ns > current_max {
            match self.max_time_ns.compare_exchange_weak(
                current_max,
                duration_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> StackMetrics {
        let pushes = self.pushes.load(Ordering::Relaxed);
        let pops = self.pops.load(Ordering::Relaxed);
        let empty_pops = self.empty_pops.load(Ordering::Relaxed);
        let timed = self.timed_operations.load(Ordering::Relaxed);
        let total_time = self.total_time_ns.load(Ordering::Relaxed);

        StackMetrics {
            total_operations: pushes + pops + empty_pops,
            pushes,
            pops,
            empty_pops,
            cas_retries: self.cas_retries.load(Ordering::Relaxed),
            avg_operation_time_ns: if timed > 0 { total_time / timed } else { 0 },
            max_operation_time_ns: self.max_time_ns.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.pushes.store(0, Ordering::Relaxed);
        self.pops.store(0, Ordering::Relaxed);
        self.empty_pops.store(0, Ordering::Relaxed);
        self.cas_retries.store(0, Ordering::Relaxed);
        self.timed_operations.store(0, Ordering::Relaxed);
        self.total_time_ns.store(0, Ordering::Relaxed);
        self.max_time_ns.store(0, Ordering::Relaxed);
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> StackMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}
