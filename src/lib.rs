//! # treiberx
//!
//! A lock-free, multi-producer multi-consumer LIFO stack built on Treiber's
//! algorithm, with epoch-based memory reclamation.
//!
//! ## Features
//!
//! - **Lock-free push and pop**: every mutation of the stack is a single CAS on
//!   the head pointer; no thread ever holds a lock
//! - **Safe reclamation**: popped nodes are retired through `crossbeam-epoch` and
//!   freed only once no thread can still be reading them, which rules out both
//!   use-after-free and the ABA problem
//! - **Batch operations**: publish a whole batch with one CAS, or detach the
//!   entire stack at once
//! - **Metrics**: optional contention and latency counters
//!
//! ## Quick Start
//!
//! ```rust
//! use treiberx::ConcurrentStack;
//!
//! let stack = ConcurrentStack::new();
//! stack.push(1);
//! stack.push(2);
//! assert_eq!(stack.pop(), Some(2));
//! assert_eq!(stack.pop(), Some(1));
//! assert_eq!(stack.pop(), None);
//! ```
//!
//! ## Thread Safety
//!
//! [`ConcurrentStack`] is `Send + Sync` whenever `T: Send`. Share it with an
//! `Arc` and call `push`/`pop` from any number of threads. Popping an empty
//! stack returns `None` immediately; nothing in this crate ever blocks.
//!
//! ## Cargo Features
//!
//! - `std` (default): enables the stack itself, which pins epochs on the global
//!   collector
//! - `tracing`: emit structured `tracing` events on contention and teardown
//! - `unstable`: nightly-only documentation attributes

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(feature = "unstable", feature(doc_cfg))]

mod trace_compat;

pub mod metrics;
#[cfg(feature = "std")]
#[cfg_attr(feature = "unstable", doc(cfg(feature = "std")))]
pub mod stack;

pub use crate::metrics::{MetricsCollector, StackMetrics};
#[cfg(feature = "std")]
pub use crate::stack::{ConcurrentStack, StackConfig};

/// Common utilities and helper types
pub mod util {
    use core::ops::{Deref, DerefMut};

    /// Pad a value to a full cache line so that it does not share one with
    /// neighbouring hot fields.
    #[repr(align(64))]
    pub struct CachePadded<T> {
        value: T,
    }

    impl<T> CachePadded<T> {
        /// Create a new cache-padded value
        #[inline]
        pub const fn new(value: T) -> Self {
            Self { value }
        }
    }

    impl<T> Deref for CachePadded<T> {
        type Target = T;

        #[inline]
        fn deref(&self) -> &T {
            &self.value
        }
    }

    impl<T> DerefMut for CachePadded<T> {
        #[inline]
        fn deref_mut(&mut self) -> &mut T {
            &mut self.value
        }
    }

    impl<T: Default> Default for CachePadded<T> {
        fn default() -> Self {
            Self::new(T::default())
        }
    }

    impl<T: core::fmt::Debug> core::fmt::Debug for CachePadded<T> {
        fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
            core::fmt::Debug::fmt(&self.value, f)
        }
    }
}
