//! Stack Module
//!
//! The lock-free Treiber stack and its configuration.

pub mod config;
pub mod lock_free;

pub use config::StackConfig;
pub use lock_free::{ConcurrentStack, IntoIter};


// Proptest persists failures to disk and loom drives its own scheduler,
// neither of which Miri's isolation supports.
#[cfg(all(test, not(miri)))]
mod proptests;

#[cfg(all(test, not(miri)))]
mod loom_tests;
