//! Structured logging shim.
//!
//! With the `tracing` feature enabled this re-exports the `tracing` macros the
//! crate uses. Without it the same names resolve to macros that expand to
//! nothing, so call sites never need their own `cfg` attributes.

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, trace};

#[cfg(not(feature = "tracing"))]
#[allow(unused_macros)]
mod noop {
    /// No-op trace-level event.
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level event.
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    #[allow(unused_imports)]
    pub(crate) use {debug, trace};
}

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use noop::{debug, trace};
