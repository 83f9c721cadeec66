//! Lock-Free Stack Implementation
//!
//! A lock-free multi-producer multi-consumer stack based on Treiber's
//! algorithm, with node memory reclaimed through `crossbeam-epoch`.
//!
//! ## Algorithm
//!
//! The stack is a singly-linked list whose only shared mutable state is the
//! `head` pointer. Both operations are a load of `head` followed by a single
//! compare-and-swap, retried until the CAS wins:
//!
//! ```text
//! push(v):  n = new Node(v)          pop():  h = head            (Acquire)
//!           loop {                           loop {
//!             h = head    (Acquire)            if h == null { return None }
//!             n.next = h                       nx = h.next       (Acquire)
//!             CAS(head, h, n) (Release)        CAS(head, h, nx)  (Release)
//!           }                                }
//! ```
//!
//! The total order of successful CAS operations on `head` is the
//! linearization order of all pushes and pops.
//!
//! ## Memory Reclamation
//!
//! Between loading `head` and executing its CAS, a popper dereferences the
//! node it observed to read `next`. If a competing popper could free that
//! node in the meantime, the read would be a use-after-free, and a recycled
//! allocation at the same address would let a stale CAS succeed (ABA).
//!
//! Every operation therefore runs pinned to the current epoch. A popped node
//! is handed to the collector with `defer_destroy` and only freed once every
//! thread that was pinned when it was unlinked has unpinned. While a thread
//! is pinned, no node it could have observed is freed, so no address it
//! observed can be reused, so its CAS can never match a recycled node.

use core::fmt;
use core::mem::ManuallyDrop;
use core::ptr;
use core::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use crossbeam_utils::Backoff;

use super::config::StackConfig;
use crate::metrics::{AtomicMetrics, MetricsCollector, StackMetrics};
use crate::trace_compat::{debug, trace};
use crate::util::CachePadded;

/// A node in the lock-free stack
///
/// The value is wrapped in `ManuallyDrop` because ownership of it is moved
/// out by the winning popper while the node record itself is destroyed later
/// by the epoch collector.
struct Node<T> {
    value: ManuallyDrop<T>,
    next: Atomic<Node<T>>,
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Self {
            value: ManuallyDrop::new(value),
            next: Atomic::null(),
        }
    }
}

/// A lock-free stack implementation using Treiber's algorithm
///
/// This stack provides:
/// - Lock-free push and pop operations
/// - Use-after-free and ABA prevention through epoch-based reclamation
/// - Atomic batch publication and whole-stack detachment
/// - Performance metrics collection
///
/// Popping an empty stack is not an error: [`pop`](Self::pop) returns `None`
/// immediately and never waits for a future push.
///
/// # Type Parameters
///
/// * `T` - The type of elements stored in the stack
///
/// # Examples
///
/// ```rust
/// use treiberx::ConcurrentStack;
///
/// let stack = ConcurrentStack::new();
///
/// // Push elements
/// stack.push(1);
/// stack.push(2);
/// stack.push(3);
///
/// // Pop elements
/// assert_eq!(stack.pop(), Some(3));
/// assert_eq!(stack.pop(), Some(2));
/// assert_eq!(stack.pop(), Some(1));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct ConcurrentStack<T> {
    /// The head pointer of the stack
    head: CachePadded<Atomic<Node<T>>>,
    /// Construction-time configuration
    config: StackConfig,
    /// Performance metrics
    metrics: AtomicMetrics,
    /// Metrics enabled flag
    metrics_enabled: AtomicBool,
}

// Values are only ever moved in and out of the stack, never shared between
// threads by reference, so `T: Send` is enough for both.
unsafe impl<T: Send> Send for ConcurrentStack<T> {}
unsafe impl<T: Send> Sync for ConcurrentStack<T> {}

impl<T> ConcurrentStack<T> {
    /// Create a new empty lock-free stack
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack: ConcurrentStack<i32> = ConcurrentStack::new();
    /// assert!(stack.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_config(StackConfig::default())
    }

    /// Create a new empty stack with the given configuration
    pub fn with_config(config: StackConfig) -> Self {
        Self {
            head: CachePadded::new(Atomic::null()),
            config,
            metrics: AtomicMetrics::default(),
            metrics_enabled: AtomicBool::new(config.metrics_enabled),
        }
    }

    /// The configuration this stack was created with
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Push a value onto the stack
    ///
    /// This operation is lock-free: it never blocks and never fails, and under
    /// any schedule some contending operation completes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push(42);
    /// assert_eq!(stack.pop(), Some(42));
    /// ```
    pub fn push(&self, value: T) {
        let timer = self.start_timer();
        let backoff = Backoff::new();
        let mut retries = 0u32;
        let mut node = Owned::new(Node::new(value));
        let guard = &epoch::pin();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            node.next.store(head, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                node,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => break,
                Err(err) => {
                    node = err.new;
                    retries += 1;
                    self.on_contention(&backoff);
                }
            }
        }

        if retries > 0 {
            trace!(retries, "push completed after CAS retries");
        }
        if self.is_metrics_enabled() {
            self.metrics.record_push(timer.map(|t| t.elapsed()));
        }
    }

    /// Pop a value from the stack
    ///
    /// This operation is lock-free. It returns immediately with `None` when it
    /// observes an empty stack.
    ///
    /// # Returns
    ///
    /// * `Some(value)` if the stack was not empty
    /// * `None` if the stack was empty
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push(42);
    ///
    /// assert_eq!(stack.pop(), Some(42));
    /// assert_eq!(stack.pop(), None);
    /// ```
    pub fn pop(&self) -> Option<T> {
        let timer = self.start_timer();
        let backoff = Backoff::new();
        let mut retries = 0u32;
        let guard = &epoch::pin();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);

            // SAFETY: nodes are only freed through the collector and this
            // thread is pinned, so anything loaded from `head` stays alive.
            let Some(node) = (unsafe { head.as_ref() }) else {
                if self.is_metrics_enabled() {
                    self.metrics.record_empty();
                }
                return None;
            };

            let next = node.next.load(Ordering::Acquire, guard);

            if self
                .head
                .compare_exchange_weak(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // SAFETY: the CAS unlinked `head`, and only one CAS can ever
                // unlink a given node, so the value is moved out exactly once.
                // The collector later drops the node but not the value.
                let value = unsafe {
                    let value = ManuallyDrop::into_inner(ptr::read(&node.value));
                    guard.defer_destroy(head);
                    value
                };

                if retries > 0 {
                    trace!(retries, "pop completed after CAS retries");
                }
                if self.is_metrics_enabled() {
                    self.metrics.record_pop(timer.map(|t| t.elapsed()));
                }
                return Some(value);
            }

            retries += 1;
            self.on_contention(&backoff);
        }
    }

    /// Check if the stack is empty
    ///
    /// This is a snapshot: under concurrent use the answer may be stale by the
    /// time it is returned.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// assert!(stack.is_empty());
    ///
    /// stack.push(42);
    /// assert!(!stack.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        self.head.load(Ordering::Acquire, guard).is_null()
    }

    /// Get the approximate number of elements in the stack
    ///
    /// Note: This traverses the entire stack. The count is exact when no other
    /// thread is mutating the stack and approximate otherwise. Use it for
    /// debugging or monitoring, not for control flow.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// assert_eq!(stack.len(), 0);
    ///
    /// stack.push(1);
    /// stack.push(2);
    /// assert_eq!(stack.len(), 2);
    /// ```
    pub fn len(&self) -> usize {
        let guard = &epoch::pin();
        let mut count = 0;
        let mut current = self.head.load(Ordering::Acquire, guard);

        // SAFETY: a node's `next` was below it in the stack when it was
        // linked, so every node on the walk was reachable after we pinned and
        // cannot have been freed yet.
        while let Some(node) = unsafe { current.as_ref() } {
            count += 1;
            current = node.next.load(Ordering::Acquire, guard);
        }

        count
    }

    /// Pop up to `max_count` elements
    ///
    /// Each element is a separate pop; other threads may interleave between
    /// them. Stops early once the stack is observed empty.
    ///
    /// # Returns
    ///
    /// A vector containing the popped elements (in LIFO order)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push(1);
    /// stack.push(2);
    /// stack.push(3);
    ///
    /// assert_eq!(stack.pop_batch(2), vec![3, 2]);
    /// assert_eq!(stack.pop_batch(5), vec![1]);
    /// ```
    pub fn pop_batch(&self, max_count: usize) -> Vec<T> {
        let mut result = Vec::with_capacity(max_count.min(64));

        for _ in 0..max_count {
            match self.pop() {
                Some(value) => result.push(value),
                None => break,
            }
        }

        result
    }

    /// Push multiple elements with a single atomic publication
    ///
    /// The values are linked into a private chain first, then the whole chain
    /// is spliced onto the stack with one CAS, so other threads observe either
    /// none or all of the batch. The last element yielded ends up on top.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push_batch(vec![1, 2, 3]);
    ///
    /// assert_eq!(stack.pop(), Some(3));
    /// assert_eq!(stack.pop(), Some(2));
    /// assert_eq!(stack.pop(), Some(1));
    /// ```
    pub fn push_batch<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut values = values.into_iter();
        let Some(first) = values.next() else {
            return;
        };

        let timer = self.start_timer();
        let guard = &epoch::pin();

        let bottom = Owned::new(Node::new(first)).into_shared(guard);
        let mut top = bottom;
        let mut count = 1u64;
        for value in values {
            let node = Owned::new(Node::new(value));
            node.next.store(top, Ordering::Relaxed);
            top = node.into_shared(guard);
            count += 1;
        }

        // SAFETY: the chain is private to this thread until the CAS below
        // publishes it, and `bottom` is non-null.
        let bottom = unsafe { bottom.deref() };
        let backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            bottom.next.store(head, Ordering::Relaxed);

            match self.head.compare_exchange_weak(
                head,
                top,
                Ordering::Release,
                Ordering::Relaxed,
                guard,
            ) {
                Ok(_) => break,
                Err(_) => self.on_contention(&backoff),
            }
        }

        if self.is_metrics_enabled() {
            self.metrics
                .record_push_batch(count, timer.map(|t| t.elapsed()));
        }
    }

    /// Atomically detach every element currently on the stack
    ///
    /// A single swap empties the stack; concurrent pushes after the swap land
    /// on the now-empty stack and are not included. Calling it on an empty
    /// stack is recorded in the metrics as an empty pop.
    ///
    /// # Returns
    ///
    /// The detached elements in LIFO order (top of stack first)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use treiberx::ConcurrentStack;
    ///
    /// let stack = ConcurrentStack::new();
    /// stack.push(1);
    /// stack.push(2);
    ///
    /// assert_eq!(stack.take_all(), vec![2, 1]);
    /// assert!(stack.is_empty());
    /// ```
    pub fn take_all(&self) -> Vec<T> {
        let timer = self.start_timer();
        let guard = &epoch::pin();
        let mut current = self.head.swap(Shared::null(), Ordering::AcqRel, guard);
        let mut values = Vec::new();

        // SAFETY: after the swap no CAS on `head` can match a detached node,
        // since none of them can be freed and re-pushed while we are pinned.
        // The detached chain and its values therefore belong to this thread.
        // Poppers that loaded a detached node before the swap may still read
        // its `next`, which is why the nodes are retired, not freed.
        while let Some(node) = unsafe { current.as_ref() } {
            let next = node.next.load(Ordering::Acquire, guard);
            unsafe {
                values.push(ManuallyDrop::into_inner(ptr::read(&node.value)));
                guard.defer_destroy(current);
            }
            current = next;
        }

        if !values.is_empty() {
            debug!(count = values.len(), "detached all values from stack");
        }
        if self.is_metrics_enabled() {
            if values.is_empty() {
                self.metrics.record_empty();
            } else {
                self.metrics
                    .record_pop_batch(values.len() as u64, timer.map(|t| t.elapsed()));
            }
        }

        values
    }

    fn start_timer(&self) -> Option<Instant> {
        self.is_metrics_enabled().then(Instant::now)
    }

    fn on_contention(&self, backoff: &Backoff) {
        if self.is_metrics_enabled() {
            self.metrics.record_contention();
        }
        if self.config.backoff {
            backoff.spin();
        }
    }
}

impl<T> Default for ConcurrentStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ConcurrentStack<T> {
    fn drop(&mut self) {
        let mut remaining = 0usize;

        // SAFETY: `&mut self` guarantees no other thread can reach the stack,
        // so the linked nodes can be freed immediately. Popped nodes are not
        // on the chain; they belong to the collector.
        unsafe {
            let guard = epoch::unprotected();
            let mut current = self.head.load(Ordering::Relaxed, guard);

            while !current.is_null() {
                let mut node = current.into_owned();
                current = node.next.load(Ordering::Relaxed, guard);
                ManuallyDrop::drop(&mut node.value);
                remaining += 1;
            }
        }

        if remaining > 0 {
            debug!(remaining, "dropped stack with values still linked");
        }
    }
}

impl<T> fmt::Debug for ConcurrentStack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentStack")
            .field("len", &self.len())
            .field("config", &self.config)
            .field("metrics_enabled", &self.is_metrics_enabled())
            .finish()
    }
}

impl<T> FromIterator<T> for ConcurrentStack<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let stack = Self::new();
        stack.push_batch(iter);
        stack
    }
}

impl<T> Extend<T> for ConcurrentStack<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.push_batch(iter);
    }
}

/// An owning iterator that drains a [`ConcurrentStack`] in LIFO order
#[derive(Debug)]
pub struct IntoIter<T> {
    stack: ConcurrentStack<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.stack.pop()
    }
}

impl<T> IntoIterator for ConcurrentStack<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { stack: self }
    }
}

impl<T> MetricsCollector for ConcurrentStack<T> {
    fn metrics(&self) -> StackMetrics {
        self.metrics.snapshot()
    }

    fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn set_metrics_enabled(&self, enabled: bool) {
        self.metrics_enabled.store(enabled, Ordering::Relaxed);
    }

    fn is_metrics_enabled(&self) -> bool {
        self.metrics_enabled.load(Ordering::Relaxed)
    }
}
