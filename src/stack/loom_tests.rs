//! Loom-based model checking of the stack's CAS protocol
//!
//! `crossbeam-epoch` pins on real atomics that Loom cannot observe, so these
//! tests run a model of the same algorithm built on Loom's atomics. Popped
//! nodes are retired to a list that is only freed when the stack is dropped,
//! which is the grace period the epoch collector guarantees in the real
//! implementation.

use loom::sync::atomic::{AtomicPtr, Ordering};
use loom::sync::Arc;
use loom::thread;
use std::mem::ManuallyDrop;
use std::ptr;
use std::sync::Mutex;

struct Node<T> {
    value: ManuallyDrop<T>,
    next: *mut Node<T>,
}

/// Treiber stack over Loom atomics with reclamation deferred to drop
struct LoomStack<T> {
    head: AtomicPtr<Node<T>>,
    retired: Mutex<Vec<*mut Node<T>>>,
}

unsafe impl<T: Send> Send for LoomStack<T> {}
unsafe impl<T: Send> Sync for LoomStack<T> {}

impl<T> LoomStack<T> {
    fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            retired: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: ptr::null_mut(),
        }));

        loop {
            let head = self.head.load(Ordering::Acquire);
            unsafe {
                (*node).next = head;
            }

            if self
                .head
                .compare_exchange(head, node, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
        }
    }

    fn pop(&self) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            if head.is_null() {
                return None;
            }

            // Nodes are never freed before drop, so `head` is still valid.
            let next = unsafe { (*head).next };

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                let value = unsafe { ManuallyDrop::into_inner(ptr::read(&(*head).value)) };
                self.retired.lock().unwrap().push(head);
                return Some(value);
            }
        }
    }

    fn drain(&self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.pop() {
            values.push(value);
        }
        values
    }
}

impl<T> Drop for LoomStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.with_mut(|head| *head);
        while !current.is_null() {
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next;
            unsafe { ManuallyDrop::drop(&mut node.value) };
        }

        for node in self.retired.get_mut().unwrap().drain(..) {
            drop(unsafe { Box::from_raw(node) });
        }
    }
}

#[test]
fn loom_concurrent_pushes_are_not_lost() {
    loom::model(|| {
        let stack = Arc::new(LoomStack::new());

        let handles: Vec<_> = (1..=2)
            .map(|value| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || stack.push(value))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut values = stack.drain();
        values.sort_unstable();
        assert_eq!(values, vec![1, 2]);
    });
}

#[test]
fn loom_racing_pops_take_one_value_once() {
    loom::model(|| {
        let stack = Arc::new(LoomStack::new());
        stack.push(42);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || stack.pop())
            })
            .collect();

        let results: Vec<Option<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        assert!(results.contains(&Some(42)));
        assert_eq!(stack.pop(), None);
    });
}

#[test]
fn loom_push_and_pop_interleave_linearizably() {
    loom::model(|| {
        let stack = Arc::new(LoomStack::new());
        stack.push(1);

        let pusher = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.push(2))
        };
        let popper = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.pop())
        };

        pusher.join().unwrap();
        let popped = popper.join().unwrap();

        // The pop linearizes either before the push (sees 1) or after it
        // (sees 2); it can never find the stack empty.
        let popped = popped.expect("stack was never empty");
        assert!(popped == 1 || popped == 2);

        let mut remaining = stack.drain();
        remaining.push(popped);
        remaining.sort_unstable();
        assert_eq!(remaining, vec![1, 2]);
    });
}

#[test]
fn loom_pop_pop_push_conserves_values() {
    let mut builder = loom::model::Builder::new();
    builder.preemption_bound = Some(2);

    builder.check(|| {
        let stack = Arc::new(LoomStack::new());
        stack.push(1);
        stack.push(2);

        let poppers: Vec<_> = (0..2)
            .map(|_| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || stack.pop())
            })
            .collect();
        let pusher = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.push(3))
        };

        pusher.join().unwrap();
        let mut seen: Vec<i32> = poppers
            .into_iter()
            .map(|h| h.join().unwrap().expect("at least two values were present"))
            .collect();
        seen.extend(stack.drain());
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 2, 3]);
    });
}
