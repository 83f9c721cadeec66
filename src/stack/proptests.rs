//! Property-based tests for the stack using proptest
//!
//! A `Vec` used as a sequential stack is the reference model.

use super::ConcurrentStack;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Push(i32),
    Pop,
    PushBatch(Vec<i32>),
    PopBatch(usize),
    TakeAll,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<i32>().prop_map(Op::Push),
        3 => Just(Op::Pop),
        1 => prop::collection::vec(any::<i32>(), 0..8).prop_map(Op::PushBatch),
        1 => (0usize..6).prop_map(Op::PopBatch),
        1 => Just(Op::TakeAll),
    ]
}

proptest! {
    #[test]
    fn test_matches_sequential_model(ops in prop::collection::vec(op_strategy(), 1..200)) {
        let stack = ConcurrentStack::new();
        let mut model: Vec<i32> = Vec::new();

        for op in ops {
            match op {
                Op::Push(value) => {
                    stack.push(value);
                    model.push(value);
                }
                Op::Pop => {
                    prop_assert_eq!(stack.pop(), model.pop());
                }
                Op::PushBatch(values) => {
                    stack.push_batch(values.clone());
                    model.extend(values);
                }
                Op::PopBatch(max) => {
                    let expected: Vec<i32> =
                        (0..max).map_while(|_| model.pop()).collect();
                    prop_assert_eq!(stack.pop_batch(max), expected);
                }
                Op::TakeAll => {
                    let expected: Vec<i32> = model.drain(..).rev().collect();
                    prop_assert_eq!(stack.take_all(), expected);
                }
            }

            prop_assert_eq!(stack.len(), model.len());
            prop_assert_eq!(stack.is_empty(), model.is_empty());
        }
    }

    #[test]
    fn test_single_thread_lifo(values in prop::collection::vec(any::<u64>(), 0..100)) {
        let stack = ConcurrentStack::new();
        for &value in &values {
            stack.push(value);
        }

        for &expected in values.iter().rev() {
            prop_assert_eq!(stack.pop(), Some(expected));
        }
        prop_assert_eq!(stack.pop(), None);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_concurrent_conservation(
        per_thread in prop::collection::vec(prop::collection::vec(any::<u32>(), 0..200), 1..6)
    ) {
        let stack = Arc::new(ConcurrentStack::new());

        let handles: Vec<_> = per_thread
            .iter()
            .cloned()
            .enumerate()
            .map(|(thread_id, values)| {
                let stack = Arc::clone(&stack);
                thread::spawn(move || {
                    let mut popped = Vec::new();
                    for (i, value) in values.into_iter().enumerate() {
                        stack.push((thread_id, value));
                        if i % 2 == 1 {
                            if let Some(item) = stack.pop() {
                                popped.push(item);
                            }
                        }
                    }
                    popped
                })
            })
            .collect();

        let mut observed = Vec::new();
        for handle in handles {
            observed.extend(handle.join().unwrap());
        }
        observed.extend(stack.take_all());

        let mut expected: Vec<(usize, u32)> = per_thread
            .into_iter()
            .enumerate()
            .flat_map(|(thread_id, values)| values.into_iter().map(move |v| (thread_id, v)))
            .collect();

        expected.sort_unstable();
        observed.sort_unstable();
        prop_assert_eq!(observed, expected);
        prop_assert!(stack.is_empty());
    }
}
