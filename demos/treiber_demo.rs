//! Concurrent push/pop demo for treiberx
//!
//! Fifty threads push the values 0..49, then fifty threads pop one value each,
//! then one last pop reports whether anything is left. Phases are separated by
//! joining every thread of the previous phase, so the outcome is deterministic:
//! the final pop always finds the stack empty.
//!
//! Run with `RUST_LOG=debug cargo run --example treiber_demo --features tracing`
//! to see the stack's own events.

use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use treiberx::{ConcurrentStack, MetricsCollector};

const PUSHERS: usize = 50;
const POPPERS: usize = 50;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = FmtSubscriber::builder().with_env_filter(env_filter).try_init();

    let stack: Arc<ConcurrentStack<usize>> = Arc::new(ConcurrentStack::new());

    println!("Treiber stack demo");
    println!("==================");

    println!("\n1. Pushing {} values concurrently", PUSHERS);
    let pushers: Vec<_> = (0..PUSHERS)
        .map(|value| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.push(value))
        })
        .collect();
    for handle in pushers {
        handle.join().map_err(|_| "pusher thread panicked")?;
    }
    info!(len = stack.len(), "push phase complete");

    println!("\n2. Popping with {} concurrent threads", POPPERS);
    let poppers: Vec<_> = (0..POPPERS)
        .map(|_| {
            let stack = Arc::clone(&stack);
            thread::spawn(move || stack.pop())
        })
        .collect();

    let mut popped = 0;
    for handle in poppers {
        let result = handle.join().map_err(|_| "popper thread panicked")?;
        match result {
            Some(value) => {
                popped += 1;
                println!("   {} true", value);
            }
            None => println!("   - false"),
        }
    }
    info!(popped, "pop phase complete");

    println!("\n3. Final pop");
    match stack.pop() {
        Some(value) => println!("   Popped: {}", value),
        None => println!("   Stack is empty"),
    }

    let metrics = stack.metrics();
    println!("\nMetrics:");
    println!("   pushes:       {}", metrics.pushes);
    println!("   pops:         {}", metrics.pops);
    println!("   empty pops:   {}", metrics.empty_pops);
    println!("   CAS retries:  {}", metrics.cas_retries);
    println!("   contention:   {:.1}%", metrics.contention_rate());
    println!("   avg op time:  {:?}", metrics.avg_operation_time());
    println!("   max op time:  {:?}", metrics.max_operation_time());

    Ok(())
}
