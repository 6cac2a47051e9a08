//! Producer/Consumer Petri Net
//!
//! This example moves items through a bounded buffer.
//!
//! Key concepts:
//! - Weighted arcs and a capacity place
//! - Nondeterministic firing rounds
//! - Bounded execution for nets that never finish on their own
//! - Streaming token movements through a channel reporter
//!
//! Run with: cargo run --example producer_consumer

use behavior::petri::{NetEvent, NetEventKind, NetExecution, PetriNet};
use behavior::reporter::ChannelReporter;
use std::sync::Arc;

fn main() {
    println!("=== Producer/Consumer Petri Net ===\n");

    // Every produced item occupies a slot until a pair of items is consumed.
    let net = PetriNet::builder("producer-consumer")
        .places(["raw", "slots", "buffer", "consumed"])
        .transitions(["produce", "consume"])
        .arc("raw", "produce", 1)
        .arc("slots", "produce", 1)
        .arc("produce", "buffer", 1)
        .arc("buffer", "consume", 2)
        .arc("consume", "slots", 2)
        .arc("consume", "consumed", 1)
        .build()
        .unwrap();

    let (reporter, mut receiver) = ChannelReporter::<NetEvent>::new();
    let mut execution = NetExecution::builder(net)
        .tokens("raw", 8)
        .tokens("slots", 3)
        .reporter(Arc::new(reporter))
        .seed(42)
        .build()
        .unwrap();

    let finished = execution.execute_bounded(50);

    let mut firings = 0;
    while let Ok(event) = receiver.try_recv() {
        if let NetEventKind::Firing { transition } = &event.kind {
            firings += 1;
            println!("  round event: {transition} fired");
        }
    }

    println!("\nFinished: {finished} after {} rounds, {firings} firings", execution.step_count());
    for (place, count) in execution.marking().counts() {
        println!("  {place}: {count}");
    }

    println!("\n=== Example Complete ===");
}
