//! Traffic Light State Machine
//!
//! This example drives a cyclic state machine with events and a guard.
//!
//! Key concepts:
//! - Triggered transitions cycling through states
//! - A guarded maintenance transition that blocks, then recovers
//! - Entry behaviors and a tracing-backed history reporter
//!
//! Run with: RUST_LOG=info cargo run --example traffic_light

use behavior::fsm::{MachineExecution, State, StateMachine, Transition};
use behavior::reporter::TracingReporter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Traffic Light State Machine ===\n");

    let crew_on_site = Arc::new(AtomicBool::new(false));
    let crew = Arc::clone(&crew_on_site);

    let announce = |light: &'static str| {
        move |_: &MachineExecution| println!("  light is now {light}")
    };

    let machine = StateMachine::builder("traffic-light")
        .state(State::start("red").on_entry(announce("RED")))
        .state(State::normal("green").on_entry(announce("GREEN")))
        .state(State::normal("yellow").on_entry(announce("YELLOW")))
        .state(State::final_state("off"))
        .transition(Transition::new("red", "green").on("timer"))
        .transition(Transition::new("green", "yellow").on("timer"))
        .transition(Transition::new("yellow", "red").on("timer"))
        .transition(
            Transition::new("red", "off")
                .on("shutdown")
                .guard(move |_, _| crew.load(Ordering::SeqCst)),
        )
        .build()
        .unwrap();

    let mut light = MachineExecution::with_reporter(machine, Arc::new(TracingReporter::new(Level::INFO)))
        .start()
        .unwrap();

    println!("Cycling twice:");
    for _ in 0..6 {
        light = light.handle_event("timer").unwrap();
    }

    println!("\nShutdown without a crew on site:");
    light = light.handle_event("shutdown").unwrap();
    println!("  condition: {}", light.condition());

    println!("\nCrew arrives, shutdown again:");
    crew_on_site.store(true, Ordering::SeqCst);
    light = light.handle_event("shutdown").unwrap();
    println!(
        "  condition: {}, state: {}",
        light.condition(),
        light.current_state_name().map(|s| s.as_str()).unwrap_or("-")
    );

    println!("\n=== Example Complete ===");
}
