//! Weather Markov Chain
//!
//! This example walks a small weather model until a storm ends it.
//!
//! Key concepts:
//! - Validating rows and reporting every problem at once
//! - Seeded, reproducible random walks
//! - Lazy walking with an iterator
//! - Rendering the chain as graph text
//!
//! Run with: cargo run --example weather_chain

use behavior::markov::{ChainExecution, MkChain, Row};
use stillwater::validation::Validation;

fn main() {
    println!("=== Weather Markov Chain ===\n");

    println!("A broken definition reports all of its rows:");
    if let Validation::Failure(errors) = MkChain::new(vec![
        Row::new("sunny").to("rainy", 0.7),
        Row::new("rainy").to("foggy", 1.0),
    ]) {
        for error in errors.iter() {
            println!("  - {error}");
        }
    }

    let chain = match MkChain::new(vec![
        Row::new("sunny").to("sunny", 0.6).to("cloudy", 0.3).to("storm", 0.1),
        Row::new("cloudy").to("sunny", 0.4).to("cloudy", 0.3).to("rainy", 0.3),
        Row::new("rainy").to("cloudy", 0.5).to("rainy", 0.3).to("storm", 0.2),
        Row::new("storm"),
    ]) {
        Validation::Success(chain) => chain,
        Validation::Failure(errors) => panic!("weather rows are invalid: {errors:?}"),
    };

    println!("\nAbsorbing states:");
    for state in chain.states().filter(|s| chain.is_absorbing(s.as_str())) {
        println!("  {state}");
    }

    println!("\nA seeded walk from sunny:");
    let walk = ChainExecution::builder(chain.clone(), "sunny")
        .seed(7)
        .build()
        .unwrap()
        .walk();
    let days: Vec<String> = walk.take(30).map(|s| s.to_string()).collect();
    println!("  {}", days.join(" -> "));

    let week = ChainExecution::builder(chain.clone(), "cloudy")
        .seed(7)
        .build()
        .unwrap()
        .execute(7);
    println!("\nAfter a week starting cloudy: {} ({} moves)", week.current(), week.steps());

    println!("\nGraph text:\n{}", chain.to_graph_text());

    println!("=== Example Complete ===");
}
