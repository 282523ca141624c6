//! `speculate` – drive an assembly through a speculative session.
//!
//! Runs a few committed warmup steps, opens a speculative stretch, and rolls
//! back to the decision point when the stretch does not pay off. Run with
//! `RUST_LOG=debug` to watch the engine's attach and restore bookkeeping.

use anyhow::Result;

use retrograde::model::Assembly;
use retrograde::{Checkpoint, Versioned};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let scope = Checkpoint::new();
    let mut assembly = Assembly::new(1, 3, 4);
    assembly.attach(&scope)?;

    println!("warming up");
    for _ in 0..3 {
        scope.advance();
        let total = assembly.step()?;
        println!("  version {:>2}  total {total}", scope.timestamp());
    }

    let decision_point = scope.timestamp();
    println!("speculating past version {decision_point}");
    for _ in 0..4 {
        scope.advance();
        let total = assembly.step()?;
        println!("  version {:>2}  total {total}", scope.timestamp());
    }

    let speculative_total = assembly.accumulator().sum();
    if speculative_total > 100 {
        println!("keeping the speculative stretch (total {speculative_total})");
        assembly.commit(scope.timestamp());
    } else {
        println!("rolling back to version {decision_point} (total {speculative_total} fell short)");
        assembly.restore(decision_point, true)?;
        println!("  total  {}", assembly.accumulator().sum());
        println!("  cycles {}", assembly.cycles());
        println!("  window {:?}", assembly.accumulator().window());
        assembly.commit(decision_point);
    }

    println!("members: {:?}", scope.report());
    Ok(())
}
