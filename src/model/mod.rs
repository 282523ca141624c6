//! Ready-made rollback participants
//!
//! Small actors demonstrating how a model embeds the engine: each one owns a
//! [`Lineage`](crate::engine::Lineage), keeps its mutable state in versioned
//! containers, and exposes plain methods on top. Drivers that only need a
//! working graph to speculate over can use these directly; anything more
//! specialised should follow the same shape.

// Submodules
pub mod composite;
pub mod sources;

// Re-export commonly used types
pub use composite::{Assembly, Relay, link_relays, unlink_next};
pub use sources::{Accumulator, Counter, Ramp};
