//! Hierarchical wall clock timers for setup/solve instrumentation.

mod timers;
pub use timers::*;
