//! Time sources: the wall clock and the simulated clock used by `simulate`.

pub mod source;

pub use source::{Clock, RealClock, SimulatedClock, Wake};
