//! Command execution seam for streaming external tool output.

mod runner;

pub use runner::*;
