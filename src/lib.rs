// The binary in main.rs is a thin terminal driver; everything it plays and
// records lives in this library so integration tests and benchmarks can
// drive sessions and the stats store directly.

pub mod config;
pub mod engine;
pub mod error;
pub mod items;
pub mod session;
pub mod store;

pub use error::{DrillError, Result};
