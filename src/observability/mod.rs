//! Logging and metrics plumbing.

pub mod metrics;
pub mod tracing_init;
