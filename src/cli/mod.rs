//! Command-line interface for rqueue.
//!
//! Provides commands for running workers, enqueueing jobs, and inspecting
//! queues.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli, Commands};
