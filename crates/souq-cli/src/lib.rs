//! # souq CLI Handlers
//!
//! Argument types and handler functions for the `souq` binary. Each module
//! owns one subcommand; `main.rs` only parses and dispatches.

pub mod fixture;
pub mod serve;
pub mod sync;
