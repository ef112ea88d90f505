//! relscan CLI library
//!
//! The `relscan` binary is a thin wrapper around these modules; they are
//! exposed so the command handlers can be exercised from integration tests.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
