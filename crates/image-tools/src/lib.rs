#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Tool adapter errors (`ToolError`)
//! - [`runner`]: `CommandRunner` trait, `TokioCommandRunner`, `MockCommandRunner` (test-util)
//! - [`scanner`]: `TrivyScanner` with remote → pull → local-store fallback
//! - [`verifier`]: `Verifier` (skopeo inspect / podman inspect + pull)
//! - [`runtime`]: Tool availability, podman machine socket, registry auth file
//!
//! # Architecture
//!
//! ```text
//! image reference --> MirrorRules::redirect --> TrivyScanner / Verifier
//!                                                      |
//!                                               CommandRunner (trait)
//!                                                      |
//!                                      trivy / skopeo / podman subprocess
//!                                                      |
//!                                      raw artifact file / success flag
//! ```

pub mod error;
pub mod runner;
pub mod runtime;
pub mod scanner;
pub mod verifier;

// --- Public API Re-exports ---

// Error
pub use error::ToolError;

// Runner
#[cfg(any(test, feature = "test-util"))]
pub use runner::{MockCommandRunner, MockReply};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, TokioCommandRunner};

// Scanner
pub use scanner::{ScanFailure, ScanMode, ScanOptions, TrivyScanner};

// Verifier
pub use verifier::{VerifyFailure, VerifyMethod, VerifyOutcome, Verifier};

// Runtime
pub use runtime::{ensure_available, is_available, podman_socket, registry_auth_file};
