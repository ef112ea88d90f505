#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`VulnReportError`)
//! - [`summary`]: `VulnerabilitySummary`, `CveDetail`, per-image `ImageResult`
//! - [`parser`]: Scanner artifact parsers (`parse_json`, `parse_table`, `ParseFailure`)
//! - [`compare`]: Release-to-release comparison (`compare_results`, `ComparisonResult`)
//! - [`layout`]: Report directory layout and artifact discovery (`ReportLayout`)
//!
//! # Architecture
//!
//! ```text
//! manifest --> ReportLayout::find_artifact --> parser::parse_file --> ImageResult
//!                                                                         |
//! previous reports --> load_previous_results --> SummaryMap --> compare_results
//!                                                                         |
//!                                                                 ComparisonResult
//! ```

pub mod compare;
pub mod error;
pub mod layout;
pub mod parser;
pub mod summary;

// --- Public API Re-exports ---

// Error
pub use error::VulnReportError;

// Summary types
pub use summary::{
    ArtifactFormat, CveDetail, ImageResult, ScanOutcome, Totals, VulnerabilitySummary,
};

// Parser
pub use parser::{ParseFailure, parse_json, parse_table};

// Comparator
pub use compare::{
    ComparisonEntry, ComparisonResult, NetChange, SummaryMap, compare, compare_results,
};

// Layout
pub use layout::{ReportLayout, load_previous_results, summary_map};
