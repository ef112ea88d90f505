//! CLI-specific error types and exit code mapping

use relscan_core::error::{ConfigError, RelscanError};
use relscan_image_tools::ToolError;
use relscan_notify::NotifyError;
use relscan_vuln_report::VulnReportError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to standard Unix exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// A required external tool (trivy, skopeo, podman) is missing.
    #[error("{0}")]
    ToolUnavailable(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from relscan-core.
    #[error("{0}")]
    Core(#[from] RelscanError),

    /// Report directory or comparison error.
    #[error("report error: {0}")]
    Report(#[from] VulnReportError),

    /// Notification delivery error.
    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success (reporting commands always)       |
    /// | 1    | General / command error                   |
    /// | 2    | Configuration error                       |
    /// | 3    | Required external tool missing            |
    /// | 4    | Notification delivery failed              |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(RelscanError::Config(_)) => 2,
            Self::Core(RelscanError::Io(_)) => 10,
            Self::ToolUnavailable(_) => 3,
            Self::Notify(e) if e.is_configuration() => 2,
            Self::Notify(_) => 4,
            Self::Io(_) | Self::Report(VulnReportError::Io { .. }) => 10,
            Self::JsonSerialize(_)
            | Self::Command(_)
            | Self::Core(RelscanError::Manifest(_))
            | Self::Report(_) => 1,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Core(RelscanError::Config(e))
    }
}

impl From<ToolError> for CliError {
    fn from(e: ToolError) -> Self {
        match e {
            ToolError::Unavailable { .. } => Self::ToolUnavailable(e.to_string()),
            ToolError::Io { .. } | ToolError::Spawn { .. } => Self::Command(e.to_string()),
        }
    }
}
