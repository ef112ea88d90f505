//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use relscan_core::config::PathsConfig;

/// relscan -- release image listing, verification and CVE reporting.
///
/// Use `relscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "relscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the relscan.toml configuration file
    /// (default: ./relscan.toml when present, otherwise built-in defaults).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List declared images per manifest with digest status.
    List(ListArgs),

    /// Report placeholder and malformed digests (always exits 0).
    Audit(AuditArgs),

    /// Write the comprehensive per-release image report.
    Report(ReportArgs),

    /// Verify every image is pullable from its registry.
    Verify(VerifyArgs),

    /// Scan every image for vulnerabilities with trivy.
    Scan(ScanArgs),

    /// Post the CVE scan summary to the chat channel.
    Notify(NotifyArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- shared path overrides ----

/// Overrides for the `[paths]` configuration section.
#[derive(Args, Debug, Default, Clone)]
pub struct PathArgs {
    /// Directory containing the release manifests (*.json).
    #[arg(long)]
    pub manifest_dir: Option<String>,

    /// Directory where reports are written.
    #[arg(long)]
    pub reports_dir: Option<String>,

    /// Mirror (ICSP) configuration file.
    #[arg(long)]
    pub mirror_config: Option<String>,

    /// Release version used for report paths (default: manifest file name).
    #[arg(long)]
    pub release_version: Option<String>,
}

impl PathArgs {
    /// Apply the given overrides on top of the loaded configuration.
    pub fn apply(&self, paths: &mut PathsConfig) {
        if let Some(ref dir) = self.manifest_dir {
            paths.manifest_dir = dir.clone();
        }
        if let Some(ref dir) = self.reports_dir {
            paths.reports_dir = dir.clone();
        }
        if let Some(ref file) = self.mirror_config {
            paths.mirror_config = file.clone();
        }
        if let Some(ref version) = self.release_version {
            paths.version = version.clone();
        }
    }
}

// ---- list / audit / report ----

/// List declared images.
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Show the full digest instead of the 12-character short form.
    #[arg(long)]
    pub full_digest: bool,
}

/// Audit manifest digests.
#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(flatten)]
    pub paths: PathArgs,
}

/// Write comprehensive image reports.
#[derive(Args, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub paths: PathArgs,
}

// ---- verify ----

/// Verify image accessibility.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Verification tool.
    #[arg(long)]
    pub tool: Option<VerifyTool>,

    /// Architecture override (skopeo only).
    #[arg(long)]
    pub arch: Option<String>,

    /// OS override (skopeo only).
    #[arg(long)]
    pub os: Option<String>,
}

/// Registry inspection tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerifyTool {
    /// `skopeo inspect --raw docker://...`
    Skopeo,
    /// `podman image inspect`, then `podman pull`
    Podman,
}

impl VerifyTool {
    /// Value used in the `[verify] tool` setting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skopeo => "skopeo",
            Self::Podman => "podman",
        }
    }
}

// ---- scan ----

/// Scan images for vulnerabilities.
#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Scanner artifact format.
    #[arg(long)]
    pub format: Option<ArtifactKind>,

    /// Severity filter passed to trivy (e.g. HIGH,CRITICAL).
    #[arg(long)]
    pub severity: Option<String>,
}

/// Scanner artifact formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArtifactKind {
    /// Structured JSON with per-severity breakdown.
    Json,
    /// Plain table text (total count only).
    Table,
}

// ---- notify ----

/// Send the scan summary notification.
#[derive(Args, Debug)]
pub struct NotifyArgs {
    #[command(flatten)]
    pub paths: PathArgs,

    /// Message format.
    #[arg(long)]
    pub format: Option<MessageKind>,

    /// Reports of the previous release, used for the trend block.
    #[arg(long)]
    pub previous_reports_dir: Option<String>,

    /// Print the message payload instead of sending it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Notification message formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageKind {
    /// Executive summary with threaded details.
    Summary,
    /// One section per affected image.
    Detailed,
}

impl MessageKind {
    /// Value used in the `[notify] format` setting.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Detailed => "detailed",
        }
    }
}

// ---- config ----

/// Manage relscan configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, paths, scan, verify, notify).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_list_defaults() {
        let cli = Cli::try_parse_from(["relscan", "list"]).expect("parse succeeded");
        match cli.command {
            Commands::List(args) => {
                assert!(!args.full_digest, "full_digest should default to false");
                assert!(args.paths.manifest_dir.is_none());
            }
            _ => panic!("expected List command"),
        }
        assert!(cli.config.is_none(), "config should default to None");
    }

    #[test]
    fn test_cli_parse_list_full_digest_and_dir() {
        let cli = Cli::try_parse_from([
            "relscan",
            "list",
            "--full-digest",
            "--manifest-dir",
            "/tmp/extras",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::List(args) => {
                assert!(args.full_digest);
                assert_eq!(args.paths.manifest_dir.as_deref(), Some("/tmp/extras"));
            }
            _ => panic!("expected List command"),
        }
    }

    #[test]
    fn test_cli_parse_verify_podman_with_arch() {
        let cli = Cli::try_parse_from([
            "relscan", "verify", "--tool", "podman", "--arch", "arm64", "--os", "linux",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Verify(args) => {
                assert_eq!(args.tool, Some(VerifyTool::Podman));
                assert_eq!(args.arch.as_deref(), Some("arm64"));
                assert_eq!(args.os.as_deref(), Some("linux"));
            }
            _ => panic!("expected Verify command"),
        }
    }

    #[test]
    fn test_cli_parse_verify_invalid_tool_fails() {
        let args = Cli::try_parse_from(["relscan", "verify", "--tool", "docker"]);
        assert!(args.is_err(), "unknown verify tool should be rejected");
    }

    #[test]
    fn test_cli_parse_scan_options() {
        let cli = Cli::try_parse_from([
            "relscan",
            "scan",
            "--format",
            "json",
            "--severity",
            "CRITICAL",
            "--reports-dir",
            "out",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.format, Some(ArtifactKind::Json));
                assert_eq!(args.severity.as_deref(), Some("CRITICAL"));
                assert_eq!(args.paths.reports_dir.as_deref(), Some("out"));
            }
            _ => panic!("expected Scan command"),
        }
    }

    #[test]
    fn test_cli_parse_notify_dry_run() {
        let cli = Cli::try_parse_from([
            "relscan",
            "notify",
            "--format",
            "detailed",
            "--previous-reports-dir",
            "prev",
            "--dry-run",
        ])
        .expect("parse succeeded");
        match cli.command {
            Commands::Notify(args) => {
                assert_eq!(args.format, Some(MessageKind::Detailed));
                assert_eq!(args.previous_reports_dir.as_deref(), Some("prev"));
                assert!(args.dry_run);
            }
            _ => panic!("expected Notify command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["relscan", "config", "show", "--section", "notify"])
            .expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("notify".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "relscan",
            "audit",
            "-c",
            "/etc/relscan.toml",
            "--log-level",
            "debug",
            "--output",
            "json",
        ])
        .expect("parse succeeded");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/relscan.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.output, OutputFormat::Json));
    }

    #[test]
    fn test_cli_parse_missing_command_fails() {
        let args = Cli::try_parse_from(["relscan"]);
        assert!(args.is_err(), "should fail when no command provided");
    }

    #[test]
    fn test_path_args_apply_overrides_only_given_fields() {
        let mut paths = PathsConfig::default();
        let original_reports = paths.reports_dir.clone();
        let args = PathArgs {
            manifest_dir: Some("manifests".to_owned()),
            release_version: Some("2.18.0".to_owned()),
            ..PathArgs::default()
        };
        args.apply(&mut paths);
        assert_eq!(paths.manifest_dir, "manifests");
        assert_eq!(paths.version, "2.18.0");
        assert_eq!(paths.reports_dir, original_reports);
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_name(), "relscan");

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        for name in ["list", "audit", "report", "verify", "scan", "notify", "config"] {
            assert!(
                subcommands.contains(&name),
                "should have '{name}' subcommand"
            );
        }
    }
}
