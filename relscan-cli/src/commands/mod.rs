//! Command handlers -- one module per subcommand

pub mod audit;
pub mod config;
pub mod list;
pub mod notify;
pub mod report;
pub mod scan;
pub mod verify;

use relscan_core::config::RelscanConfig;

use crate::cli::{ArtifactKind, Commands};

/// Apply command-line flags on top of the loaded configuration.
///
/// Flags win over both the config file and `RELSCAN_*` environment overrides.
pub fn apply_overrides(command: &Commands, config: &mut RelscanConfig) {
    match command {
        Commands::List(args) => args.paths.apply(&mut config.paths),
        Commands::Audit(args) => args.paths.apply(&mut config.paths),
        Commands::Report(args) => args.paths.apply(&mut config.paths),
        Commands::Verify(args) => {
            args.paths.apply(&mut config.paths);
            if let Some(tool) = args.tool {
                config.verify.tool = tool.as_str().to_owned();
            }
            if let Some(ref arch) = args.arch {
                config.verify.override_arch = arch.clone();
            }
            if let Some(ref os) = args.os {
                config.verify.override_os = os.clone();
            }
        }
        Commands::Scan(args) => {
            args.paths.apply(&mut config.paths);
            if let Some(format) = args.format {
                config.scan.output_json = format == ArtifactKind::Json;
            }
            if let Some(ref severity) = args.severity {
                config.scan.severity = severity.clone();
            }
        }
        Commands::Notify(args) => {
            args.paths.apply(&mut config.paths);
            if let Some(format) = args.format {
                config.notify.format = format.as_str().to_owned();
            }
            if let Some(ref dir) = args.previous_reports_dir {
                config.notify.previous_reports_dir = dir.clone();
            }
        }
        Commands::Config(_) => {}
    }
}
