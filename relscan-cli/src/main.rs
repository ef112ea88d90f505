//! relscan -- release image listing, verification and CVE reporting

use clap::Parser;
use tracing::debug;

use relscan_cli::cli::{Cli, Commands, OutputFormat};
use relscan_cli::commands;
use relscan_cli::context::RunContext;
use relscan_cli::error::CliError;
use relscan_cli::logging::init_tracing;
use relscan_cli::output::OutputWriter;
use relscan_core::config::{GeneralConfig, RelscanConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    // `config` reports load errors itself instead of failing before rendering.
    if let Commands::Config(args) = cli.command {
        init_tracing(&GeneralConfig::default(), cli.log_level.as_deref())?;
        return commands::config::execute(args, cli.config.as_deref(), &writer).await;
    }

    let mut config = RelscanConfig::load_or_default(cli.config.as_deref()).await?;
    commands::apply_overrides(&cli.command, &mut config);
    config.validate()?;
    init_tracing(&config.general, cli.log_level.as_deref())?;
    debug!(command = ?cli.command, "configuration loaded");

    let mut ctx = RunContext::load(config).await?;
    if matches!(cli.output, OutputFormat::Json) {
        ctx = ctx.without_progress();
    }

    match cli.command {
        Commands::List(args) => commands::list::execute(args, &ctx, &writer).await,
        Commands::Audit(args) => commands::audit::execute(args, &ctx, &writer).await,
        Commands::Report(args) => commands::report::execute(args, &ctx, &writer).await,
        Commands::Verify(args) => commands::verify::execute(args, &ctx, &writer).await,
        Commands::Scan(args) => commands::scan::execute(args, &ctx, &writer).await,
        Commands::Notify(args) => commands::notify::execute(args, &ctx, &writer).await,
        Commands::Config(_) => Ok(()),
    }
}
