//! `relscan report` command handler

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use relscan_core::Manifest;

use crate::cli::ReportArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const NOT_AVAILABLE: &str = "N/A";

/// Execute the `report` command.
pub async fn execute(
    _args: ReportArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let summary = write_reports(ctx).await?;
    writer.render(&summary)
}

/// Writes one comprehensive report per manifest.
///
/// # Errors
///
/// Failing to create or write a report file aborts the command. An
/// unreadable manifest is recorded and skipped.
pub async fn write_reports(ctx: &RunContext) -> Result<ReportRunSummary, CliError> {
    let reports_dir = &ctx.config.paths.reports_dir;
    tokio::fs::create_dir_all(reports_dir).await?;

    let mut summary = ReportRunSummary {
        reports_dir: reports_dir.clone(),
        ..ReportRunSummary::default()
    };
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    for path in ctx.manifest_files() {
        let manifest = match Manifest::load(path).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                summary.errors.push(e.to_string());
                continue;
            }
        };

        let report_path = ctx.layout(&manifest).comprehensive_report_path();
        tokio::fs::write(&report_path, comprehensive_report(&manifest, &generated_at)).await?;
        info!(path = %report_path.display(), images = manifest.len(), "report written");

        summary.reports.push(WrittenReport {
            manifest: manifest.path.display().to_string(),
            images: manifest.len(),
            path: report_path.display().to_string(),
        });
    }
    Ok(summary)
}

/// Text of the comprehensive report for one manifest.
pub fn comprehensive_report(manifest: &Manifest, generated_at: &str) -> String {
    let mut by_registry: BTreeMap<&str, usize> = BTreeMap::new();
    for image in &manifest.images {
        *by_registry.entry(image.registry()).or_default() += 1;
    }

    let rule = "=".repeat(60);
    let thin = "-".repeat(60);
    let mut out = String::new();
    // write! into a String cannot fail
    let _ = writeln!(out, "Comprehensive Image Report - {generated_at}");
    let _ = writeln!(out, "{rule}\n");
    let _ = writeln!(out, "Total Images: {}\n", manifest.len());
    let _ = writeln!(out, "Images by Registry:");
    let _ = writeln!(out, "{thin}");
    for (registry, count) in &by_registry {
        let _ = writeln!(out, "{registry}: {count} images");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Image Details:");
    let _ = writeln!(out, "{thin}");

    for image in &manifest.images {
        let _ = writeln!(out, "\nImage Key: {}", image.key);
        let _ = writeln!(out, "  Full Reference: {}", image.reference());
        let _ = writeln!(
            out,
            "  Registry: {}",
            image.remote.as_deref().unwrap_or_default()
        );
        let _ = writeln!(out, "  Name: {}", image.name.as_deref().unwrap_or_default());
        let _ = writeln!(out, "  Digest: {}", image.digest_str());
        let _ = writeln!(
            out,
            "  Git URL: {}",
            image.git_url.as_deref().unwrap_or(NOT_AVAILABLE)
        );
        let _ = writeln!(
            out,
            "  Git Revision: {}",
            image.git_revision.as_deref().unwrap_or(NOT_AVAILABLE)
        );
    }
    out
}

/// Reports written by one run.
#[derive(Debug, Default, Serialize)]
pub struct ReportRunSummary {
    pub reports_dir: String,
    pub reports: Vec<WrittenReport>,
    pub errors: Vec<String>,
}

/// One written report file.
#[derive(Debug, Serialize)]
pub struct WrittenReport {
    pub manifest: String,
    pub images: usize,
    pub path: String,
}

impl Render for ReportRunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Generating comprehensive image report...".blue())?;
        for report in &self.reports {
            writeln!(w)?;
            writeln!(w, "{}", format!("Processing: {}", report.manifest).yellow())?;
            writeln!(w, "Report saved to: {}", report.path)?;
        }
        for error in &self.errors {
            writeln!(w, "{}", format!("Error: {error}").red())?;
        }
        writeln!(w)?;
        writeln!(
            w,
            "{}",
            format!(
                "Report generation complete. Reports in {}",
                self.reports_dir
            )
            .green()
        )?;
        Ok(())
    }
}
