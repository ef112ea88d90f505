//! `relscan verify` command handler
//!
//! Checks that every declared image can be inspected (skopeo) or found
//! locally / pulled (podman). Per-image failures are reported, never fatal.

use std::fmt::Write as _;
use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use relscan_core::Manifest;
use relscan_image_tools::{
    CommandRunner, TokioCommandRunner, VerifyMethod, Verifier, ensure_available,
};

use crate::cli::VerifyArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, column_width, pad};
use crate::progress::Progress;

/// Execute the `verify` command.
pub async fn execute(
    _args: VerifyArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let method = VerifyMethod::from_config(&ctx.config.verify);
    let report = run(ctx, TokioCommandRunner::new(), method).await?;
    writer.render(&report)
}

/// Verifies all manifests and writes one report file per manifest.
///
/// # Errors
///
/// Returns `CliError::ToolUnavailable` when the selected tool is missing
/// and `CliError::Io` when a report file cannot be written.
pub async fn run<R: CommandRunner>(
    ctx: &RunContext,
    runner: R,
    method: VerifyMethod,
) -> Result<VerifyRunReport, CliError> {
    ensure_available(&runner, method.program()).await?;

    let mut report = VerifyRunReport {
        tool: method.program().to_owned(),
        arch: method.arch().map(str::to_owned),
        os: method.os().map(str::to_owned),
        mirrors: ctx.mirror_lines(),
        reports_dir: ctx.config.paths.reports_dir.clone(),
        manifests: Vec::new(),
        errors: Vec::new(),
    };
    info!(
        tool = %report.tool,
        arch = report.arch.as_deref().unwrap_or("-"),
        os = report.os.as_deref().unwrap_or("-"),
        mirrors = report.mirrors.len(),
        "verifying image accessibility"
    );

    let verifier = Verifier::new(runner, method);
    for path in ctx.manifest_files() {
        let manifest = match Manifest::load(path).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                report.errors.push(e.to_string());
                continue;
            }
        };
        let verification = verify_manifest(ctx, &verifier, &manifest).await;

        let layout = ctx.layout(&manifest);
        tokio::fs::create_dir_all(layout.version_dir()).await?;
        let report_path = layout.verify_report_path();
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        tokio::fs::write(
            &report_path,
            report_file_text(&report, ctx.mirror_count(), &verification, &generated_at),
        )
        .await?;
        info!(
            path = %report_path.display(),
            passed = verification.passed,
            failed = verification.failed,
            "verification report written"
        );

        report.manifests.push(ManifestVerification {
            report_path: report_path.display().to_string(),
            ..verification
        });
    }
    Ok(report)
}

async fn verify_manifest<R: CommandRunner>(
    ctx: &RunContext,
    verifier: &Verifier<R>,
    manifest: &Manifest,
) -> ManifestVerification {
    let progress = if ctx.show_progress {
        Progress::for_terminal(manifest.len(), "Checking")
    } else {
        Progress::hidden(manifest.len(), "Checking")
    };

    let mut verification = ManifestVerification {
        manifest: manifest.path.display().to_string(),
        report_path: String::new(),
        images: Vec::with_capacity(manifest.len()),
        passed: 0,
        failed: 0,
        total_secs: 0.0,
    };

    for (idx, image) in manifest.images.iter().enumerate() {
        progress.start(idx + 1, &image.key);
        let reference = image.reference();
        let redirect = ctx.redirect(&reference);
        let outcome = verifier.verify(&redirect.reference).await;
        let elapsed = outcome.elapsed.as_secs_f64();
        verification.total_secs += elapsed;

        let failure = outcome.result.err().map(|f| f.reason);
        if failure.is_none() {
            verification.passed += 1;
        } else {
            verification.failed += 1;
            warn!(
                image_key = %image.key,
                reason = failure.as_deref().unwrap_or_default(),
                "image not accessible"
            );
        }
        progress.finish_item(&format!(
            "{} {} ({elapsed:.1}s)",
            if failure.is_none() { "✓" } else { "✗" },
            image.key
        ));

        verification.images.push(VerifiedImage {
            key: image.key.clone(),
            reference,
            mirror_reference: redirect
                .matched_source
                .is_some()
                .then(|| redirect.reference.clone()),
            accessible: failure.is_none(),
            reason: failure,
            elapsed_secs: elapsed,
        });
    }
    progress.finish();
    verification
}

/// Text written to `{version}_verify_report.txt`.
pub fn report_file_text(
    run: &VerifyRunReport,
    mirror_count: usize,
    verification: &ManifestVerification,
    generated_at: &str,
) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "Image Verification Report - {generated_at}");
    let _ = writeln!(out, "Tool: {}", run.tool);
    if let Some(ref arch) = run.arch {
        let _ = writeln!(out, "Architecture: {arch}");
    }
    if let Some(ref os) = run.os {
        let _ = writeln!(out, "OS: {os}");
    }
    if mirror_count > 0 {
        let _ = writeln!(out, "ICSP Mirrors: {mirror_count} configured");
    }
    let _ = writeln!(out, "{rule}\n");

    for image in &verification.images {
        let secs = image.elapsed_secs;
        match (image.accessible, &image.mirror_reference) {
            (true, Some(mirror)) => {
                let _ = writeln!(out, "✓ {}: {} ({secs:.1}s)", image.key, image.reference);
                let _ = writeln!(out, "  → Verified via ICSP mirror: {mirror}");
            }
            (true, None) => {
                let _ = writeln!(out, "✓ {}: {} ({secs:.1}s)", image.key, image.reference);
            }
            (false, Some(mirror)) => {
                let _ = writeln!(out, "✗ {}: {} ({secs:.1}s)", image.key, image.reference);
                let _ = writeln!(out, "  → Failed even with ICSP mirror: {mirror}");
            }
            (false, None) => {
                let _ = writeln!(
                    out,
                    "✗ {}: {} - NOT ACCESSIBLE ({secs:.1}s)",
                    image.key, image.reference
                );
            }
        }
    }

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(
        out,
        "Summary: {} passed, {} failed out of {} total",
        verification.passed,
        verification.failed,
        verification.images.len()
    );
    let _ = writeln!(
        out,
        "Total verification time: {:.1}s (avg: {:.1}s per image)",
        verification.total_secs,
        verification.average_secs()
    );
    out
}

/// Result of a `verify` run.
#[derive(Debug, Serialize)]
pub struct VerifyRunReport {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub mirrors: Vec<String>,
    pub reports_dir: String,
    pub manifests: Vec<ManifestVerification>,
    pub errors: Vec<String>,
}

/// Verification of one manifest.
#[derive(Debug, Serialize)]
pub struct ManifestVerification {
    pub manifest: String,
    pub report_path: String,
    pub images: Vec<VerifiedImage>,
    pub passed: usize,
    pub failed: usize,
    pub total_secs: f64,
}

impl ManifestVerification {
    /// Mean time per image (0 for an empty manifest).
    pub fn average_secs(&self) -> f64 {
        if self.images.is_empty() {
            0.0
        } else {
            self.total_secs / self.images.len() as f64
        }
    }
}

/// One verified image.
#[derive(Debug, Serialize)]
pub struct VerifiedImage {
    pub key: String,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_reference: Option<String>,
    pub accessible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub elapsed_secs: f64,
}

impl Render for VerifyRunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.mirrors.is_empty() {
            writeln!(w, "{}", "No ICSP config loaded".yellow())?;
        } else {
            writeln!(
                w,
                "{}",
                format!("Loaded {} ICSP mirror(s):", self.mirrors.len()).green()
            )?;
            for line in &self.mirrors {
                writeln!(w, "  {line}")?;
            }
        }

        let mut tool = format!("Verifying image accessibility with {}", self.tool);
        if let Some(ref arch) = self.arch {
            tool.push_str(&format!(" (arch: {arch})"));
        }
        if let Some(ref os) = self.os {
            tool.push_str(&format!(" (os: {os})"));
        }
        writeln!(w, "{}", tool.blue())?;

        for error in &self.errors {
            writeln!(w, "{}", format!("Error: {error}").red())?;
        }

        for manifest in &self.manifests {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                format!("Processing: {}", manifest.manifest).yellow().bold()
            )?;

            let key_width = column_width(manifest.images.iter().map(|i| i.key.as_str()), 5);
            writeln!(
                w,
                "  {}  {:^10}  {:>8}",
                pad("Image", key_width).cyan().bold(),
                "Status",
                "Time"
            )?;
            for image in &manifest.images {
                let status = if image.accessible {
                    format!("{:^10}", "✓ OK").green()
                } else {
                    format!("{:^10}", "✗ FAILED").red()
                };
                writeln!(
                    w,
                    "  {}  {}  {:>8}",
                    pad(&image.key, key_width).cyan(),
                    status,
                    format!("{:.1}s", image.elapsed_secs).magenta()
                )?;
            }

            writeln!(w)?;
            writeln!(
                w,
                "{}  {}  Total: {}",
                format!("✓ {} passed", manifest.passed).green(),
                format!("✗ {} failed", manifest.failed).red(),
                manifest.images.len()
            )?;
            writeln!(
                w,
                "Verification time: {:.1}s (avg: {:.1}s per image)",
                manifest.total_secs,
                manifest.average_secs()
            )?;
            writeln!(w, "Report saved to: {}", manifest.report_path.cyan())?;
        }

        writeln!(w)?;
        writeln!(
            w,
            "{}",
            format!("✓ Verification complete. Reports in {}", self.reports_dir)
                .green()
                .bold()
        )?;
        Ok(())
    }
}
