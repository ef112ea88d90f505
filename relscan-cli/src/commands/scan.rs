//! `relscan scan` command handler
//!
//! Scans every declared image with trivy, writes the raw artifact per image
//! and a per-release summary file. A scan whose artifact cannot be parsed is
//! counted as failed, never as zero vulnerabilities.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use relscan_core::Manifest;
use relscan_image_tools::scanner::TRIVY;
use relscan_image_tools::{
    CommandRunner, ScanOptions, TokioCommandRunner, TrivyScanner, ensure_available, podman_socket,
    registry_auth_file,
};
use relscan_vuln_report::parser;
use relscan_vuln_report::{ArtifactFormat, ImageResult, VulnerabilitySummary};

use crate::cli::ScanArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, column_width, pad};
use crate::progress::Progress;

/// Execute the `scan` command.
pub async fn execute(
    _args: ScanArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (scanner, runtime) = prepare(TokioCommandRunner::new(), ctx).await?;
    let report = run(ctx, &scanner, runtime).await?;
    writer.render(&report)
}

/// Container runtime facts reported before scanning.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RuntimeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub podman_socket: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_file: Option<PathBuf>,
}

/// Checks that trivy is installed and detects the container runtime.
///
/// # Errors
///
/// Returns `CliError::ToolUnavailable` when trivy is missing.
pub async fn prepare<R: CommandRunner>(
    runner: R,
    ctx: &RunContext,
) -> Result<(TrivyScanner<R>, RuntimeInfo), CliError> {
    ensure_available(&runner, TRIVY).await?;
    let runtime = RuntimeInfo {
        podman_socket: podman_socket(&runner).await,
        auth_file: registry_auth_file(),
    };
    info!(
        podman_socket = ?runtime.podman_socket,
        auth_file = ?runtime.auth_file,
        "container runtime detected"
    );
    let options =
        ScanOptions::from_config(&ctx.config.scan).with_auth_file(runtime.auth_file.clone());
    Ok((TrivyScanner::new(runner, options), runtime))
}

/// Scans all manifests.
///
/// # Errors
///
/// Only report directory and summary file I/O errors abort the run.
pub async fn run<R: CommandRunner>(
    ctx: &RunContext,
    scanner: &TrivyScanner<R>,
    runtime: RuntimeInfo,
) -> Result<ScanRunReport, CliError> {
    let options = scanner.options();
    let mut report = ScanRunReport {
        severity: options.severity.clone(),
        format: options.format,
        runtime,
        mirrors: ctx.mirror_lines(),
        reports_dir: ctx.config.paths.reports_dir.clone(),
        manifests: Vec::new(),
        errors: Vec::new(),
    };
    info!(
        severity = %report.severity,
        format = %report.format,
        mirrors = report.mirrors.len(),
        "scanning images for vulnerabilities"
    );

    for path in ctx.manifest_files() {
        let manifest = match Manifest::load(path).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                report.errors.push(e.to_string());
                continue;
            }
        };

        let layout = ctx.layout(&manifest);
        layout.prepare().await?;
        let mut scan = scan_manifest(ctx, scanner, &manifest).await;

        let summary_path = layout.summary_path();
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        tokio::fs::write(
            &summary_path,
            summary_file_text(&report.severity, ctx.mirror_count(), &scan, &generated_at),
        )
        .await?;
        info!(
            path = %summary_path.display(),
            scanned = scan.scanned,
            failed = scan.failed,
            "scan summary written"
        );

        scan.summary_path = summary_path.display().to_string();
        scan.images.sort_by(|a, b| a.result.key.cmp(&b.result.key));
        report.manifests.push(scan);
    }
    Ok(report)
}

async fn scan_manifest<R: CommandRunner>(
    ctx: &RunContext,
    scanner: &TrivyScanner<R>,
    manifest: &Manifest,
) -> ManifestScan {
    let format = scanner.options().format;
    let layout = ctx.layout(manifest);
    let progress = if ctx.show_progress {
        Progress::for_terminal(manifest.len(), "Scanning")
    } else {
        Progress::hidden(manifest.len(), "Scanning")
    };

    let mut scan = ManifestScan {
        manifest: manifest.path.display().to_string(),
        summary_path: String::new(),
        images: Vec::with_capacity(manifest.len()),
        scanned: 0,
        failed: 0,
        total_secs: 0.0,
    };

    for (idx, image) in manifest.images.iter().enumerate() {
        progress.start(idx + 1, &image.key);
        let reference = image.reference();
        let redirect = ctx.redirect(&reference);
        let artifact = layout.artifact_path(&image.key, format);

        let started = Instant::now();
        let result = match scanner.scan(&redirect.reference, &artifact).await {
            Ok(mode) => match parser::parse_file(&artifact).await {
                Ok(summary) => {
                    info!(image_key = %image.key, %mode, total = summary.total, "image scanned");
                    ImageResult::scanned(&image.key, summary)
                }
                Err(failure) => {
                    warn!(image_key = %image.key, %failure, "scan artifact unparseable");
                    ImageResult::failed(&image.key, failure.to_string())
                }
            },
            Err(failure) => {
                warn!(image_key = %image.key, reason = %failure, "scan failed");
                ImageResult::failed(&image.key, failure.reason)
            }
        };
        let elapsed = started.elapsed().as_secs_f64();
        scan.total_secs += elapsed;

        let row = ScannedImage {
            reference,
            mirror_reference: redirect
                .matched_source
                .is_some()
                .then(|| redirect.reference.clone()),
            artifact: artifact.display().to_string(),
            elapsed_secs: elapsed,
            result,
        };
        if row.result.is_failed() {
            scan.failed += 1;
        } else {
            scan.scanned += 1;
        }
        progress.finish_item(&row.progress_line());
        scan.images.push(row);
    }
    progress.finish();
    scan
}

/// Text written to `{version}_cve_summary.txt`.
pub fn summary_file_text(
    severity: &str,
    mirror_count: usize,
    scan: &ManifestScan,
    generated_at: &str,
) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();
    let _ = writeln!(out, "CVE Scan Summary - {generated_at}");
    let _ = writeln!(out, "Severity Filter: {severity}");
    if mirror_count > 0 {
        let _ = writeln!(out, "ICSP Mirrors: {mirror_count} configured");
    }
    let _ = writeln!(out, "{rule}\n");

    for image in &scan.images {
        let key = &image.result.key;
        let secs = image.elapsed_secs;
        match image.result.summary() {
            Some(summary) => {
                let _ = writeln!(out, "✓ {key}: {} ({secs:.1}s)", image.reference);
                if let Some(ref mirror) = image.mirror_reference {
                    let _ = writeln!(out, "  → Scanned via ICSP mirror: {mirror}");
                }
                if summary.total > 0 {
                    if summary.has_breakdown() {
                        let _ = writeln!(
                            out,
                            "  Found {} vulnerabilities: {} CRIT, {} HIGH, {} MED, {} LOW",
                            summary.total,
                            summary.critical,
                            summary.high,
                            summary.medium,
                            summary.low
                        );
                    } else {
                        let _ = writeln!(out, "  Found {} vulnerabilities", summary.total);
                    }
                }
            }
            None => match image.mirror_reference {
                Some(ref mirror) => {
                    let _ = writeln!(out, "✗ {key}: {} ({secs:.1}s)", image.reference);
                    let _ = writeln!(out, "  → Failed even with ICSP mirror: {mirror}");
                }
                None => {
                    let _ = writeln!(
                        out,
                        "✗ {key}: {} - Scan failed ({secs:.1}s)",
                        image.reference
                    );
                }
            },
        }
    }

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(
        out,
        "Summary: {} scanned, {} failed out of {} total",
        scan.scanned,
        scan.failed,
        scan.images.len()
    );
    let _ = writeln!(
        out,
        "Total scan time: {:.1}s (avg: {:.1}s per image)",
        scan.total_secs,
        scan.average_secs()
    );
    out
}

/// Result of a `scan` run.
#[derive(Debug, Serialize)]
pub struct ScanRunReport {
    pub severity: String,
    pub format: ArtifactFormat,
    pub runtime: RuntimeInfo,
    pub mirrors: Vec<String>,
    pub reports_dir: String,
    pub manifests: Vec<ManifestScan>,
    pub errors: Vec<String>,
}

/// Scan of one manifest. Images are sorted by key once the summary file is written.
#[derive(Debug, Serialize)]
pub struct ManifestScan {
    pub manifest: String,
    pub summary_path: String,
    pub images: Vec<ScannedImage>,
    pub scanned: usize,
    pub failed: usize,
    pub total_secs: f64,
}

impl ManifestScan {
    /// Mean time per image (0 for an empty manifest).
    pub fn average_secs(&self) -> f64 {
        if self.images.is_empty() {
            0.0
        } else {
            self.total_secs / self.images.len() as f64
        }
    }
}

/// One scanned image.
#[derive(Debug, Serialize)]
pub struct ScannedImage {
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_reference: Option<String>,
    pub artifact: String,
    pub elapsed_secs: f64,
    #[serde(flatten)]
    pub result: ImageResult,
}

impl ScannedImage {
    fn progress_line(&self) -> String {
        let secs = self.elapsed_secs;
        match self.result.summary() {
            None => format!("✗ FAILED in {secs:.1}s"),
            Some(s) if s.total == 0 => {
                format!("✓ Completed in {secs:.1}s - No vulnerabilities found")
            }
            Some(s) if s.has_breakdown() => format!(
                "✓ Completed in {secs:.1}s - Found {} vulns: {} CRIT, {} HIGH, {} MED, {} LOW",
                s.total, s.critical, s.high, s.medium, s.low
            ),
            Some(s) => format!(
                "✓ Completed in {secs:.1}s - Found {} vulnerabilities",
                s.total
            ),
        }
    }
}

fn count_cell(count: u64) -> String {
    if count > 0 {
        count.to_string()
    } else {
        "-".to_owned()
    }
}

fn severity_cells(summary: Option<&VulnerabilitySummary>) -> [String; 5] {
    match summary {
        Some(s) if s.has_breakdown() => [
            count_cell(s.critical),
            count_cell(s.high),
            count_cell(s.medium),
            count_cell(s.low),
            count_cell(s.total),
        ],
        Some(s) => [
            "-".to_owned(),
            "-".to_owned(),
            "-".to_owned(),
            "-".to_owned(),
            count_cell(s.total),
        ],
        None => std::array::from_fn(|_| "-".to_owned()),
    }
}

impl Render for ScanRunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if let Some(ref socket) = self.runtime.podman_socket {
            writeln!(w, "{} {}", "Podman socket:".green(), socket.display())?;
        }
        if let Some(ref auth) = self.runtime.auth_file {
            writeln!(w, "{} {}", "Registry auth:".green(), auth.display())?;
        }
        if self.runtime.podman_socket.is_none() && self.runtime.auth_file.is_none() {
            writeln!(
                w,
                "{}",
                "No podman socket or auth detected (will try direct registry access)".yellow()
            )?;
        }
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
        let label = match self.format {
            ArtifactFormat::Json => "JSON",
            ArtifactFormat::Table => "text",
        };
        writeln!(
            w,
            "{}",
            format!("Scanning images for vulnerabilities ({label} output)...").blue()
        )?;
        writeln!(w, "Severity filter: {}", self.severity.yellow())?;

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

            let key_width = column_width(manifest.images.iter().map(|i| i.result.key.as_str()), 5);
            writeln!(
                w,
                "  {}  {:^10}  {:>8}  {:>5}  {:>5}  {:>5}  {:>5}  {:>6}",
                pad("Image", key_width).cyan().bold(),
                "Status",
                "Time",
                "CRIT",
                "HIGH",
                "MED",
                "LOW",
                "Total"
            )?;
            for image in &manifest.images {
                let status = if image.result.is_failed() {
                    format!("{:^10}", "✗ FAILED").red()
                } else {
                    format!("{:^10}", "✓ OK").green()
                };
                let [crit, high, med, low, total] = severity_cells(image.result.summary());
                writeln!(
                    w,
                    "  {}  {}  {:>8}  {:>5}  {:>5}  {:>5}  {:>5}  {:>6}",
                    pad(&image.result.key, key_width).cyan(),
                    status,
                    format!("{:.1}s", image.elapsed_secs),
                    crit,
                    high,
                    med,
                    low,
                    total
                )?;
            }

            writeln!(w)?;
            writeln!(
                w,
                "{}  {}  Total: {}",
                format!("✓ {} scanned", manifest.scanned).green(),
                format!("✗ {} failed", manifest.failed).red(),
                manifest.images.len()
            )?;
            writeln!(
                w,
                "Scan time: {:.1}s (avg: {:.1}s per image)",
                manifest.total_secs,
                manifest.average_secs()
            )?;
            writeln!(w, "Summary saved to: {}", manifest.summary_path.cyan())?;
        }

        writeln!(w)?;
        writeln!(
            w,
            "{}",
            format!("✓ CVE scanning complete. Reports in {}", self.reports_dir)
                .green()
                .bold()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_summary(critical: u64, high: u64) -> VulnerabilitySummary {
        let mut summary = VulnerabilitySummary::empty(ArtifactFormat::Json);
        summary.critical = critical;
        summary.high = high;
        summary.total = critical + high;
        summary
    }

    fn row(result: ImageResult, mirror: Option<&str>) -> ScannedImage {
        ScannedImage {
            reference: format!("quay.io/acm/{}@sha256:abc", result.key),
            mirror_reference: mirror.map(str::to_owned),
            artifact: format!("reports/2.17.0/json/2.17.0_{}_trivy.json", result.key),
            elapsed_secs: 2.0,
            result,
        }
    }

    fn scan() -> ManifestScan {
        let mut table = VulnerabilitySummary::empty(ArtifactFormat::Table);
        table.total = 4;
        ManifestScan {
            manifest: "extras/2.17.0.json".to_owned(),
            summary_path: String::new(),
            images: vec![
                row(ImageResult::scanned("console", json_summary(2, 3)), None),
                row(
                    ImageResult::scanned("search", json_summary(0, 0)),
                    Some("mirror.local/acm/search@sha256:abc"),
                ),
                row(ImageResult::scanned("grc", table), None),
                row(ImageResult::failed("obs", "pull failed: denied"), None),
                row(
                    ImageResult::failed("insights", "local scan failed: exit code 1"),
                    Some("mirror.local/acm/insights@sha256:abc"),
                ),
            ],
            scanned: 3,
            failed: 2,
            total_secs: 10.0,
        }
    }

    #[test]
    fn test_summary_file_lines() {
        let text = summary_file_text("HIGH,CRITICAL", 1, &scan(), "2026-01-01 00:00:00");
        assert!(text.starts_with(
            "CVE Scan Summary - 2026-01-01 00:00:00\nSeverity Filter: HIGH,CRITICAL\nICSP Mirrors: 1 configured\n"
        ));
        assert!(text.contains(
            "✓ console: quay.io/acm/console@sha256:abc (2.0s)\n  Found 5 vulnerabilities: 2 CRIT, 3 HIGH, 0 MED, 0 LOW\n"
        ));
        assert!(text.contains(
            "✓ search: quay.io/acm/search@sha256:abc (2.0s)\n  → Scanned via ICSP mirror: mirror.local/acm/search@sha256:abc\n"
        ));
        assert!(text.contains("✓ grc: quay.io/acm/grc@sha256:abc (2.0s)\n  Found 4 vulnerabilities\n"));
        assert!(text.contains("✗ obs: quay.io/acm/obs@sha256:abc - Scan failed (2.0s)\n"));
        assert!(text.contains(
            "✗ insights: quay.io/acm/insights@sha256:abc (2.0s)\n  → Failed even with ICSP mirror: mirror.local/acm/insights@sha256:abc\n"
        ));
        assert!(text.contains("Summary: 3 scanned, 2 failed out of 5 total\n"));
        assert!(text.contains("Total scan time: 10.0s (avg: 2.0s per image)\n"));
    }

    #[test]
    fn test_zero_vulnerabilities_is_not_failure() {
        let text = summary_file_text("HIGH,CRITICAL", 0, &scan(), "now");
        let search = text
            .lines()
            .find(|l| l.contains("search:"))
            .expect("search line");
        assert!(search.starts_with('✓'));
        assert!(!text.contains("ICSP Mirrors"));
    }

    #[test]
    fn test_severity_cells() {
        let cells = severity_cells(Some(&json_summary(2, 0)));
        assert_eq!(cells, ["2", "-", "-", "-", "2"].map(str::to_owned));

        let mut table = VulnerabilitySummary::empty(ArtifactFormat::Table);
        table.total = 7;
        assert_eq!(
            severity_cells(Some(&table)),
            ["-", "-", "-", "-", "7"].map(str::to_owned)
        );
        assert_eq!(
            severity_cells(None),
            ["-", "-", "-", "-", "-"].map(str::to_owned)
        );
    }

    #[test]
    fn test_progress_lines() {
        let s = scan();
        assert_eq!(
            s.images[0].progress_line(),
            "✓ Completed in 2.0s - Found 5 vulns: 2 CRIT, 3 HIGH, 0 MED, 0 LOW"
        );
        assert_eq!(
            s.images[1].progress_line(),
            "✓ Completed in 2.0s - No vulnerabilities found"
        );
        assert_eq!(s.images[3].progress_line(), "✗ FAILED in 2.0s");
    }

    #[test]
    fn test_scanned_image_json_flattens_result() {
        let json = serde_json::to_value(&scan().images[3]).expect("json");
        assert_eq!(json["key"], "obs");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "pull failed: denied");
    }
}
