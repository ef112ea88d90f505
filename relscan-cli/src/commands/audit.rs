//! `relscan audit` command handler
//!
//! Reporting command: findings never change the exit code.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use relscan_core::Manifest;

use crate::cli::AuditArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, column_width, pad};

/// Digest column width before truncation.
const DIGEST_DISPLAY_LEN: usize = 50;

/// Execute the `audit` command.
pub async fn execute(
    _args: AuditArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_report(ctx).await;
    info!(issues = report.issue_count(), "digest audit finished");
    writer.render(&report)
}

/// Classifies every declared digest.
pub async fn build_report(ctx: &RunContext) -> AuditReport {
    let mut report = AuditReport::default();
    for path in ctx.manifest_files() {
        report.checked.push(path.display().to_string());
        match Manifest::load(path).await {
            Ok(manifest) => report.audit_manifest(&manifest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "manifest could not be audited");
                report.manifest_errors.push(e.to_string());
            }
        }
    }
    report
}

/// Audit findings across all manifests.
#[derive(Debug, Default, Serialize)]
pub struct AuditReport {
    /// Manifest files checked, in order
    pub checked: Vec<String>,
    /// Placeholder or malformed digests
    pub issues: Vec<DigestIssue>,
    /// Manifests that could not be read or parsed
    pub manifest_errors: Vec<String>,
}

/// A flagged digest.
#[derive(Debug, Serialize)]
pub struct DigestIssue {
    pub file: String,
    pub image: String,
    pub digest: String,
    pub issue: &'static str,
}

impl AuditReport {
    fn audit_manifest(&mut self, manifest: &Manifest) {
        for image in &manifest.images {
            if let Some(label) = image.digest_class().issue_label() {
                self.issues.push(DigestIssue {
                    file: manifest.path.display().to_string(),
                    image: image.key.clone(),
                    digest: image.digest_str().to_owned(),
                    issue: label,
                });
            }
        }
    }

    /// Flagged digests plus unreadable manifests.
    pub fn issue_count(&self) -> usize {
        self.issues.len() + self.manifest_errors.len()
    }
}

fn truncate_digest(digest: &str) -> String {
    if digest.chars().count() > DIGEST_DISPLAY_LEN {
        let cut: String = digest.chars().take(DIGEST_DISPLAY_LEN).collect();
        format!("{cut}...")
    } else {
        digest.to_owned()
    }
}

impl Render for AuditReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", "Checking for dummy/invalid SHA digests...".blue())?;
        writeln!(w)?;
        for file in &self.checked {
            writeln!(w, "{}", format!("Checking: {file}").yellow())?;
        }
        for error in &self.manifest_errors {
            writeln!(w, "{}", format!("Error: {error}").red())?;
        }
        writeln!(w)?;

        let found = self.issue_count();
        if found == 0 {
            writeln!(
                w,
                "{}",
                "✓ No dummy or invalid SHA digests found".green().bold()
            )?;
            return Ok(());
        }

        if !self.issues.is_empty() {
            let digests: Vec<String> = self
                .issues
                .iter()
                .map(|i| truncate_digest(&i.digest))
                .collect();
            let image_width = column_width(self.issues.iter().map(|i| i.image.as_str()), 5);
            let digest_width = column_width(digests.iter().map(String::as_str), 6);

            writeln!(
                w,
                "{}",
                format!("Found {found} Dummy/Invalid SHAs").yellow().bold()
            )?;
            writeln!(
                w,
                "  {}  {}  {}",
                pad("Image", image_width).bold(),
                pad("Digest", digest_width).bold(),
                "Issue Type".bold(),
            )?;
            for (issue, digest) in self.issues.iter().zip(&digests) {
                writeln!(
                    w,
                    "  {}  {}  {}",
                    pad(&issue.image, image_width).cyan(),
                    pad(digest, digest_width).yellow(),
                    issue.issue.red(),
                )?;
            }
            writeln!(w)?;
        }
        writeln!(
            w,
            "{}",
            format!("Found {found} dummy/invalid SHAs").yellow().bold()
        )?;
        Ok(())
    }
}
