//! `relscan notify` command handler
//!
//! Reads the scan artifacts of the primary manifest, optionally compares them
//! with a previous release and posts the result to the chat channel.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::{info, warn};

use relscan_core::Manifest;
use relscan_core::error::ConfigError;
use relscan_notify::{Delivery, Message, MessageFormat, ReportContext, SlackClient, build};
use relscan_vuln_report::{
    ComparisonResult, ImageResult, NetChange, SummaryMap, Totals, VulnReportError, compare_results,
    load_previous_results,
};

use crate::cli::NotifyArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `notify` command.
pub async fn execute(
    args: NotifyArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report_ctx = load_context(ctx).await?;
    if args.dry_run {
        let preview = preview(ctx, &report_ctx);
        return writer.render(&preview);
    }
    let report = send(ctx, &report_ctx).await?;
    writer.render(&report)
}

/// Builds the message input from the primary manifest and its artifacts.
///
/// # Errors
///
/// Fails when the primary manifest cannot be loaded or the previous
/// reports directory cannot be read.
pub async fn load_context(ctx: &RunContext) -> Result<ReportContext, CliError> {
    let primary = ctx
        .manifests
        .primary()
        .ok_or_else(|| ConfigError::NoManifests {
            path: ctx.config.paths.manifest_dir.clone(),
        })?;
    let manifest = Manifest::load(primary)
        .await
        .map_err(relscan_core::RelscanError::from)?;
    let layout = ctx.layout(&manifest);
    let results = layout.load_current_results(&manifest).await;
    info!(
        version = layout.version(),
        images = results.len(),
        "current scan results loaded"
    );

    let comparison = match ctx.config.notify.previous_reports_dir.as_str() {
        "" => None,
        dir => match load_previous_results(dir, layout.version()).await? {
            Some(previous) => compare_or_skip(&results, &previous)?,
            None => {
                info!(dir, "no previous scan results, trend omitted");
                None
            }
        },
    };

    Ok(
        ReportContext::new(&ctx.config.notify.product, layout.version(), results)
            .with_manifest(&manifest)
            .with_comparison(comparison),
    )
}

fn compare_or_skip(
    current: &[ImageResult],
    previous: &SummaryMap,
) -> Result<Option<ComparisonResult>, CliError> {
    match compare_results(current, previous) {
        Ok(result) => Ok(Some(result)),
        Err(e @ VulnReportError::UnsupportedComparison { .. }) => {
            warn!(error = %e, "trend comparison skipped");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Builds the messages without sending them.
pub fn preview(ctx: &RunContext, report_ctx: &ReportContext) -> NotifyPreview {
    let delivery = Delivery::from_config(&ctx.config.notify).ok();
    let threaded = delivery.as_ref().is_some_and(Delivery::is_threaded);
    let notification = build(
        report_ctx,
        MessageFormat::from_config(&ctx.config.notify.format),
        threaded,
    );
    NotifyPreview {
        mode: delivery.as_ref().map_or("unconfigured", Delivery::mode),
        main: notification.main,
        threads: notification.threads,
    }
}

/// Sends the notification.
///
/// # Errors
///
/// `NotifyError::NotConfigured` when no target is set, other `NotifyError`
/// variants when delivery fails.
pub async fn send(ctx: &RunContext, report_ctx: &ReportContext) -> Result<NotifyReport, CliError> {
    let client = SlackClient::from_config(&ctx.config.notify)?;
    let mode = client.delivery().mode();
    let notification = build(
        report_ctx,
        MessageFormat::from_config(&ctx.config.notify.format),
        client.delivery().is_threaded(),
    );
    info!(
        mode,
        replies = notification.threads.len(),
        "sending notification"
    );
    let messages_sent = client.send(&notification).await?;
    info!(mode, messages_sent, "notification sent");

    Ok(NotifyReport {
        product: report_ctx.product.clone(),
        version: report_ctx.version.clone(),
        mode,
        messages_sent,
        totals: Totals::from_results(&report_ctx.results),
        net_change: report_ctx.comparison.as_ref().map(|c| c.net_change),
    })
}

/// Messages built by `--dry-run`.
#[derive(Debug, Serialize)]
pub struct NotifyPreview {
    pub mode: &'static str,
    pub main: Message,
    pub threads: Vec<Message>,
}

/// Result of a delivered notification.
#[derive(Debug, Serialize)]
pub struct NotifyReport {
    pub product: String,
    pub version: String,
    pub mode: &'static str,
    pub messages_sent: usize,
    pub totals: Totals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_change: Option<NetChange>,
}

fn write_message(w: &mut dyn Write, message: &Message) -> std::io::Result<()> {
    for block in &message.blocks {
        if let Some(text) = block.text() {
            writeln!(w, "{text}")?;
        }
    }
    Ok(())
}

impl Render for NotifyPreview {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{}",
            format!("Dry run ({} mode), nothing sent", self.mode).yellow()
        )?;
        writeln!(w)?;
        write_message(w, &self.main)?;
        for (idx, reply) in self.threads.iter().enumerate() {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                format!("--- thread reply {} ---", idx + 1).dimmed()
            )?;
            write_message(w, reply)?;
        }
        Ok(())
    }
}

impl Render for NotifyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{}",
            format!(
                "✓ Notification sent for {} {} ({} mode, {} message(s))",
                self.product, self.version, self.mode, self.messages_sent
            )
            .green()
            .bold()
        )?;
        writeln!(
            w,
            "Scanned: {}  Failed: {}  Critical: {}  High: {}",
            self.totals.scanned,
            self.totals.failed,
            self.totals.critical.to_string().red(),
            self.totals.high.to_string().yellow(),
        )?;
        if let Some(net) = self.net_change {
            writeln!(
                w,
                "Change since previous release: critical {:+}, high {:+}, total {:+}",
                net.critical, net.high, net.total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use relscan_core::config::RelscanConfig;

    const MANIFEST: &str = r#"[
        {"image-key": "console", "image-remote": "quay.io/acm", "image-name": "console",
         "image-digest": "sha256:4f1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9"},
        {"image-key": "search", "image-remote": "quay.io/acm", "image-name": "search",
         "image-digest": "sha256:9a8b7c6d5e4f30211203f4e5d6c7b8a90a1b2c3d4e5f60718293a4b5c6d7e8f9"}
    ]"#;

    fn trivy_json(critical: usize, high: usize) -> String {
        let mut vulns = Vec::new();
        for i in 0..critical {
            vulns.push(format!(
                r#"{{"VulnerabilityID": "CVE-2024-{i:04}", "Severity": "CRITICAL", "PkgName": "openssl"}}"#
            ));
        }
        for i in 0..high {
            vulns.push(format!(
                r#"{{"VulnerabilityID": "CVE-2023-{i:04}", "Severity": "HIGH", "PkgName": "zlib"}}"#
            ));
        }
        format!(
            r#"{{"Results": [{{"Vulnerabilities": [{}]}}]}}"#,
            vulns.join(",")
        )
    }

    async fn write(path: &Path, body: &str) {
        tokio::fs::create_dir_all(path.parent().expect("parent"))
            .await
            .expect("mkdir");
        tokio::fs::write(path, body).await.expect("write");
    }

    async fn fixture(dir: &Path) -> RunContext {
        write(&dir.join("extras/2.17.0.json"), MANIFEST).await;
        write(
            &dir.join("reports/2.17.0/json/2.17.0_console_trivy.json"),
            &trivy_json(1, 2),
        )
        .await;

        let mut config = RelscanConfig::default();
        config.paths.manifest_dir = dir.join("extras").display().to_string();
        config.paths.reports_dir = dir.join("reports").display().to_string();
        config.paths.mirror_config = String::new();
        RunContext::load(config)
            .await
            .expect("context")
            .without_progress()
    }

    #[tokio::test]
    async fn test_load_context_marks_missing_artifact_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = fixture(dir.path()).await;

        let report_ctx = load_context(&ctx).await.expect("load");
        assert_eq!(report_ctx.version, "2.17.0");
        assert_eq!(report_ctx.results.len(), 2);
        assert_eq!(report_ctx.results[0].summary().map(|s| s.critical), Some(1));
        assert!(report_ctx.results[1].is_failed());
        assert!(report_ctx.comparison.is_none());
    }

    #[tokio::test]
    async fn test_load_context_compares_with_previous_release() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = fixture(dir.path()).await;
        write(
            &dir.path().join("previous/2.17.0/json/2.17.0_console_trivy.json"),
            &trivy_json(3, 2),
        )
        .await;
        ctx.config.notify.previous_reports_dir = dir.path().join("previous").display().to_string();

        let report_ctx = load_context(&ctx).await.expect("load");
        let comparison = report_ctx.comparison.expect("comparison");
        assert_eq!(comparison.improved.len(), 1);
        assert_eq!(comparison.improved[0].key, "console");
        assert_eq!(comparison.net_change.critical, -2);
    }

    #[tokio::test]
    async fn test_failed_scan_is_not_counted_as_removed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = fixture(dir.path()).await;
        write(
            &dir.path().join("previous/2.17.0/json/2.17.0_console_trivy.json"),
            &trivy_json(1, 2),
        )
        .await;
        write(
            &dir.path().join("previous/2.17.0/json/2.17.0_search_trivy.json"),
            &trivy_json(4, 0),
        )
        .await;
        ctx.config.notify.previous_reports_dir = dir.path().join("previous").display().to_string();

        let report_ctx = load_context(&ctx).await.expect("load");
        let comparison = report_ctx.comparison.expect("comparison");
        assert!(comparison.removed_components.is_empty());
        assert_eq!(comparison.failed_components, vec!["search"]);
        assert_eq!(comparison.unchanged, vec!["console"]);
        assert_eq!(comparison.net_change, NetChange::default());
    }

    #[tokio::test]
    async fn test_table_artifact_skips_trend() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut ctx = fixture(dir.path()).await;
        write(
            &dir.path().join("reports/2.17.0/text/2.17.0_search_trivy.txt"),
            "CVE-2024-0001 HIGH\n",
        )
        .await;
        write(
            &dir.path().join("previous/2.17.0/json/2.17.0_search_trivy.json"),
            &trivy_json(0, 1),
        )
        .await;
        ctx.config.notify.previous_reports_dir = dir.path().join("previous").display().to_string();

        let report_ctx = load_context(&ctx).await.expect("load");
        assert!(!report_ctx.results[1].is_failed());
        assert!(report_ctx.comparison.is_none());
    }

    #[tokio::test]
    async fn test_preview_without_target_uses_single_message() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = fixture(dir.path()).await;
        let report_ctx = load_context(&ctx).await.expect("load");

        let preview = preview(&ctx, &report_ctx);
        assert_eq!(preview.mode, "unconfigured");
        assert!(preview.threads.is_empty());
        assert!(!preview.main.blocks.is_empty());
    }

    #[tokio::test]
    async fn test_send_without_target_is_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = fixture(dir.path()).await;
        let report_ctx = load_context(&ctx).await.expect("load");

        let err = send(&ctx, &report_ctx).await.expect_err("not configured");
        assert_eq!(err.exit_code(), 2);
    }
}
