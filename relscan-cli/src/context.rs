//! Run context shared by the manifest-driven commands
//!
//! Holds the effective configuration, the discovered manifest set and the
//! optional mirror rules for one invocation. Commands receive it by
//! reference instead of reading process-wide state.

use std::path::{Path, PathBuf};

use relscan_core::config::RelscanConfig;
use relscan_core::mirror::{self, MirrorRules, Redirect};
use relscan_core::{Manifest, ManifestSet};
use relscan_vuln_report::ReportLayout;
use tracing::{debug, warn};

use crate::error::CliError;

/// Everything a command needs about the current run.
#[derive(Debug)]
pub struct RunContext {
    /// Effective configuration (file + env + CLI overrides)
    pub config: RelscanConfig,
    /// Sorted manifest files
    pub manifests: ManifestSet,
    /// Registry mirror rules, if a valid mirror config exists
    pub mirrors: Option<MirrorRules>,
    /// Show a progress bar (false in tests)
    pub show_progress: bool,
}

impl RunContext {
    /// Discovers manifests and loads mirror rules.
    ///
    /// # Errors
    ///
    /// A missing manifest directory or an empty one is a configuration
    /// error. An unreadable mirror config only produces a warning.
    pub async fn load(config: RelscanConfig) -> Result<Self, CliError> {
        let manifests = ManifestSet::discover(&config.paths.manifest_dir).await?;
        debug!(
            dir = %manifests.dir().display(),
            files = manifests.len(),
            "manifests discovered"
        );
        let mirrors = load_mirrors(&config.paths.mirror_config).await;
        Ok(Self {
            config,
            manifests,
            mirrors,
            show_progress: true,
        })
    }

    /// Disables the progress bar.
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Manifest files in processing order.
    pub fn manifest_files(&self) -> &[PathBuf] {
        self.manifests.files()
    }

    /// Release version used for report paths of `manifest`.
    pub fn version_of<'a>(&'a self, manifest: &'a Manifest) -> &'a str {
        self.config
            .paths
            .version_override()
            .unwrap_or(&manifest.version)
    }

    /// Report layout for `manifest`.
    pub fn layout(&self, manifest: &Manifest) -> ReportLayout {
        ReportLayout::new(&self.config.paths.reports_dir, self.version_of(manifest))
    }

    /// Applies the mirror rules to an image reference.
    pub fn redirect(&self, reference: &str) -> Redirect {
        mirror::redirect(self.mirrors.as_ref(), reference)
    }

    /// Number of mirror rules in effect.
    pub fn mirror_count(&self) -> usize {
        self.mirrors.as_ref().map_or(0, MirrorRules::len)
    }

    /// `source → mirror` lines for the run header.
    pub fn mirror_lines(&self) -> Vec<String> {
        self.mirrors
            .iter()
            .flat_map(|m| m.rules())
            .map(|rule| format!("{} → {}", rule.source, rule.mirror_prefix))
            .collect()
    }
}

async fn load_mirrors(path: &str) -> Option<MirrorRules> {
    if path.is_empty() {
        return None;
    }
    match MirrorRules::load(Path::new(path)).await {
        Ok(Some(rules)) if !rules.is_empty() => Some(rules),
        Ok(_) => None,
        Err(e) => {
            warn!(path, error = %e, "ignoring mirror config");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(dir: &Path) -> RelscanConfig {
        let mut config = RelscanConfig::default();
        config.paths.manifest_dir = dir.join("extras").display().to_string();
        config.paths.reports_dir = dir.join("reports").display().to_string();
        config.paths.mirror_config = dir.join("icsp-config.json").display().to_string();
        config
    }

    #[tokio::test]
    async fn test_missing_manifest_dir_is_config_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = RunContext::load(config_for(tmp.path()))
            .await
            .expect_err("missing dir should fail");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_invalid_mirror_config_is_ignored() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(tmp.path().join("extras")).expect("mkdir");
        std::fs::write(tmp.path().join("extras/2.17.0.json"), "[]").expect("write manifest");
        std::fs::write(tmp.path().join("icsp-config.json"), "{not json").expect("write mirror");

        let ctx = RunContext::load(config_for(tmp.path()))
            .await
            .expect("context");
        assert!(ctx.mirrors.is_none());
        assert_eq!(ctx.mirror_count(), 0);
        assert_eq!(ctx.manifest_files().len(), 1);
    }

    #[tokio::test]
    async fn test_mirror_rules_and_version_override() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(tmp.path().join("extras")).expect("mkdir");
        std::fs::write(tmp.path().join("extras/2.17.0.json"), "[]").expect("write manifest");
        std::fs::write(
            tmp.path().join("icsp-config.json"),
            r#"{"mirrors":[{"source":"quay.io/acm","mirror":"mirror.local/acm"}]}"#,
        )
        .expect("write mirror");

        let mut config = config_for(tmp.path());
        config.paths.version = "2.17.1".to_owned();
        let ctx = RunContext::load(config).await.expect("context");

        assert_eq!(ctx.mirror_count(), 1);
        assert_eq!(ctx.mirror_lines(), vec!["quay.io/acm → mirror.local/acm"]);
        let redirect = ctx.redirect("quay.io/acm/console@sha256:abc");
        assert_eq!(redirect.reference, "mirror.local/acm/console@sha256:abc");

        let manifest = Manifest::from_slice(tmp.path().join("extras/2.17.0.json"), b"[]")
            .expect("manifest");
        assert_eq!(ctx.version_of(&manifest), "2.17.1");
    }
}
