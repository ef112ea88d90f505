//! `relscan list` command handler

use std::io::Write;

use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use relscan_core::{DigestClass, Manifest};

use crate::cli::ListArgs;
use crate::context::RunContext;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, column_width, pad};

/// Execute the `list` command.
pub async fn execute(
    args: ListArgs,
    ctx: &RunContext,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_report(ctx, args.full_digest).await;
    writer.render(&report)
}

/// Loads every manifest and builds the listing.
///
/// A manifest that cannot be read is listed with its error and no images.
pub async fn build_report(ctx: &RunContext, full_digest: bool) -> ListReport {
    let mut manifests = Vec::with_capacity(ctx.manifest_files().len());
    for path in ctx.manifest_files() {
        let listing = match Manifest::load(path).await {
            Ok(manifest) => ManifestListing::from_manifest(&manifest, full_digest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable manifest");
                ManifestListing::unreadable(path.display().to_string(), e.to_string())
            }
        };
        manifests.push(listing);
    }
    ListReport { manifests }
}

/// Listing of all manifests.
#[derive(Debug, Serialize)]
pub struct ListReport {
    pub manifests: Vec<ManifestListing>,
}

/// Listing of one manifest file.
#[derive(Debug, Serialize)]
pub struct ManifestListing {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub images: Vec<ListedImage>,
    pub totals: ListTotals,
}

/// One declared image.
#[derive(Debug, Serialize)]
pub struct ListedImage {
    pub key: String,
    pub digest: String,
    pub status: DigestClass,
    pub git: bool,
}

/// Per-manifest counts.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListTotals {
    pub total: usize,
    pub real: usize,
    pub placeholders: usize,
    pub malformed: usize,
    pub with_git: usize,
}

impl ManifestListing {
    fn from_manifest(manifest: &Manifest, full_digest: bool) -> Self {
        let mut totals = ListTotals::default();
        let images = manifest
            .images
            .iter()
            .map(|image| {
                let status = image.digest_class();
                totals.total += 1;
                match status {
                    DigestClass::Valid => totals.real += 1,
                    DigestClass::Placeholder => totals.placeholders += 1,
                    DigestClass::Malformed => totals.malformed += 1,
                }
                if image.has_git_info() {
                    totals.with_git += 1;
                }
                ListedImage {
                    key: image.key.clone(),
                    digest: image.display_digest(full_digest).to_owned(),
                    status,
                    git: image.has_git_info(),
                }
            })
            .collect();
        Self {
            file: manifest.path.display().to_string(),
            error: None,
            images,
            totals,
        }
    }

    fn unreadable(file: String, error: String) -> Self {
        Self {
            file,
            error: Some(error),
            images: Vec::new(),
            totals: ListTotals::default(),
        }
    }
}

fn colored_indicator(status: DigestClass) -> colored::ColoredString {
    match status {
        DigestClass::Valid => status.indicator().green(),
        DigestClass::Placeholder => status.indicator().yellow(),
        DigestClass::Malformed => status.indicator().red(),
    }
}

impl Render for ListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for listing in &self.manifests {
            writeln!(w, "{}", format!("Images in {}", listing.file).bold())?;

            if let Some(ref error) = listing.error {
                writeln!(w, "  Error: {}", error.red())?;
                writeln!(w)?;
                continue;
            }

            let key_width = column_width(listing.images.iter().map(|i| i.key.as_str()), 9);
            let digest_width = column_width(listing.images.iter().map(|i| i.digest.as_str()), 6);
            writeln!(
                w,
                "  {}  {}  {}  G",
                " ",
                pad("Image Key", key_width).cyan().bold(),
                pad("Digest", digest_width).bold(),
            )?;
            for image in &listing.images {
                writeln!(
                    w,
                    "  {}  {}  {}  {}",
                    colored_indicator(image.status),
                    pad(&image.key, key_width).cyan(),
                    pad(&image.digest, digest_width).dimmed(),
                    if image.git { "✓".green() } else { "-".normal() },
                )?;
            }

            let t = &listing.totals;
            writeln!(w)?;
            writeln!(
                w,
                "Total: {} images | {} Real SHAs | {} Placeholders | {} Malformed | {} With Git Info",
                t.total.to_string().bold(),
                t.real.to_string().green(),
                t.placeholders.to_string().yellow(),
                t.malformed.to_string().red(),
                t.with_git.to_string().blue(),
            )?;
            writeln!(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relscan_core::ImageRecord;

    const VALID: &str = "sha256:4f1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9";
    const ZEROS: &str = "sha256:0000000000000000000000000000000000000000000000000000000000000000";

    fn manifest() -> Manifest {
        Manifest {
            version: "2.17.0".to_owned(),
            path: "extras/2.17.0.json".into(),
            images: vec![
                ImageRecord::new("console")
                    .with_image("quay.io/acm", "console", ZEROS)
                    .with_git("https://github.com/acm/console", "abc123"),
                ImageRecord::new("search").with_image("quay.io/acm", "search", VALID),
                ImageRecord::new("broken").with_image("quay.io/acm", "broken", "not-a-digest"),
            ],
        }
    }

    #[test]
    fn test_listing_classifies_and_counts() {
        let listing = ManifestListing::from_manifest(&manifest(), false);
        assert_eq!(listing.images[0].status, DigestClass::Placeholder);
        assert!(listing.images[0].git);
        assert_eq!(listing.images[1].status, DigestClass::Valid);
        assert_eq!(listing.images[1].digest, "4f1b2c3d4e5f");
        assert_eq!(listing.images[2].status, DigestClass::Malformed);
        assert_eq!(
            listing.totals,
            ListTotals {
                total: 3,
                real: 1,
                placeholders: 1,
                malformed: 1,
                with_git: 1,
            }
        );
    }

    #[test]
    fn test_listing_full_digest() {
        let listing = ManifestListing::from_manifest(&manifest(), true);
        assert_eq!(listing.images[1].digest, VALID);
    }

    #[test]
    fn test_render_text_marks_placeholder_and_valid() {
        colored::control::set_override(false);
        let report = ListReport {
            manifests: vec![ManifestListing::from_manifest(&manifest(), false)],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");

        let console_line = output
            .lines()
            .find(|l| l.contains("console"))
            .expect("console row");
        assert!(console_line.contains('⚠'));
        assert!(console_line.trim_end().ends_with('✓'));

        let search_line = output
            .lines()
            .find(|l| l.contains("search"))
            .expect("search row");
        assert!(search_line.trim_start().starts_with('✓'));
        assert!(search_line.trim_end().ends_with('-'));

        assert!(output.contains(
            "Total: 3 images | 1 Real SHAs | 1 Placeholders | 1 Malformed | 1 With Git Info"
        ));
    }

    #[test]
    fn test_unreadable_manifest_renders_error() {
        colored::control::set_override(false);
        let report = ListReport {
            manifests: vec![ManifestListing::unreadable(
                "extras/bad.json".to_owned(),
                "failed to parse".to_owned(),
            )],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf8");
        assert!(output.contains("Error: failed to parse"));

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["manifests"][0]["error"], "failed to parse");
    }
}
