//! 리포트 디렉토리 구조
//!
//! ```text
//! {reports_dir}/
//! ├── {version}_comprehensive_report.txt
//! └── {version}/
//!     ├── {version}_cve_summary.txt
//!     ├── {version}_verify_report.txt
//!     ├── json/{version}_{key}_trivy.json
//!     └── text/{version}_{key}_trivy.txt
//! ```
//!
//! 이전 릴리스 리포트는 `{version}/json`, `{version}`, 디렉토리 루트 순서로 찾습니다.
//! 오래된 평면 구조(`{reports_dir}/{version}_{key}_trivy.json`)도 읽을 수 있습니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use relscan_core::Manifest;
use tracing::{debug, warn};

use crate::compare::SummaryMap;
use crate::error::VulnReportError;
use crate::parser;
use crate::summary::{ArtifactFormat, ImageResult};

/// 아티팩트 파일 이름 접미사
const ARTIFACT_SUFFIX: &str = "_trivy";

/// 릴리스 버전 하나의 리포트 경로 규칙
#[derive(Debug, Clone)]
pub struct ReportLayout {
    reports_dir: PathBuf,
    version: String,
}

impl ReportLayout {
    /// 새 레이아웃을 생성합니다.
    pub fn new(reports_dir: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
            version: version.into(),
        }
    }

    /// 리포트 루트 디렉토리
    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// 릴리스 버전
    pub fn version(&self) -> &str {
        &self.version
    }

    /// `{reports_dir}/{version}`
    pub fn version_dir(&self) -> PathBuf {
        self.reports_dir.join(&self.version)
    }

    /// 아티팩트 파일 이름: `{version}_{key}_trivy.{ext}`
    pub fn artifact_file_name(&self, key: &str, format: ArtifactFormat) -> String {
        format!(
            "{}_{key}{ARTIFACT_SUFFIX}.{}",
            self.version,
            format.extension()
        )
    }

    /// 새로 쓰는 아티팩트 경로
    pub fn artifact_path(&self, key: &str, format: ArtifactFormat) -> PathBuf {
        self.version_dir()
            .join(format.subdir())
            .join(self.artifact_file_name(key, format))
    }

    /// CVE 스캔 요약 파일 경로
    pub fn summary_path(&self) -> PathBuf {
        self.version_dir()
            .join(format!("{}_cve_summary.txt", self.version))
    }

    /// pull 가능 여부 검증 리포트 경로
    pub fn verify_report_path(&self) -> PathBuf {
        self.version_dir()
            .join(format!("{}_verify_report.txt", self.version))
    }

    /// 종합 이미지 리포트 경로
    pub fn comprehensive_report_path(&self) -> PathBuf {
        self.reports_dir
            .join(format!("{}_comprehensive_report.txt", self.version))
    }

    /// 아티팩트 디렉토리(json, text)를 생성합니다.
    pub async fn prepare(&self) -> Result<(), VulnReportError> {
        for format in [ArtifactFormat::Json, ArtifactFormat::Table] {
            let dir = self.version_dir().join(format.subdir());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| VulnReportError::Io {
                    path: dir.display().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// 이미지의 기존 아티팩트를 찾습니다. JSON을 table보다 우선합니다.
    pub async fn find_artifact(&self, key: &str) -> Option<PathBuf> {
        let version_dir = self.version_dir();
        let base = if is_dir(&version_dir).await {
            version_dir
        } else {
            self.reports_dir.clone()
        };

        for format in [ArtifactFormat::Json, ArtifactFormat::Table] {
            let name = self.artifact_file_name(key, format);
            for candidate in [base.join(format.subdir()).join(&name), base.join(&name)] {
                if is_file(&candidate).await {
                    return Some(candidate);
                }
            }
        }
        None
    }

    /// 매니페스트의 각 이미지에 대해 기존 아티팩트를 파싱합니다.
    ///
    /// 아티팩트가 없거나 파싱에 실패한 이미지는 실패 결과가 됩니다.
    pub async fn load_current_results(&self, manifest: &Manifest) -> Vec<ImageResult> {
        let mut results = Vec::with_capacity(manifest.len());
        for image in &manifest.images {
            let result = match self.find_artifact(&image.key).await {
                Some(path) => match parser::parse_file(&path).await {
                    Ok(summary) => ImageResult::scanned(&image.key, summary),
                    Err(failure) => {
                        warn!(
                            image_key = %image.key,
                            path = %path.display(),
                            %failure,
                            "scan artifact unparseable"
                        );
                        ImageResult::failed(&image.key, failure.to_string())
                    }
                },
                None => {
                    debug!(image_key = %image.key, "no scan artifact");
                    ImageResult::failed(&image.key, "no scan artifact found")
                }
            };
            results.push(result);
        }
        results
    }
}

/// 성공한 결과만 키 → 요약 맵으로 모읍니다.
pub fn summary_map(results: &[ImageResult]) -> SummaryMap {
    results
        .iter()
        .filter_map(|r| r.summary().map(|s| (r.key.clone(), s.clone())))
        .collect()
}

/// 이전 릴리스의 JSON 아티팩트를 로드합니다.
///
/// 디렉토리가 없거나 파싱 가능한 아티팩트가 하나도 없으면 `None`입니다.
/// 파싱에 실패한 파일은 경고 후 건너뜁니다.
pub async fn load_previous_results(
    previous_dir: impl AsRef<Path>,
    version: &str,
) -> Result<Option<SummaryMap>, VulnReportError> {
    let previous_dir = previous_dir.as_ref();
    if !is_dir(previous_dir).await {
        debug!(path = %previous_dir.display(), "previous reports directory missing");
        return Ok(None);
    }

    let search_dir = {
        let organized = previous_dir.join(version).join(ArtifactFormat::Json.subdir());
        let versioned = previous_dir.join(version);
        if is_dir(&organized).await {
            organized
        } else if is_dir(&versioned).await {
            versioned
        } else {
            previous_dir.to_path_buf()
        }
    };

    let prefix = format!("{version}_");
    let suffix = format!("{ARTIFACT_SUFFIX}.json");

    let mut entries = tokio::fs::read_dir(&search_dir)
        .await
        .map_err(|source| VulnReportError::Io {
            path: search_dir.display().to_string(),
            source,
        })?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| VulnReportError::Io {
            path: search_dir.display().to_string(),
            source,
        })?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = name
            .strip_prefix(prefix.as_str())
            .and_then(|rest| rest.strip_suffix(suffix.as_str()));
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            candidates.push((key.to_owned(), entry.path()));
        }
    }
    candidates.sort();

    let mut previous = BTreeMap::new();
    for (key, path) in candidates {
        match parser::parse_file(&path).await {
            Ok(summary) => {
                previous.insert(key, summary);
            }
            Err(failure) => {
                warn!(
                    image_key = %key,
                    path = %path.display(),
                    %failure,
                    "skipping previous artifact"
                );
            }
        }
    }

    debug!(
        path = %search_dir.display(),
        components = previous.len(),
        "previous scan results loaded"
    );
    Ok(if previous.is_empty() {
        None
    } else {
        Some(previous)
    })
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON_ONE_CRITICAL: &str = r#"{"Results":[{"Vulnerabilities":[
        {"VulnerabilityID":"CVE-2024-1","Severity":"CRITICAL","FixedVersion":"1.2"}
    ]}]}"#;

    async fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.expect("mkdir");
        }
        tokio::fs::write(path, content).await.expect("write");
    }

    #[test]
    fn artifact_paths_follow_layout() {
        let layout = ReportLayout::new("reports", "2.17.0");
        assert_eq!(
            layout.artifact_path("console", ArtifactFormat::Json),
            PathBuf::from("reports/2.17.0/json/2.17.0_console_trivy.json")
        );
        assert_eq!(
            layout.artifact_path("console", ArtifactFormat::Table),
            PathBuf::from("reports/2.17.0/text/2.17.0_console_trivy.txt")
        );
        assert_eq!(
            layout.summary_path(),
            PathBuf::from("reports/2.17.0/2.17.0_cve_summary.txt")
        );
        assert_eq!(
            layout.verify_report_path(),
            PathBuf::from("reports/2.17.0/2.17.0_verify_report.txt")
        );
        assert_eq!(
            layout.comprehensive_report_path(),
            PathBuf::from("reports/2.17.0_comprehensive_report.txt")
        );
    }

    #[tokio::test]
    async fn find_artifact_prefers_json_over_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ReportLayout::new(dir.path(), "2.17.0");
        write(&layout.artifact_path("console", ArtifactFormat::Table), "").await;
        write(&layout.artifact_path("console", ArtifactFormat::Json), "{}").await;

        let found = layout.find_artifact("console").await.expect("artifact");
        assert_eq!(found, layout.artifact_path("console", ArtifactFormat::Json));
    }

    #[tokio::test]
    async fn find_artifact_in_flat_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ReportLayout::new(dir.path(), "2.17.0");
        let flat = dir.path().join("2.17.0_console_trivy.txt");
        write(&flat, "CVE-1\n").await;

        assert_eq!(layout.find_artifact("console").await, Some(flat));
        assert_eq!(layout.find_artifact("other").await, None);
    }

    #[tokio::test]
    async fn load_current_results_marks_missing_and_broken_as_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ReportLayout::new(dir.path(), "2.17.0");
        write(
            &layout.artifact_path("good", ArtifactFormat::Json),
            JSON_ONE_CRITICAL,
        )
        .await;
        write(
            &layout.artifact_path("broken", ArtifactFormat::Json),
            "Failed to pull image: denied",
        )
        .await;

        let manifest = Manifest::from_slice(
            "extras/2.17.0.json",
            br#"[{"image-key":"good"},{"image-key":"broken"},{"image-key":"missing"}]"#,
        )
        .expect("manifest");

        let results = layout.load_current_results(&manifest).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].summary().map(|s| s.critical), Some(1));
        assert!(results[1].is_failed());
        assert!(results[2].is_failed());

        let map = summary_map(&results);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("good"));
    }

    #[tokio::test]
    async fn previous_results_from_organized_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_dir = dir.path().join("2.17.0").join("json");
        write(
            &json_dir.join("2.17.0_console_trivy.json"),
            JSON_ONE_CRITICAL,
        )
        .await;
        write(&json_dir.join("2.17.0_search_api_trivy.json"), "{}").await;
        write(&json_dir.join("2.17.0_broken_trivy.json"), "nope").await;
        write(
            &json_dir.join("2.16.0_console_trivy.json"),
            JSON_ONE_CRITICAL,
        )
        .await;

        let previous = load_previous_results(dir.path(), "2.17.0")
            .await
            .expect("load")
            .expect("results present");
        assert_eq!(previous.len(), 2);
        assert_eq!(previous["console"].critical, 1);
        assert_eq!(previous["search_api"].total, 0);
    }

    #[tokio::test]
    async fn previous_results_from_flat_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(
            &dir.path().join("2.17.0_console_trivy.json"),
            JSON_ONE_CRITICAL,
        )
        .await;

        let previous = load_previous_results(dir.path(), "2.17.0")
            .await
            .expect("load")
            .expect("results present");
        assert!(previous.contains_key("console"));
    }

    #[tokio::test]
    async fn previous_results_missing_dir_is_none() {
        let previous = load_previous_results("/nonexistent/previous", "2.17.0")
            .await
            .expect("missing dir is not an error");
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn previous_results_without_matches_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir.path().join("unrelated.json"), "{}").await;
        let previous = load_previous_results(dir.path(), "2.17.0")
            .await
            .expect("load");
        assert!(previous.is_none());
    }

    #[tokio::test]
    async fn prepare_creates_artifact_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = ReportLayout::new(dir.path(), "2.17.0");
        layout.prepare().await.expect("prepare");
        assert!(dir.path().join("2.17.0/json").is_dir());
        assert!(dir.path().join("2.17.0/text").is_dir());
    }
}
