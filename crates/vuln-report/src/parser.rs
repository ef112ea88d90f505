//! 스캔 결과 파서: 스캐너 아티팩트를 [`VulnerabilitySummary`]로 정규화
//!
//! # 지원 형식
//!
//! - JSON: `Results[].Vulnerabilities[]`를 순회하며 심각도별로 집계
//! - table 텍스트: `CVE-`를 포함하는 줄 수만 `total`로 집계 (심각도 분류 불가)
//!
//! 파싱 실패는 [`ParseFailure`] 값으로 반환하며, 호출자는 해당 이미지를
//! "스캔 실패"로 취급해야 합니다.

use std::fmt;
use std::path::Path;

use relscan_core::Severity;
use serde::Deserialize;

use crate::summary::{ArtifactFormat, CveDetail, VulnerabilitySummary};

/// 상세 목록에 남기는 High 항목 최대 수
pub const MAX_HIGH_DETAILS: usize = 10;

/// 상세 항목 제목 최대 길이 (문자 수)
pub const MAX_TITLE_CHARS: usize = 80;

/// table 아티팩트에서 취약점 줄을 식별하는 문자열
const CVE_MARKER: &str = "CVE-";

/// 아티팩트 파싱 실패
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// 실패 사유
    pub reason: String,
}

impl ParseFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparseable scan artifact: {}", self.reason)
    }
}

impl std::error::Error for ParseFailure {}

#[derive(Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Option<Vec<TrivyResult>>,
}

#[derive(Deserialize)]
struct TrivyResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID", default)]
    id: Option<String>,
    #[serde(rename = "Severity", default)]
    severity: Option<String>,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "FixedVersion", default)]
    fixed_version: Option<String>,
    #[serde(rename = "PkgName", default)]
    package_name: Option<String>,
}

/// 형식에 맞는 파서로 아티팩트를 파싱합니다.
pub fn parse(format: ArtifactFormat, raw: &[u8]) -> Result<VulnerabilitySummary, ParseFailure> {
    match format {
        ArtifactFormat::Json => parse_json(raw),
        ArtifactFormat::Table => parse_table(raw),
    }
}

/// JSON 아티팩트를 파싱합니다.
///
/// 상세 목록은 Critical 전부, 그 다음 처음 10개의 High 순서이며
/// 각 심각도 안에서는 스캔 순서를 유지합니다.
pub fn parse_json(raw: &[u8]) -> Result<VulnerabilitySummary, ParseFailure> {
    let report: TrivyReport =
        serde_json::from_slice(raw).map_err(|e| ParseFailure::new(e.to_string()))?;

    let mut summary = VulnerabilitySummary::empty(ArtifactFormat::Json);
    let mut critical_details = Vec::new();
    let mut high_details = Vec::new();

    let vulnerabilities = report
        .results
        .unwrap_or_default()
        .into_iter()
        .flat_map(|r| r.vulnerabilities.unwrap_or_default());

    for vuln in vulnerabilities {
        summary.total += 1;

        let fixed_version = vuln.fixed_version.unwrap_or_default();
        if fixed_version.is_empty() {
            summary.no_fix += 1;
        } else {
            summary.has_fix += 1;
        }

        let severity = Severity::classify(vuln.severity.as_deref().unwrap_or_default());
        match severity {
            Severity::Critical => summary.critical += 1,
            Severity::High => summary.high += 1,
            Severity::Medium => summary.medium += 1,
            Severity::Low => summary.low += 1,
            Severity::Unknown => {}
        }

        if severity.is_weighted() {
            let detail = CveDetail {
                id: vuln.id.unwrap_or_default(),
                severity,
                title: truncate_chars(&vuln.title.unwrap_or_default(), MAX_TITLE_CHARS),
                fixed_version,
                package_name: vuln.package_name.unwrap_or_default(),
            };
            if severity == Severity::Critical {
                critical_details.push(detail);
            } else if high_details.len() < MAX_HIGH_DETAILS {
                high_details.push(detail);
            }
        }
    }

    critical_details.extend(high_details);
    summary.details = critical_details;
    Ok(summary)
}

/// table 텍스트 아티팩트를 파싱합니다.
///
/// `CVE-`를 포함하는 줄 수가 `total`이 되고 나머지 버킷은 0입니다.
pub fn parse_table(raw: &[u8]) -> Result<VulnerabilitySummary, ParseFailure> {
    let text = std::str::from_utf8(raw).map_err(|e| ParseFailure::new(e.to_string()))?;
    let mut summary = VulnerabilitySummary::empty(ArtifactFormat::Table);
    summary.total = text.lines().filter(|line| line.contains(CVE_MARKER)).count() as u64;
    Ok(summary)
}

/// 파일 확장자로 형식을 판별하여 아티팩트 파일을 파싱합니다.
///
/// `.json`이면 JSON, 그 외에는 table로 취급합니다.
pub async fn parse_file(path: impl AsRef<Path>) -> Result<VulnerabilitySummary, ParseFailure> {
    let path = path.as_ref();
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| ParseFailure::new(format!("{}: {e}", path.display())))?;
    parse(format_of(path), &raw)
}

/// 파일 경로로 아티팩트 형식을 판별합니다.
pub fn format_of(path: &Path) -> ArtifactFormat {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        ArtifactFormat::Json
    } else {
        ArtifactFormat::Table
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
