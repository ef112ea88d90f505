//! 이미지별 취약점 요약 타입

use std::fmt;

use relscan_core::Severity;
use serde::Serialize;

/// 요약을 만든 아티팩트 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// 구조화된 JSON (심각도 분류 가능)
    Json,
    /// 사람이 읽는 table 텍스트 (`CVE-` 줄 수만 복원 가능)
    Table,
}

impl ArtifactFormat {
    /// 아티팩트 파일 확장자
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Table => "txt",
        }
    }

    /// 리포트 하위 디렉토리 이름
    pub fn subdir(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Table => "text",
        }
    }

    /// 스캐너 `--format` 인자
    pub fn scanner_arg(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Table => "table",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scanner_arg())
    }
}

/// 상세 목록에 남기는 CVE 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CveDetail {
    /// 취약점 ID (예: CVE-2024-1234)
    pub id: String,
    /// 심각도 (Critical 또는 High)
    pub severity: Severity,
    /// 제목 (80자 이내로 잘림)
    pub title: String,
    /// 수정된 버전 (없으면 빈 문자열)
    pub fixed_version: String,
    /// 패키지 이름
    pub package_name: String,
}

impl CveDetail {
    /// 수정 버전이 있는지
    pub fn has_fix(&self) -> bool {
        !self.fixed_version.is_empty()
    }
}

/// 이미지 하나의 취약점 요약
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VulnerabilitySummary {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    /// 전체 취약점 수 (명명된 버킷 밖의 심각도 포함)
    pub total: u64,
    /// 수정 버전이 있는 취약점 수
    pub has_fix: u64,
    /// 수정 버전이 없는 취약점 수
    pub no_fix: u64,
    /// 모든 Critical + 처음 10개의 High
    pub details: Vec<CveDetail>,
    /// 원본 아티팩트 형식
    pub format: ArtifactFormat,
}

impl VulnerabilitySummary {
    /// 빈 요약
    pub fn empty(format: ArtifactFormat) -> Self {
        Self {
            critical: 0,
            high: 0,
            medium: 0,
            low: 0,
            total: 0,
            has_fix: 0,
            no_fix: 0,
            details: Vec::new(),
            format,
        }
    }

    /// 추세 신호: critical + high
    pub fn severity_weight(&self) -> u64 {
        self.critical + self.high
    }

    /// 심각도 분류가 가능한 요약인지
    pub fn has_breakdown(&self) -> bool {
        self.format == ArtifactFormat::Json
    }
}

/// 이미지 하나의 스캔 결과
///
/// "취약점 0개"와 "스캔 실패"를 구분합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// 스캔 성공 (취약점 0개일 수 있음)
    Scanned {
        /// 정규화된 요약
        summary: VulnerabilitySummary,
    },
    /// 스캔 또는 아티팩트 파싱 실패
    Failed {
        /// 실패 사유
        reason: String,
    },
}

/// 이미지 키와 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageResult {
    /// 이미지 키
    pub key: String,
    /// 결과
    #[serde(flatten)]
    pub outcome: ScanOutcome,
}

impl ImageResult {
    /// 성공 결과
    pub fn scanned(key: impl Into<String>, summary: VulnerabilitySummary) -> Self {
        Self {
            key: key.into(),
            outcome: ScanOutcome::Scanned { summary },
        }
    }

    /// 실패 결과
    pub fn failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            outcome: ScanOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    /// 성공한 경우 요약
    pub fn summary(&self) -> Option<&VulnerabilitySummary> {
        match &self.outcome {
            ScanOutcome::Scanned { summary } => Some(summary),
            ScanOutcome::Failed { .. } => None,
        }
    }

    /// 실패했는지
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ScanOutcome::Failed { .. })
    }
}

/// 결과 목록 전체의 집계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub scanned: usize,
    pub failed: usize,
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub total: u64,
    pub has_fix: u64,
    pub no_fix: u64,
}

impl Totals {
    /// 결과 목록을 집계합니다. 실패한 이미지는 `failed`에만 반영됩니다.
    pub fn from_results(results: &[ImageResult]) -> Self {
        let mut totals = Self::default();
        for result in results {
            match result.summary() {
                Some(s) => {
                    totals.scanned += 1;
                    totals.critical += s.critical;
                    totals.high += s.high;
                    totals.medium += s.medium;
                    totals.low += s.low;
                    totals.total += s.total;
                    totals.has_fix += s.has_fix;
                    totals.no_fix += s.no_fix;
                }
                None => totals.failed += 1,
            }
        }
        totals
    }
}
