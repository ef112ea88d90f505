//! 공통 도메인 타입
//!
//! 여러 크레이트가 공유하는 작은 값 타입을 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 취약점 심각도
///
/// 스캐너가 보고하는 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Unknown < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 명명된 버킷에 속하지 않는 심각도 (total에만 집계)
    #[default]
    Unknown,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 스캐너 출력의 심각도 문자열을 분류합니다.
    ///
    /// 대문자 리터럴과 대소문자 구분 없이 비교하며,
    /// `CRITICAL`/`HIGH`/`MEDIUM`/`LOW` 외의 값은 모두 [`Severity::Unknown`]입니다.
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Self::Critical,
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Unknown,
        }
    }

    /// 추세 판단에 쓰이는 심각도인지 (critical + high)
    pub fn is_weighted(self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "UNKNOWN"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
