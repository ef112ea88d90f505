//! 다이제스트 분류기
//!
//! 매니페스트에 선언된 이미지 다이제스트를 [`DigestClass`]로 분류합니다.
//! 가짜처럼 보이는 다이제스트 검사가 형식 검사보다 우선합니다.
//! 형식도 틀리고 가짜처럼 보이는 문자열은 `Placeholder`입니다.

use std::fmt;

use serde::Serialize;

/// `sha256:` 접두사
pub const SHA256_PREFIX: &str = "sha256:";

/// sha256 16진수 페이로드 길이
pub const SHA256_HEX_LEN: usize = 64;

/// 다이제스트 문자열에 포함되면 가짜로 보는 토큰 (소문자 비교)
const SUSPICIOUS_TOKENS: [&str; 5] = ["1234", "test", "dummy", "fake", "placeholder"];

/// 다이제스트 분류 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DigestClass {
    /// `sha256:` + 64자리 소문자 16진수, 의심 패턴 없음
    Valid,
    /// 형식은 그럴듯하지만 임시 값으로 보이는 다이제스트
    Placeholder,
    /// 비어 있거나 형식이 맞지 않는 다이제스트
    Malformed,
}

impl DigestClass {
    /// 상태 표시 기호 (✓ / ⚠ / ✗)
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Valid => "✓",
            Self::Placeholder => "⚠",
            Self::Malformed => "✗",
        }
    }

    /// 감사 리포트의 이슈 라벨. `Valid`는 이슈가 아닙니다.
    pub fn issue_label(self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::Placeholder => Some("DUMMY/PLACEHOLDER"),
            Self::Malformed => Some("INVALID FORMAT"),
        }
    }
}

impl fmt::Display for DigestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}

/// 다이제스트를 분류합니다. 모든 입력에 대해 정의된 순수 함수입니다.
pub fn classify(digest: &str) -> DigestClass {
    if digest.is_empty() {
        return DigestClass::Malformed;
    }
    if looks_placeholder(digest) {
        return DigestClass::Placeholder;
    }
    if is_well_formed(digest) {
        DigestClass::Valid
    } else {
        DigestClass::Malformed
    }
}

/// `sha256:` + 정확히 64자리 `[0-9a-f]`인지 검사합니다.
pub fn is_well_formed(digest: &str) -> bool {
    digest.strip_prefix(SHA256_PREFIX).is_some_and(|payload| {
        payload.len() == SHA256_HEX_LEN
            && payload
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    })
}

fn looks_placeholder(digest: &str) -> bool {
    if let Some(payload) = digest.strip_prefix(SHA256_PREFIX) {
        // 전부 0
        if !payload.is_empty() && payload.bytes().all(|b| b == b'0') {
            return true;
        }
        // 같은 숫자의 반복 (예: 111...1)
        if payload.len() >= 2 && is_repeated_digit(payload) {
            return true;
        }
    }

    let lowered = digest.to_lowercase();
    SUSPICIOUS_TOKENS.iter().any(|token| lowered.contains(token))
}

fn is_repeated_digit(payload: &str) -> bool {
    let mut bytes = payload.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_digit() => bytes.all(|b| b == first),
        _ => false,
    }
}

/// 표시용 짧은 다이제스트
///
/// `sha256:` 접두사가 있으면 그 뒤 12자, 없으면 앞의 12자를 반환합니다.
pub fn short_digest(digest: &str) -> &str {
    let payload = digest.strip_prefix(SHA256_PREFIX).unwrap_or(digest);
    match payload.char_indices().nth(12) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}
