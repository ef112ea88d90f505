//! 레지스트리 미러(ICSP) 리다이렉트 규칙
//!
//! 미러 설정 파일 형식:
//!
//! ```json
//! { "mirrors": [ { "source": "registry.redhat.io/rhacm2", "mirror": "quay.io/acm-d" } ] }
//! ```
//!
//! 규칙은 파일 순서대로 검사하며 처음 일치한 규칙 하나만 적용합니다.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, RelscanError};

/// 접두사 치환 규칙 하나
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRule {
    /// 원본 참조 접두사
    #[serde(default)]
    pub source: String,
    /// 치환할 미러 접두사
    #[serde(rename = "mirror", default)]
    pub mirror_prefix: String,
}

impl MirrorRule {
    /// 새 규칙을 생성합니다.
    pub fn new(source: impl Into<String>, mirror_prefix: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            mirror_prefix: mirror_prefix.into(),
        }
    }

    /// 양쪽 접두사가 모두 비어 있지 않아야 적용 가능한 규칙입니다.
    fn is_usable(&self) -> bool {
        !self.source.is_empty() && !self.mirror_prefix.is_empty()
    }
}

/// 리다이렉트 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// 도구에 넘길 참조 (치환되지 않았으면 원본)
    pub reference: String,
    /// 적용된 규칙의 `source` (없으면 `None`)
    pub matched_source: Option<String>,
}

impl Redirect {
    /// 미러로 치환되었는지
    pub fn is_redirected(&self) -> bool {
        self.matched_source.is_some()
    }
}

/// 실행 동안 읽기 전용인 미러 규칙 집합
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRules {
    #[serde(rename = "mirrors", default)]
    rules: Vec<MirrorRule>,
}

impl MirrorRules {
    /// 규칙 목록으로 생성합니다.
    pub fn new(rules: Vec<MirrorRule>) -> Self {
        Self { rules }
    }

    /// 미러 설정 파일을 로드합니다.
    ///
    /// 파일이 없으면 `Ok(None)`을 반환합니다 (미러 없이 진행).
    /// 파일은 있지만 JSON이 잘못된 경우에는 [`ConfigError::InvalidMirrorConfig`]입니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<Self>, RelscanError> {
        let path = path.as_ref();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no mirror config");
                return Ok(None);
            }
            Err(e) => return Err(RelscanError::Io(e)),
        };

        let rules: Self =
            serde_json::from_slice(&bytes).map_err(|e| ConfigError::InvalidMirrorConfig {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %path.display(), rules = rules.len(), "mirror config loaded");
        Ok(Some(rules))
    }

    /// 규칙 목록
    pub fn rules(&self) -> &[MirrorRule] {
        &self.rules
    }

    /// 규칙 수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 없는지
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 처음 일치하는 규칙으로 참조 접두사를 치환합니다.
    pub fn redirect(&self, reference: &str) -> Redirect {
        for rule in self.rules.iter().filter(|r| r.is_usable()) {
            if let Some(rest) = reference.strip_prefix(rule.source.as_str()) {
                return Redirect {
                    reference: format!("{}{rest}", rule.mirror_prefix),
                    matched_source: Some(rule.source.clone()),
                };
            }
        }
        Redirect {
            reference: reference.to_owned(),
            matched_source: None,
        }
    }
}

/// 선택적 규칙 집합에 대한 리다이렉트. 규칙이 없으면 원본 그대로입니다.
pub fn redirect(rules: Option<&MirrorRules>, reference: &str) -> Redirect {
    match rules {
        Some(rules) => rules.redirect(reference),
        None => Redirect {
            reference: reference.to_owned(),
            matched_source: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> MirrorRules {
        MirrorRules::new(vec![
            MirrorRule::new("registry.redhat.io/rhacm2", "quay.io/acm-d"),
            MirrorRule::new("registry.redhat.io", "brew.registry.redhat.io"),
        ])
    }

    #[test]
    fn first_match_wins() {
        let r = rules().redirect("registry.redhat.io/rhacm2/console@sha256:abc");
        assert_eq!(r.reference, "quay.io/acm-d/console@sha256:abc");
        assert_eq!(
            r.matched_source.as_deref(),
            Some("registry.redhat.io/rhacm2")
        );
        assert!(r.is_redirected());
    }

    #[test]
    fn falls_through_to_later_rule() {
        let r = rules().redirect("registry.redhat.io/multicluster-engine/foo@sha256:abc");
        assert_eq!(
            r.reference,
            "brew.registry.redhat.io/multicluster-engine/foo@sha256:abc"
        );
        assert_eq!(r.matched_source.as_deref(), Some("registry.redhat.io"));
    }

    #[test]
    fn no_match_keeps_reference() {
        let r = rules().redirect("quay.io/stolostron/console@sha256:abc");
        assert_eq!(r.reference, "quay.io/stolostron/console@sha256:abc");
        assert!(!r.is_redirected());
    }

    #[test]
    fn replaces_prefix_only_once() {
        let rules = MirrorRules::new(vec![MirrorRule::new("a/", "b/")]);
        let r = rules.redirect("a/a/a@sha256:1");
        assert_eq!(r.reference, "b/a/a@sha256:1");
    }

    #[test]
    fn empty_rules_are_skipped() {
        let rules = MirrorRules::new(vec![
            MirrorRule::new("", "quay.io/mirror"),
            MirrorRule::new("quay.io", ""),
        ]);
        let r = rules.redirect("quay.io/org/app@sha256:1");
        assert!(!r.is_redirected());
    }

    #[test]
    fn optional_rules_helper() {
        let r = redirect(None, "quay.io/org/app");
        assert_eq!(r.reference, "quay.io/org/app");
        assert!(r.matched_source.is_none());
    }

    #[test]
    fn parses_mirror_config_shape() {
        let json = r#"{"mirrors":[{"source":"registry.redhat.io","mirror":"quay.io/mirror"},{"source":"x"}]}"#;
        let rules: MirrorRules = serde_json::from_str(json).expect("parse");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rules()[0].mirror_prefix, "quay.io/mirror");
        assert!(rules.rules()[1].mirror_prefix.is_empty());
    }

    #[tokio::test]
    async fn load_missing_file_is_none() {
        let loaded = MirrorRules::load("/nonexistent/icsp-config.json")
            .await
            .expect("missing file is not an error");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn load_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("icsp-config.json");
        tokio::fs::write(&path, "{ mirrors: ").await.expect("write");
        let err = MirrorRules::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            RelscanError::Config(ConfigError::InvalidMirrorConfig { .. })
        ));
    }

    #[tokio::test]
    async fn load_valid_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("icsp-config.json");
        tokio::fs::write(&path, r#"{"mirrors":[{"source":"a","mirror":"b"}]}"#)
            .await
            .expect("write");
        let rules = MirrorRules::load(&path)
            .await
            .expect("load")
            .expect("rules present");
        assert_eq!(rules.redirect("a/x").reference, "b/x");
    }
}
