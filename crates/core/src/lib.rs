#![doc = include_str!("../README.md")]

pub mod config;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod mirror;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, ManifestError, RelscanError};

// 설정
pub use config::RelscanConfig;

// 매니페스트
pub use manifest::{ImageRecord, Manifest, ManifestSet, discover_manifests};

// 다이제스트 분류
pub use digest::{DigestClass, classify};

// 미러 규칙
pub use mirror::{MirrorRule, MirrorRules, Redirect};

// 도메인 타입
pub use types::Severity;
