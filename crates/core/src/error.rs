//! 에러 타입: 도메인별 에러 정의
//!
//! 실행 전체를 중단시키는 에러(설정 누락, 매니페스트 디렉토리 없음)와
//! 파일 단위로 보고하고 계속 진행하는 에러(매니페스트 파싱 실패)를 구분합니다.

/// relscan 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum RelscanError {
    /// 설정 관련 에러 (치명적, 실행 중단)
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 매니페스트 파일 단위 에러
    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// 매니페스트 디렉토리가 존재하지 않음
    #[error("manifest directory not found: {path}")]
    ManifestDirNotFound { path: String },

    /// 매니페스트 디렉토리에 JSON 파일이 없음
    #[error("no manifest files (*.json) found in {path}")]
    NoManifests { path: String },

    /// 미러(ICSP) 설정 파일 파싱 실패
    #[error("invalid mirror config {path}: {reason}")]
    InvalidMirrorConfig { path: String, reason: String },
}

/// 매니페스트 파일 단위 에러
///
/// 하나의 매니페스트 파일이 실패해도 나머지 파일의 처리는 계속됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// 파일 읽기 실패
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// JSON 파싱 실패
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}
