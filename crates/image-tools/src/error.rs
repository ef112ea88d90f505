//! 외부 도구 어댑터 에러 타입
//!
//! 이미지 단위의 스캔/검증 실패는 에러가 아닌 값
//! ([`ScanFailure`](crate::scanner::ScanFailure), [`VerifyFailure`](crate::verifier::VerifyFailure))
//! 입니다. [`ToolError`]는 프로세스를 실행조차 할 수 없는 경우를 나타냅니다.

/// 외부 도구 어댑터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// 필요한 도구가 설치되어 있지 않음
    #[error("required tool '{tool}' is not installed or not in PATH")]
    Unavailable {
        /// 도구 이름
        tool: String,
    },

    /// 프로세스 실행 실패
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// 실행 파일
        program: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },

    /// 출력 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}
