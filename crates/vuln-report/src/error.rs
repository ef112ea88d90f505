//! 취약점 리포트 에러 타입
//!
//! 이미지 단위 파싱 실패는 에러가 아니라 값([`ParseFailure`](crate::parser::ParseFailure))으로
//! 다룹니다. 이 타입은 호출자가 처리를 중단해야 하는 경우만 나타냅니다.

/// 취약점 리포트 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum VulnReportError {
    /// table 형식에서 나온 요약은 심각도 추세 비교에 사용할 수 없음
    #[error(
        "cannot compare '{key}': summary was derived from a table artifact without severity breakdown"
    )]
    UnsupportedComparison {
        /// 문제가 된 이미지 키
        key: String,
    },

    /// 리포트 디렉토리 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}
