//! 알림 에러 타입

/// 알림 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// webhook URL도, 봇 토큰 + 채널도 설정되지 않음
    #[error(
        "notification target not configured: set notify.bot_token + notify.channel or notify.webhook_url"
    )]
    NotConfigured,

    /// HTTP 클라이언트 생성 실패
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// 네트워크 전송 실패
    #[error("failed to send notification: {0}")]
    Transport(#[from] reqwest::Error),

    /// 200이 아닌 응답
    #[error("chat api returned status {status}: {body}")]
    Status {
        /// HTTP 상태 코드
        status: u16,
        /// 응답 본문
        body: String,
    },

    /// API가 `ok: false`를 반환
    #[error("chat api error: {error}")]
    Api {
        /// API 에러 코드 (예: `invalid_blocks`)
        error: String,
    },
}

impl NotifyError {
    /// 설정 문제인지 (전송 실패와 구분)
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::NotConfigured)
    }
}
