//! 알림 전송 클라이언트
//!
//! - webhook: 메시지 하나를 `username`, `icon_emoji`와 함께 POST. 200이 아니면 실패
//! - threaded: `chat.postMessage`로 본문을 게시하고 응답 `ts`를 `thread_ts`로 답글 게시.
//!   응답의 `ok`가 false면 실패

use std::time::Duration;

use relscan_core::config::NotifyConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blocks::{Block, Message};
use crate::error::NotifyError;
use crate::message::Notification;

/// 전송 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// incoming webhook
    Webhook {
        url: String,
        username: String,
        icon_emoji: String,
    },
    /// 봇 토큰으로 chat.postMessage 호출
    Threaded {
        api_url: String,
        bot_token: String,
        channel: String,
    },
}

impl Delivery {
    /// 설정에서 전송 대상을 결정합니다.
    ///
    /// 봇 토큰 + 채널 + threading이면 threaded, 아니면 webhook URL이 필요합니다.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        if !config.bot_token.is_empty() && !config.channel.is_empty() && config.threading {
            return Ok(Self::Threaded {
                api_url: config.api_url.clone(),
                bot_token: config.bot_token.clone(),
                channel: config.channel.clone(),
            });
        }
        if !config.webhook_url.is_empty() {
            return Ok(Self::Webhook {
                url: config.webhook_url.clone(),
                username: config.username.clone(),
                icon_emoji: config.icon_emoji.clone(),
            });
        }
        Err(NotifyError::NotConfigured)
    }

    /// threaded 모드인지
    pub fn is_threaded(&self) -> bool {
        matches!(self, Self::Threaded { .. })
    }

    /// 로그용 모드 이름
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Webhook { .. } => "webhook",
            Self::Threaded { .. } => "threaded",
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    message: &'a Message,
    username: &'a str,
    icon_emoji: &'a str,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    blocks: &'a [Block],
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// 채팅 알림 클라이언트
pub struct SlackClient {
    http: reqwest::Client,
    delivery: Delivery,
}

impl SlackClient {
    /// 요청 타임아웃을 가진 클라이언트를 생성합니다.
    pub fn new(delivery: Delivery, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self { http, delivery })
    }

    /// 설정으로 클라이언트를 생성합니다.
    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        Self::new(
            Delivery::from_config(config)?,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// 전송 대상
    pub fn delivery(&self) -> &Delivery {
        &self.delivery
    }

    /// 알림을 전송하고 게시한 메시지 수를 반환합니다.
    ///
    /// webhook 모드에서는 스레드 답글을 보내지 않습니다.
    pub async fn send(&self, notification: &Notification) -> Result<usize, NotifyError> {
        match &self.delivery {
            Delivery::Webhook {
                url,
                username,
                icon_emoji,
            } => {
                if !notification.threads.is_empty() {
                    debug!(
                        replies = notification.threads.len(),
                        "webhook mode ignores thread replies"
                    );
                }
                self.post_webhook(url, username, icon_emoji, &notification.main)
                    .await?;
                info!("notification sent via webhook");
                Ok(1)
            }
            Delivery::Threaded {
                api_url,
                bot_token,
                channel,
            } => {
                let parent = self
                    .post_api(api_url, bot_token, channel, None, &notification.main)
                    .await?
                    .ts
                    .ok_or_else(|| NotifyError::Api {
                        error: "missing ts in response".to_owned(),
                    })?;
                info!(ts = %parent, "main message posted");

                for (i, reply) in notification.threads.iter().enumerate() {
                    self.post_api(api_url, bot_token, channel, Some(&parent), reply)
                        .await?;
                    debug!(reply = i + 1, "thread reply posted");
                }
                Ok(1 + notification.threads.len())
            }
        }
    }

    async fn post_webhook(
        &self,
        url: &str,
        username: &str,
        icon_emoji: &str,
        message: &Message,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            message,
            username,
            icon_emoji,
        };
        let response = self.http.post(url).json(&payload).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "webhook rejected message");
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn post_api(
        &self,
        api_url: &str,
        bot_token: &str,
        channel: &str,
        thread_ts: Option<&str>,
        message: &Message,
    ) -> Result<ApiResponse, NotifyError> {
        let payload = PostMessage {
            channel,
            thread_ts,
            text: message.text.as_deref(),
            blocks: &message.blocks,
        };
        let response = self
            .http
            .post(api_url)
            .bearer_auth(bot_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ApiResponse = response.json().await?;
        if !body.ok {
            let error = body.error.unwrap_or_else(|| "unknown".to_owned());
            warn!(error = %error, blocks = message.blocks.len(), "chat api rejected message");
            return Err(NotifyError::Api { error });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NotifyConfig {
        NotifyConfig::default()
    }

    #[test]
    fn threaded_requires_token_channel_and_flag() {
        let mut cfg = config();
        cfg.bot_token = "xoxb-1".to_owned();
        cfg.channel = "#release".to_owned();
        assert!(Delivery::from_config(&cfg).expect("threaded").is_threaded());

        cfg.threading = false;
        assert!(matches!(Delivery::from_config(&cfg), Err(NotifyError::NotConfigured)));

        cfg.webhook_url = "https://hooks.example/x".to_owned();
        let delivery = Delivery::from_config(&cfg).expect("webhook");
        assert_eq!(delivery.mode(), "webhook");
    }

    #[test]
    fn nothing_configured() {
        assert!(matches!(
            Delivery::from_config(&config()),
            Err(NotifyError::NotConfigured)
        ));
    }

    #[test]
    fn webhook_payload_flattens_message() {
        let message = Message::new(vec![Block::Divider]);
        let payload = WebhookPayload {
            message: &message,
            username: "relscan",
            icon_emoji: ":robot_face:",
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "blocks": [{"type": "divider"}],
                "username": "relscan",
                "icon_emoji": ":robot_face:"
            })
        );
    }
}
