//! Block Kit 메시지 모델
//!
//! 필요한 블록 종류(header, section, divider, context)만 모델링합니다.
//! section/context 텍스트는 생성 시점에 [`truncate_text`]를 거칩니다.

use serde::Serialize;

/// 블록 텍스트 최대 길이 (문자 수)
pub const MAX_BLOCK_TEXT: usize = 3000;
/// 잘라낼 때 남기는 길이
pub const TRUNCATED_LEN: usize = 2950;
/// 잘림 안내 문구
pub const TRUNCATION_NOTICE: &str = "\n\n... (truncated, see full report in artifacts)";

/// 텍스트 객체
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    /// 일반 텍스트 (header 전용)
    PlainText {
        /// 본문
        text: String,
        /// 이모지 코드 변환 여부
        emoji: bool,
    },
    /// mrkdwn 텍스트
    Mrkdwn {
        /// 본문
        text: String,
    },
}

impl TextObject {
    /// 본문
    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text, .. } | Self::Mrkdwn { text } => text,
        }
    }
}

/// 메시지 블록
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// 헤더
    Header {
        /// plain_text 제목
        text: TextObject,
    },
    /// 본문 섹션
    Section {
        /// mrkdwn 본문
        text: TextObject,
    },
    /// 구분선
    Divider,
    /// 보조 정보
    Context {
        /// mrkdwn 요소 목록
        elements: Vec<TextObject>,
    },
}

impl Block {
    pub fn header(text: impl Into<String>) -> Self {
        Self::Header {
            text: TextObject::PlainText {
                text: text.into(),
                emoji: true,
            },
        }
    }

    pub fn section(text: impl AsRef<str>) -> Self {
        Self::Section {
            text: TextObject::Mrkdwn {
                text: truncate_text(text.as_ref()),
            },
        }
    }

    pub fn context(text: impl AsRef<str>) -> Self {
        Self::Context {
            elements: vec![TextObject::Mrkdwn {
                text: truncate_text(text.as_ref()),
            }],
        }
    }

    /// 블록의 주 텍스트 (divider는 `None`)
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Header { text } | Self::Section { text } => Some(text.text()),
            Self::Context { elements } => elements.first().map(TextObject::text),
            Self::Divider => None,
        }
    }
}

/// 전송 단위 메시지
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    /// 알림용 대체 텍스트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// 블록 목록
    pub blocks: Vec<Block>,
}

impl Message {
    /// 블록 목록으로 메시지를 생성합니다.
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { text: None, blocks }
    }

    /// 대체 텍스트를 설정합니다.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// 3000자를 넘는 텍스트를 2950자로 자르고 안내 문구를 붙입니다.
pub fn truncate_text(text: &str) -> String {
    if text.chars().count() <= MAX_BLOCK_TEXT {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(TRUNCATED_LEN).collect();
    cut.push_str(TRUNCATION_NOTICE);
    cut
}
