//! 会話メッセージ（role 付きの part 列）
//!
//! 会話ストア（呼び出し側）が所有し、MessageAccumulator が値として受け取って返す。

use crate::tool_call::ToolCall;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// メッセージの role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Gemini のモデル応答
    Model,
    /// OpenAI のモデル応答
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }

    /// ストリーミングで追記される側（model / assistant）か
    pub fn is_model_side(&self) -> bool {
        matches!(self, Self::Model | Self::Assistant)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// メッセージの part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
    },
    Image {
        /// base64
        data: String,
        mime_type: String,
    },
    File {
        /// base64
        data: String,
        mime_type: String,
        name: String,
    },
    ToolCall {
        #[serde(flatten)]
        call: ToolCall,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// 生バイトを base64 にして画像 part を作る
    pub fn image_from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self::image(STANDARD.encode(bytes), mime_type)
    }

    pub fn file(
        data: impl Into<String>,
        mime_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::File {
            data: data.into(),
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    /// 生バイトを base64 にしてファイル part を作る
    pub fn file_from_bytes(
        bytes: &[u8],
        mime_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::file(STANDARD.encode(bytes), mime_type, name)
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::ToolCall { call }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolCall { call } => Some(call),
            _ => None,
        }
    }
}

/// 会話メッセージ 1 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, vec![Part::text(text)])
    }

    /// text part を順に連結したもの
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.parts.iter().filter_map(Part::as_tool_call)
    }
}
