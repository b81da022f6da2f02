//! プロバイダタグ
//!
//! セッション作成時に一度だけ与えられ、セッション中に変わらない。

use crate::error::Error;
use crate::msg::Role;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// ストリームを返すプロバイダ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    #[serde(alias = "gpt")]
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        }
    }

    /// ストリーミング応答を書き込む側の role（Gemini は "model"、OpenAI は "assistant"）
    pub fn streaming_role(&self) -> Role {
        match self {
            Self::Gemini => Role::Model,
            Self::OpenAi => Role::Assistant,
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" | "gpt" => Ok(Self::OpenAi),
            other => Err(Error::UnknownProvider(other.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
