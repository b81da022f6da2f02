//! エラーハンドリング
//!
//! パース経路の失敗は Error にしない（イベントなしとして扱う）。
//! Error になるのはトランスポート失敗・事前チェック・設定/ログの I/O のみ。

/// chatstream のエラー型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// トランスポート（ネットワーク）レベルの失敗。セッションを Failed にする
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("API credential is empty or not set")]
    MissingCredential,
    #[error("No active conversation")]
    NoActiveConversation,
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl Error {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn json(msg: impl Into<String>) -> Self {
        Self::Json(msg.into())
    }

    pub fn io_msg(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// 使い方の誤り（CLI は usage を表示する）
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::UnknownProvider(_))
    }

    /// CLI 用の終了コード（sysexits 準拠）
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::UnknownProvider(_) => 64,
            Self::Json(_) => 65,
            Self::MissingCredential | Self::NoActiveConversation | Self::Config(_) => 78,
            Self::Io(_) | Self::Transport(_) => 74,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
