//! chatstream: LLM ストリーミング応答の正規化コア
//!
//! トランスポートから届く生チャンク（SSE または素の JSON）を、テキスト増分・ツール呼び出し・
//! 終了理由に正規化し、会話のメッセージ列へ畳み込みます。HTTP クライアントは持ちません。

/// エラーハンドリング
pub mod error;

/// ストリーム処理の設定
pub mod config;

/// プロバイダタグ
pub mod provider;

/// ツール呼び出し
pub mod tool_call;

/// 正規化イベントと終了理由
pub mod events;

/// プロバイダ別の応答パース
pub mod parser;

/// 壊れた JSON からのテキスト救出
pub mod recover;

/// SSE フレーム分割
pub mod sse;

/// ストリーミングセッション（状態機械）
pub mod session;

/// 会話メッセージ
pub mod msg;

/// 増分のメッセージ列への畳み込み
pub mod accumulator;

/// Outbound ポート（ログ・時刻・ID 生成）
pub mod ports;

/// ポートの標準実装
pub mod adapter;

#[cfg(test)]
mod tests;

pub use accumulator::MessageAccumulator;
pub use config::StreamConfig;
pub use error::Error;
pub use events::{FinishReason, StreamEvent};
pub use msg::{Message, Part, Role};
pub use provider::Provider;
pub use session::{
    preflight, SessionSnapshot, SessionState, SharedStreamSession, StreamHandler, StreamSession,
};
pub use tool_call::ToolCall;
