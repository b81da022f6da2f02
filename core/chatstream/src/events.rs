//! ストリームの正規化イベント
//!
//! プロバイダごとの差異は parser で吸収し、ここで定義するイベント列に変換する。

use crate::tool_call::ToolCall;
use serde::{Deserialize, Serialize};

/// 1 ペイロードから得られるイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// アシスタントテキストの増分
    TextDelta(String),
    /// ツール呼び出し
    ToolCall(ToolCall),
    /// プロバイダの終了マーカー（生の文字列）
    FinishSignal(String),
    /// 何も含まないペイロード（メタデータのみ等）
    Empty,
}

impl StreamEvent {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// 終了理由の分類
///
/// on_done には生の文字列を渡す。これは表示や分岐のための補助。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinishReason {
    /// 通常終了
    Stop,
    /// ツール呼び出しあり
    ToolCalls,
    /// 長さ制限
    Length,
    /// 安全性フィルタ等でブロック
    Safety,
    /// その他（プロバイダ固有）
    Other(String),
}

impl FinishReason {
    pub fn classify(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" | "finish_reason_unspecified" => Self::Stop,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "length" | "max_tokens" => Self::Length,
            "safety" | "recitation" | "blocklist" | "prohibited_content" | "spii"
            | "content_filter" => Self::Safety,
            _ => Self::Other(raw.to_string()),
        }
    }
}
