//! テスト用の StreamHandler とセッション生成

use std::sync::Arc;

use crate::adapter::{MemoryLog, SequenceIdGenerator};
use crate::error::Error;
use crate::provider::Provider;
use crate::session::{StreamHandler, StreamSession};
use crate::tool_call::ToolCall;

/// コールバックを順に記録するハンドラ
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub deltas: Vec<String>,
    pub tool_calls: Vec<ToolCall>,
    pub done: Vec<(Option<String>, Option<Error>)>,
    /// 到着順（"delta:..." / "tool:..." / "done"）
    pub order: Vec<String>,
}

impl StreamHandler for RecordingHandler {
    fn on_text_delta(&mut self, text: &str) {
        self.deltas.push(text.to_string());
        self.order.push(format!("delta:{}", text));
    }

    fn on_tool_call(&mut self, call: ToolCall) {
        self.order.push(format!("tool:{}", call.name()));
        self.tool_calls.push(call);
    }

    fn on_done(&mut self, finish_reason: Option<String>, error: Option<Error>) {
        self.done.push((finish_reason, error));
        self.order.push("done".to_string());
    }
}

/// MemoryLog と SequenceIdGenerator を注入したセッション
pub fn recording_session(
    provider: Provider,
) -> (StreamSession<RecordingHandler>, Arc<MemoryLog>) {
    let log = Arc::new(MemoryLog::new());
    let session = StreamSession::new(provider, RecordingHandler::default())
        .with_log(log.clone())
        .with_id_generator(Arc::new(SequenceIdGenerator::new()));
    (session, log)
}

/// Gemini のテキストチャンク（SSE 1 行）
pub fn gemini_text(text: &str) -> String {
    format!(
        "data: {}\n",
        serde_json::json!({"candidates":[{"content":{"parts":[{"text": text}]}}]})
    )
}
