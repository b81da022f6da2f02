//! 壊れた JSON チャンクからのテキスト救出
//!
//! 厳密なデコードに失敗したペイロード（ネットワークの区切りで途中で切れた JSON 等）から、
//! 最初の `"text": "<value>"` だけを拾う。一般的な部分 JSON パーサは持たない。
//! 救出できなかったペイロードは呼び出し側がログに残して捨てる（再試行もしない）。

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

/// `"text"` キーと、エスケープを含むクォート文字列値
const TEXT_FIELD_PATTERN: &str = r#""text"\s*:\s*"((?:[^"\\]|\\.)*)""#;

fn text_field_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TEXT_FIELD_PATTERN).ok()).as_ref()
}

/// 最初に見つかった `"text": "..."` の値を返す（JSON エスケープは解除する）
pub fn recover(payload: &str) -> Option<String> {
    let caps = text_field_regex()?.captures(payload)?;
    let literal = caps.get(1)?.as_str();
    // エスケープとして不正なら捕まえた文字列をそのまま使う
    Some(
        serde_json::from_str::<String>(&format!("\"{}\"", literal))
            .unwrap_or_else(|_| literal.to_string()),
    )
}

/// 救出したテキストを `candidates[0].content.parts[0].text` 形のイベントに組み立てる
pub fn recover_event(payload: &str) -> Option<Value> {
    let text = recover(payload)?;
    Some(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

/// ログ用にペイロードを先頭 `max_chars` 文字に切り詰める
pub fn truncate_for_log(payload: &str, max_chars: usize) -> String {
    match payload.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &payload[..idx]),
        None => payload.to_string(),
    }
}
