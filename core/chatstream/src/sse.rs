//! SSE フレーム分割
//!
//! トランスポートから届く任意境界のチャンクを、デコード可能な JSON ペイロード列に変換する。
//!
//! - `data:` 行はその場で厳密デコードする（`[DONE]` と空ペイロードは無視）
//! - `data:` で始まらない行は前の値の続きとしてキャリーオーバーバッファに足し、
//!   デコードできた時点で 1 ペイロードとして出す
//! - `data:` 行を含まないチャンクは、まずチャンク全体を 1 つの JSON として試す（非 SSE の直接応答）
//! - チャンク末尾の `data:` の途中までの行頭は次のチャンクに連結する
//! - JSON 配列は要素ごとに独立したペイロードへ展開する
//!
//! 完結しなかったキャリーオーバーは take_pending で取り出す。末尾で切れた `data:` 行だけが救出の対象で、
//! 継続行だけの断片は捨てる。

use serde_json::Value;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
/// data 以外の SSE フィールド（キャリーオーバーが無いときは読み飛ばす）
const SSE_FIELD_PREFIXES: &[&str] = &["event:", "id:", "retry:", ":"];

/// 分割結果 1 件
#[derive(Debug, Clone, PartialEq)]
pub enum SsePayload {
    /// 厳密デコード済みの JSON オブジェクト
    Json(Value),
    /// 完結しているがデコードできなかったペイロード（救出処理へ回す）
    Malformed(String),
    /// 上限を超えたため捨てたキャリーオーバーのバイト数
    Discarded(usize),
}

/// セッション専用の SSE スプリッタ（共有しない）
#[derive(Debug, Default)]
pub struct SseSplitter {
    carry_over: String,
    /// carry_over が末尾で切れた `data:` 行から始まったか
    carry_from_data: bool,
    /// チャンク末尾で `data:` の途中まで届いた行頭（次のチャンクの先頭に連結する）
    line_head: String,
    /// チャンク末尾で途切れた UTF-8 マルチバイト文字のバイト列
    pending_bytes: Vec<u8>,
    max_carry_over_bytes: Option<usize>,
}

impl SseSplitter {
    /// `max_carry_over_bytes` が None ならキャリーオーバーは無制限
    pub fn new(max_carry_over_bytes: Option<usize>) -> Self {
        Self {
            max_carry_over_bytes,
            ..Self::default()
        }
    }

    /// 未完のキャリーオーバーバッファ
    pub fn carry_over(&self) -> &str {
        &self.carry_over
    }

    /// ストリーム終了時に残っているキャリーオーバーを取り出す。
    ///
    /// `data:` 行から始まった断片は Malformed（救出へ回す）、それ以外は Discarded。
    pub fn take_pending(&mut self) -> Option<SsePayload> {
        let from_data = self.carry_from_data;
        let pending = self.take_carry_over();
        let trimmed = pending.trim();
        if trimmed.is_empty() {
            None
        } else if from_data {
            Some(SsePayload::Malformed(trimmed.to_string()))
        } else {
            Some(SsePayload::Discarded(pending.len()))
        }
    }

    fn take_carry_over(&mut self) -> String {
        self.carry_from_data = false;
        std::mem::take(&mut self.carry_over)
    }

    /// 生バイトのチャンクを 1 つ処理する
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SsePayload> {
        let text = self.decode_utf8(chunk);
        self.feed_str(&text)
    }

    /// UTF-8 デコード済みのチャンクを 1 つ処理する
    pub fn feed_str(&mut self, text: &str) -> Vec<SsePayload> {
        let mut out = Vec::new();
        let joined;
        let text = if self.line_head.is_empty() {
            text
        } else {
            joined = std::mem::take(&mut self.line_head) + text;
            joined.as_str()
        };

        if text.trim().is_empty() {
            if !self.carry_over.is_empty() {
                self.carry_over.push_str(text);
            }
            return out;
        }

        let has_data_line = text
            .lines()
            .any(|line| line.trim_start().starts_with(DATA_PREFIX));
        if !has_data_line && self.carry_over.is_empty() {
            if let Ok(v) = serde_json::from_str::<Value>(text.trim()) {
                expand(v, &mut out);
                return out;
            }
        }

        for segment in text.split_inclusive('\n') {
            self.split_segment(segment, &mut out);
        }
        out
    }

    fn split_segment(&mut self, segment: &str, out: &mut Vec<SsePayload>) {
        let terminated = segment.ends_with('\n');
        let raw = segment.trim_start();
        let line = raw.trim_end();

        if line.is_empty() {
            if !self.carry_over.is_empty() {
                self.carry_over.push_str(segment);
            }
            return;
        }

        if !terminated && self.carry_over.is_empty() && DATA_PREFIX.starts_with(line) {
            self.line_head.push_str(segment);
            return;
        }

        if line.starts_with(DATA_PREFIX) {
            // data: 行が来た時点で、前の断片はもう続きを受け取れない
            if !self.carry_over.is_empty() {
                let stale = self.take_carry_over();
                out.push(SsePayload::Malformed(stale.trim().to_string()));
            }
            let raw_payload = raw[DATA_PREFIX.len()..].trim_start();
            let payload = raw_payload.trim_end();
            if payload.is_empty() || payload == DONE_SENTINEL {
                return;
            }
            match serde_json::from_str::<Value>(payload) {
                Ok(v) => expand(v, out),
                // チャンク末尾で切れた data: 行は続きを待つ（末尾の空白も値の一部かもしれない）
                Err(_) if !terminated => {
                    self.carry_over.push_str(raw_payload);
                    self.carry_from_data = true;
                    self.enforce_cap(out);
                }
                Err(_) => out.push(SsePayload::Malformed(payload.to_string())),
            }
            return;
        }

        if self.carry_over.is_empty() {
            if SSE_FIELD_PREFIXES.iter().any(|p| line.starts_with(p)) {
                return;
            }
            self.carry_over.push_str(raw);
        } else {
            self.carry_over.push_str(segment);
        }

        match serde_json::from_str::<Value>(self.carry_over.trim()) {
            Ok(v) => {
                self.take_carry_over();
                expand(v, out);
            }
            Err(_) => self.enforce_cap(out),
        }
    }

    fn enforce_cap(&mut self, out: &mut Vec<SsePayload>) {
        if let Some(max) = self.max_carry_over_bytes {
            if self.carry_over.len() > max {
                out.push(SsePayload::Discarded(self.take_carry_over().len()));
            }
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(chunk);
        match std::str::from_utf8(&bytes) {
            Ok(s) => s.to_string(),
            // 末尾の文字が途中で切れているだけなら次のチャンクまで持ち越す
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                self.pending_bytes = bytes[valid..].to_vec();
                String::from_utf8_lossy(&bytes[..valid]).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

/// オブジェクトはそのまま、配列はオブジェクト要素ごとに展開する。それ以外は捨てる。
fn expand(value: Value, out: &mut Vec<SsePayload>) {
    match value {
        Value::Object(_) => out.push(SsePayload::Json(value)),
        Value::Array(items) => out.extend(
            items
                .into_iter()
                .filter(Value::is_object)
                .map(SsePayload::Json),
        ),
        _ => {}
    }
}
