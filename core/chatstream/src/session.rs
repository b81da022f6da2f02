//! StreamSession: 1 回のネットワーク試行に対応するストリーミング状態機械
//!
//! Idle → Streaming → Completed | Failed。
//! チャンクごとに SSE 分割 → 厳密デコード（失敗時は救出）→ プロバイダ別パース → 終了理由ラッチ を行い、
//! 結果を StreamHandler に順に渡す。on_done は必ずちょうど 1 回呼ぶ。再試行はしない。

use crate::adapter::{NoopLog, StdClock, StdIdGenerator};
use crate::config::StreamConfig;
use crate::error::Error;
use crate::events::{FinishReason, StreamEvent};
use crate::parser;
use crate::ports::outbound::{IdGenerator, Log, LogLevel, LogRecord};
use crate::provider::Provider;
use crate::recover;
use crate::sse::{SsePayload, SseSplitter};
use crate::tool_call::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

const LOG_LAYER: &str = "session";

/// 呼び出し側へのコールバック
pub trait StreamHandler {
    /// テキスト増分（累積ではなく差分のみ）
    fn on_text_delta(&mut self, text: &str);
    /// ツール呼び出し（蓄積しない）
    fn on_tool_call(&mut self, call: ToolCall);
    /// 終了。セッションごとにちょうど 1 回
    fn on_done(&mut self, finish_reason: Option<String>, error: Option<Error>);
}

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// 途中経過のスナップショット（クラッシュ復旧等で呼び出し側が保存する）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub provider: Provider,
    pub accumulated_text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// ストリーミングセッション
///
/// 状態を変える操作はすべて `&mut self` なので、1 セッションへの同時投入はコンパイル時に防がれる。
/// 複数スレッドから投入する場合は SharedStreamSession を使う。
pub struct StreamSession<H: StreamHandler> {
    provider: Provider,
    state: SessionState,
    splitter: SseSplitter,
    accumulated_text: String,
    /// 最初に観測した終了理由（以後は上書きしない）
    finish_reason: Option<String>,
    delta_count: usize,
    tool_call_count: usize,
    handler: H,
    config: StreamConfig,
    log: Arc<dyn Log>,
    ids: Arc<dyn IdGenerator>,
}

impl<H: StreamHandler> StreamSession<H> {
    /// デフォルト設定（NoopLog・StdIdGenerator）でセッションを作る
    pub fn new(provider: Provider, handler: H) -> Self {
        let config = StreamConfig::default();
        Self {
            provider,
            state: SessionState::Idle,
            splitter: SseSplitter::new(config.max_carry_over_bytes),
            accumulated_text: String::new(),
            finish_reason: None,
            delta_count: 0,
            tool_call_count: 0,
            handler,
            config,
            log: Arc::new(NoopLog),
            ids: Arc::new(StdIdGenerator::new(Arc::new(StdClock))),
        }
    }

    /// スナップショットから Streaming 状態のセッションを作り直す
    pub fn restore(snapshot: SessionSnapshot, handler: H) -> Self {
        let mut session = Self::new(snapshot.provider, handler);
        session.state = SessionState::Streaming;
        session.accumulated_text = snapshot.accumulated_text;
        session.finish_reason = snapshot.finish_reason;
        session
    }

    /// 設定を差し替える（チャンク投入前に呼ぶ。スプリッタは作り直す）
    pub fn with_config(mut self, config: StreamConfig) -> Self {
        self.splitter = SseSplitter::new(config.max_carry_over_bytes);
        self.config = config;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// これまでに転送したテキスト増分の連結
    pub fn accumulated_text(&self) -> &str {
        &self.accumulated_text
    }

    /// ラッチ済みの終了理由（生の文字列）
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    pub fn finish_reason_kind(&self) -> Option<FinishReason> {
        self.finish_reason.as_deref().map(FinishReason::classify)
    }

    pub fn delta_count(&self) -> usize {
        self.delta_count
    }

    pub fn tool_call_count(&self) -> usize {
        self.tool_call_count
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            provider: self.provider,
            accumulated_text: self.accumulated_text.clone(),
            finish_reason: self.finish_reason.clone(),
        }
    }

    /// トランスポートから届いたチャンクを 1 つ処理する
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.state.is_terminal() {
            self.log_ignored("chunk", Some(chunk.len()));
            return;
        }
        self.state = SessionState::Streaming;
        for payload in self.splitter.feed(chunk) {
            match payload {
                SsePayload::Json(obj) => self.handle_object(&obj),
                SsePayload::Malformed(raw) => self.handle_malformed(&raw),
                SsePayload::Discarded(bytes) => self.log_discarded(bytes),
            }
        }
    }

    /// トランスポートの正常終了。ラッチ済みの終了理由で on_done を呼ぶ
    pub fn finish(&mut self) {
        if self.state.is_terminal() {
            self.log_ignored("finish", None);
            return;
        }
        // 末尾で切れた data: 行は on_done の前に救出を試す
        match self.splitter.take_pending() {
            Some(SsePayload::Malformed(raw)) => self.handle_malformed(&raw),
            Some(SsePayload::Discarded(bytes)) => self.log_discarded(bytes),
            Some(SsePayload::Json(obj)) => self.handle_object(&obj),
            None => {}
        }
        self.state = SessionState::Completed;
        self.emit_log(
            LogRecord::new(LogLevel::Info, "stream completed")
                .kind("lifecycle")
                .field("provider", self.provider.as_str())
                .field(
                    "finish_reason",
                    self.finish_reason.clone().map_or(Value::Null, Value::String),
                )
                .field("delta_count", self.delta_count)
                .field("tool_call_count", self.tool_call_count)
                .field("chars", self.accumulated_text.chars().count()),
        );
        self.handler.on_done(self.finish_reason.clone(), None);
    }

    /// トランスポートの失敗。ラッチ済みの値に関わらず finish_reason は None
    pub fn fail(&mut self, error: Error) {
        if self.state.is_terminal() {
            self.log_ignored("fail", None);
            return;
        }
        // 失敗時は救出しない（記録だけ残して捨てる）
        match self.splitter.take_pending() {
            Some(SsePayload::Malformed(raw)) => self.log_dropped(&raw),
            Some(SsePayload::Discarded(bytes)) => self.log_discarded(bytes),
            Some(SsePayload::Json(_)) | None => {}
        }
        self.state = SessionState::Failed;
        self.emit_log(
            LogRecord::new(LogLevel::Error, "stream failed")
                .kind("lifecycle")
                .field("provider", self.provider.as_str())
                .field("error", error.to_string()),
        );
        self.handler.on_done(None, Some(error));
    }

    fn handle_object(&mut self, obj: &Value) {
        for event in parser::parse_events(obj, self.provider, self.ids.as_ref()) {
            match event {
                StreamEvent::TextDelta(text) => self.emit_delta(&text),
                StreamEvent::ToolCall(call) => {
                    self.tool_call_count += 1;
                    self.handler.on_tool_call(call);
                }
                StreamEvent::FinishSignal(reason) => {
                    if self.finish_reason.is_none() {
                        self.finish_reason = Some(reason);
                    }
                }
                StreamEvent::Empty => {}
            }
        }
    }

    fn handle_malformed(&mut self, raw: &str) {
        match recover::recover(raw) {
            Some(text) => {
                self.emit_log(
                    LogRecord::new(LogLevel::Debug, "payload salvaged")
                        .kind("recover")
                        .field("provider", self.provider.as_str())
                        .field("chars", text.chars().count()),
                );
                self.emit_delta(&text);
            }
            None => self.log_dropped(raw),
        }
    }

    fn log_dropped(&self, raw: &str) {
        self.emit_log(
            LogRecord::new(LogLevel::Warn, "payload dropped")
                .kind("recover")
                .field("provider", self.provider.as_str())
                .field(
                    "payload",
                    recover::truncate_for_log(raw, self.config.log_payload_prefix),
                ),
        );
    }

    fn log_discarded(&self, bytes: usize) {
        self.emit_log(
            LogRecord::new(LogLevel::Warn, "carry-over buffer discarded")
                .kind("buffer")
                .field("provider", self.provider.as_str())
                .field("bytes", bytes),
        );
    }

    fn emit_delta(&mut self, text: &str) {
        if text.is_empty() && !self.config.forward_empty_deltas {
            return;
        }
        self.accumulated_text.push_str(text);
        self.delta_count += 1;
        self.handler.on_text_delta(text);
    }

    fn log_ignored(&self, what: &str, bytes: Option<usize>) {
        let message = format!("{} ignored after terminal state", what);
        let mut record = LogRecord::new(LogLevel::Debug, message)
            .kind("lifecycle")
            .field("state", format!("{:?}", self.state).to_lowercase());
        if let Some(n) = bytes {
            record = record.field("bytes", n);
        }
        self.emit_log(record);
    }

    /// ログは best-effort（失敗は無視する）
    fn emit_log(&self, record: LogRecord) {
        let _ = self.log.log(&record.layer(LOG_LAYER));
    }
}

/// 複数スレッドからチャンクを投入するためのラッパー。投入はロックで直列化される。
pub struct SharedStreamSession<H: StreamHandler> {
    inner: Arc<Mutex<StreamSession<H>>>,
}

impl<H: StreamHandler> Clone for SharedStreamSession<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: StreamHandler> SharedStreamSession<H> {
    pub fn new(session: StreamSession<H>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn feed(&self, chunk: &[u8]) {
        self.lock().feed(chunk);
    }

    pub fn finish(&self) {
        self.lock().finish();
    }

    pub fn fail(&self, error: Error) {
        self.lock().fail(error);
    }

    pub fn state(&self) -> SessionState {
        self.lock().state()
    }

    pub fn accumulated_text(&self) -> String {
        self.lock().accumulated_text().to_string()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// ロックを取ってセッションを直接触る
    pub fn with_session<R>(&self, f: impl FnOnce(&mut StreamSession<H>) -> R) -> R {
        f(&mut self.lock())
    }

    /// 他のクローンが無ければ中のセッションを取り出す
    pub fn try_into_inner(self) -> Result<StreamSession<H>, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(m) => Ok(m.into_inner().unwrap_or_else(|e| e.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }

    // ハンドラが panic してもセッションの状態は一貫しているので、poison は無視して続行する
    fn lock(&self) -> MutexGuard<'_, StreamSession<H>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// セッション作成前の事前チェック（認証情報・アクティブな会話）
pub fn preflight(credential: Option<&str>, active_conversation: Option<&str>) -> Result<(), Error> {
    match credential {
        Some(c) if !c.trim().is_empty() => {}
        _ => return Err(Error::MissingCredential),
    }
    match active_conversation {
        Some(id) if !id.trim().is_empty() => Ok(()),
        _ => Err(Error::NoActiveConversation),
    }
}
