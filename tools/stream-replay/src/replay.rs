//! キャプチャを StreamSession に流し、正規化イベントを出力する

use chatstream::adapter::SequenceIdGenerator;
use chatstream::ports::outbound::Log;
use chatstream::{
    Error, Message, MessageAccumulator, Provider, StreamConfig, StreamHandler, StreamSession,
    ToolCall,
};
use std::io::Write;
use std::sync::Arc;

/// リプレイの設定
pub struct ReplayOptions {
    pub provider: Provider,
    pub chunk_size: Option<usize>,
    pub config: StreamConfig,
    pub fail: Option<String>,
}

/// リプレイ結果
#[derive(Debug)]
pub struct ReplayOutcome {
    pub finish_reason: Option<String>,
    pub error: Option<Error>,
    pub messages: Vec<Message>,
}

impl ReplayOutcome {
    pub fn exit_code(&self) -> i32 {
        self.error.as_ref().map_or(0, Error::exit_code)
    }
}

/// テキスト増分は out、ツール呼び出しと終了行は err に書く
struct PrintingHandler<'a> {
    out: &'a mut dyn Write,
    err: &'a mut dyn Write,
    acc: MessageAccumulator,
    messages: Vec<Message>,
    /// 最後に書いたテキストが改行で終わっていないか
    open_line: bool,
    done: Option<(Option<String>, Option<Error>)>,
    /// 最初の書き込み失敗（コールバックは Result を返せないので覚えておく）
    write_error: Option<std::io::Error>,
}

impl PrintingHandler<'_> {
    fn record(&mut self, result: std::io::Result<()>) {
        if let Err(e) = result {
            self.write_error.get_or_insert(e);
        }
    }
}

impl StreamHandler for PrintingHandler<'_> {
    fn on_text_delta(&mut self, text: &str) {
        let result = write!(self.out, "{}", text).and_then(|_| self.out.flush());
        self.record(result);
        self.open_line = !text.ends_with('\n');
        let messages = std::mem::take(&mut self.messages);
        self.messages = self.acc.append_delta(text, messages);
    }

    fn on_tool_call(&mut self, call: ToolCall) {
        let line = serde_json::to_string(&call).unwrap_or_default();
        let result = writeln!(self.err, "tool_call: {}", line);
        self.record(result);
        let messages = std::mem::take(&mut self.messages);
        self.messages = self.acc.append_tool_call(call, messages);
    }

    fn on_done(&mut self, finish_reason: Option<String>, error: Option<Error>) {
        if self.open_line {
            let result = writeln!(self.out);
            self.record(result);
        }
        let result = match &error {
            Some(e) => writeln!(self.err, "done: error={}", e),
            None => writeln!(
                self.err,
                "done: finish_reason={}",
                finish_reason.as_deref().unwrap_or("none")
            ),
        };
        self.record(result);
        self.done = Some((finish_reason, error));
    }
}

/// キャプチャ全体をリプレイする
pub fn replay(
    input: &[u8],
    options: ReplayOptions,
    log: Arc<dyn Log>,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<ReplayOutcome, Error> {
    let handler = PrintingHandler {
        out,
        err,
        acc: MessageAccumulator::new(options.provider.streaming_role()),
        messages: Vec::new(),
        open_line: false,
        done: None,
        write_error: None,
    };
    let mut session = StreamSession::new(options.provider, handler)
        .with_config(options.config)
        .with_log(log)
        .with_id_generator(Arc::new(SequenceIdGenerator::new()));

    match options.chunk_size {
        Some(n) => input.chunks(n).for_each(|chunk| session.feed(chunk)),
        None => session.feed(input),
    }
    match options.fail {
        Some(msg) => session.fail(Error::transport(msg)),
        None => session.finish(),
    }

    let handler = session.into_handler();
    if let Some(e) = handler.write_error {
        return Err(e.into());
    }
    let (finish_reason, error) = handler.done.unwrap_or_default();
    Ok(ReplayOutcome {
        finish_reason,
        error,
        messages: handler.messages,
    })
}
