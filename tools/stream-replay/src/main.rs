mod args;
mod replay;

use anyhow::Context;
use args::{parse_args, Config};
use chatstream::adapter::{FileJsonLog, MemoryLog, NoopLog};
use chatstream::ports::outbound::Log;
use chatstream::{Error, FinishReason, Provider, StreamConfig};
use replay::{replay, ReplayOptions};
use std::io::{self, Read, Write};
use std::process;
use std::sync::Arc;

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(e) => {
            let err = e.downcast_ref::<Error>();
            if err.is_some_and(Error::is_usage) {
                print_usage();
            }
            eprintln!("stream-replay: {:#}", e);
            err.map_or(70, Error::exit_code)
        }
    };
    process::exit(exit_code);
}

fn run() -> anyhow::Result<i32> {
    let config = parse_args()?;
    if config.help {
        print_help();
        return Ok(0);
    }
    let provider: Provider = config
        .provider
        .as_deref()
        .ok_or_else(|| Error::invalid_argument("Option -p/--provider is required"))?
        .parse()?;
    let input_name = config
        .input
        .clone()
        .ok_or_else(|| Error::invalid_argument("No capture file given (use - for stdin)"))?;

    let input =
        read_capture(&input_name).with_context(|| format!("read capture {}", input_name))?;
    let stream_config = load_config(&config)?;

    let memory = Arc::new(MemoryLog::new());
    let log: Arc<dyn Log> = match (&config.log, config.verbose) {
        (Some(path), false) => Arc::new(FileJsonLog::new(path)),
        (Some(path), true) => Arc::new(Tee(FileJsonLog::new(path), memory.clone())),
        (None, true) => memory.clone(),
        (None, false) => Arc::new(NoopLog),
    };

    let options = ReplayOptions {
        provider,
        chunk_size: config.chunk_size,
        config: stream_config,
        fail: config.fail.clone(),
    };
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut out = stdout.lock();
    let mut err = stderr.lock();
    let outcome = replay(&input, options, log, &mut out, &mut err)?;

    if config.messages {
        let json = serde_json::to_string_pretty(&outcome.messages).map_err(Error::from)?;
        writeln!(out, "{}", json).map_err(Error::from)?;
    }
    if config.verbose {
        let kind = outcome.finish_reason.as_deref().map(FinishReason::classify);
        writeln!(err, "finish_reason_kind: {:?}", kind).map_err(Error::from)?;
        for record in memory.records() {
            let line = serde_json::to_string(&record).map_err(Error::from)?;
            writeln!(err, "{}", line).map_err(Error::from)?;
        }
    }
    Ok(outcome.exit_code())
}

/// "-" なら標準入力、それ以外はファイルを読む
fn read_capture(name: &str) -> Result<Vec<u8>, Error> {
    if name == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read(name)?)
    }
}

fn load_config(config: &Config) -> Result<StreamConfig, Error> {
    match &config.config {
        Some(path) => StreamConfig::load(path),
        None => Ok(StreamConfig::default()),
    }
}

/// ファイルとメモリの両方に書く Log
struct Tee(FileJsonLog, Arc<MemoryLog>);

impl Log for Tee {
    fn log(&self, record: &chatstream::ports::outbound::LogRecord) -> Result<(), Error> {
        let file = self.0.log(record);
        self.1.log(record)?;
        file
    }
}

fn print_usage() {
    eprintln!("Usage: stream-replay -p <gemini|openai> [options] <CAPTURE|->");
}

fn print_help() {
    println!("Usage: stream-replay -p <gemini|openai> [options] <CAPTURE|->");
    println!("Options:");
    println!("  -h, --help                 Show this help message");
    println!("  -p, --provider <provider>  Provider that produced the capture (gemini, openai)");
    println!("  -n, --chunk-size <bytes>   Transport chunk size (default: one chunk)");
    println!("  --config <file>            Stream config JSON");
    println!("  --log <file>               Append session log records (JSONL) to this file");
    println!("  --messages                 Print the accumulated message list as JSON to stdout");
    println!("  --fail <message>           End the session through the transport failure path");
    println!("  -v, --verbose              Dump session log records to stderr after the replay");
    println!();
    println!("Output:");
    println!("  stdout  text deltas as they arrive");
    println!("  stderr  tool_call: <json> per tool call");
    println!("          done: finish_reason=<reason> or done: error=<message>");
    println!();
    println!("Examples:");
    println!("  stream-replay -p gemini capture.sse");
    println!("  curl -sN ... | stream-replay -p openai --chunk-size 16 -");
}
