use chatstream::Error;
use clap::builder::ArgAction;
use clap::value_parser;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Config {
    pub help: bool,
    /// -v / --verbose: セッションのログを最後に stderr へ JSONL で出す
    pub verbose: bool,
    /// --messages: 畳み込んだメッセージ列を JSON で出す
    pub messages: bool,
    pub provider: Option<String>,
    /// 1 チャンクのバイト数（省略時は入力全体を 1 チャンク）
    pub chunk_size: Option<usize>,
    pub config: Option<PathBuf>,
    pub log: Option<PathBuf>,
    /// --fail: 最後にトランスポート失敗として終える
    pub fail: Option<String>,
    /// キャプチャファイル（"-" は標準入力）
    pub input: Option<String>,
}

fn build_clap_command() -> clap::Command {
    clap::Command::new("stream-replay")
        .about("Replay a captured LLM streaming response through a chatstream session")
        .disable_help_flag(true)
        .arg(
            clap::Arg::new("help")
                .short('h')
                .long("help")
                .help("Show this help message")
                .action(ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Dump session log records to stderr after the replay")
                .action(ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("messages")
                .long("messages")
                .help("Print the accumulated message list as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("provider")
                .short('p')
                .long("provider")
                .value_name("provider")
                .help("Provider that produced the capture (gemini, openai)")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("chunk-size")
                .short('n')
                .long("chunk-size")
                .value_name("bytes")
                .help("Cut the capture into transport chunks of this many bytes")
                .value_parser(value_parser!(usize))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("config")
                .long("config")
                .value_name("file")
                .help("Stream config JSON")
                .value_parser(value_parser!(PathBuf))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("log")
                .long("log")
                .value_name("file")
                .help("Append session log records to this JSONL file")
                .value_parser(value_parser!(PathBuf))
                .num_args(1),
        )
        .arg(
            clap::Arg::new("fail")
                .long("fail")
                .value_name("message")
                .help("End the session as a transport failure with this message")
                .num_args(1),
        )
        .arg(
            clap::Arg::new("input")
                .index(1)
                .help("Capture file, or - for stdin")
                .num_args(1),
        )
}

fn matches_to_config(matches: &clap::ArgMatches) -> Config {
    Config {
        help: matches.get_flag("help"),
        verbose: matches.get_flag("verbose"),
        messages: matches.get_flag("messages"),
        provider: matches.get_one::<String>("provider").cloned(),
        chunk_size: matches.get_one::<usize>("chunk-size").copied(),
        config: matches.get_one::<PathBuf>("config").cloned(),
        log: matches.get_one::<PathBuf>("log").cloned(),
        fail: matches.get_one::<String>("fail").cloned(),
        input: matches.get_one::<String>("input").cloned(),
    }
}

/// コマンドラインを解析する
pub fn parse_args() -> Result<Config, Error> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

pub fn parse_args_from(args: &[String]) -> Result<Config, Error> {
    let matches = build_clap_command()
        .try_get_matches_from(args)
        .map_err(|e| Error::invalid_argument(e.to_string()))?;
    let config = matches_to_config(&matches);
    if config.chunk_size == Some(0) {
        return Err(Error::invalid_argument("--chunk-size must be at least 1"));
    }
    Ok(config)
}
