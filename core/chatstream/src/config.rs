//! ストリーム処理の設定（stream.json）
//!
//! すべて省略可能。省略時は Default の値を使う。

use crate::error::Error;
use serde::{Deserialize, Deserializer};
use std::path::Path;

/// carry-over バッファ上限のデフォルト（1 MiB）
pub const DEFAULT_MAX_CARRY_OVER_BYTES: usize = 1024 * 1024;
/// ログに残すペイロード先頭の文字数のデフォルト
pub const DEFAULT_LOG_PAYLOAD_PREFIX: usize = 200;

/// セッション 1 つ分の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// carry-over バッファの上限。None なら無制限
    pub max_carry_over_bytes: Option<usize>,
    /// 捨てたペイロードをログに書くときの最大文字数
    pub log_payload_prefix: usize,
    /// 長さ 0 のテキスト増分も on_text_delta に渡すか
    pub forward_empty_deltas: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_carry_over_bytes: Some(DEFAULT_MAX_CARRY_OVER_BYTES),
            log_payload_prefix: DEFAULT_LOG_PAYLOAD_PREFIX,
            forward_empty_deltas: false,
        }
    }
}

/// serde 用の内部構造（null と省略を区別するため）
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StreamConfigRaw {
    #[serde(default, deserialize_with = "present")]
    max_carry_over_bytes: Option<Option<usize>>,
    log_payload_prefix: Option<usize>,
    forward_empty_deltas: Option<bool>,
}

/// キーがあれば Some(値)（null なら Some(None)）
fn present<'de, D>(d: D) -> Result<Option<Option<usize>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<usize>::deserialize(d).map(Some)
}

impl From<StreamConfigRaw> for StreamConfig {
    fn from(r: StreamConfigRaw) -> Self {
        let d = StreamConfig::default();
        StreamConfig {
            max_carry_over_bytes: r.max_carry_over_bytes.unwrap_or(d.max_carry_over_bytes),
            log_payload_prefix: r.log_payload_prefix.unwrap_or(d.log_payload_prefix),
            forward_empty_deltas: r.forward_empty_deltas.unwrap_or(d.forward_empty_deltas),
        }
    }
}

impl StreamConfig {
    /// JSON 文字列からパース
    pub fn parse(json: &str) -> Result<Self, Error> {
        let raw: StreamConfigRaw =
            serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        Ok(raw.into())
    }

    /// ファイルから読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io_msg(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}
