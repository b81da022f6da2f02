//! アダプター（Outbound ポートの標準実装）
//!
//! セッションは ports::outbound の trait 経由でのみログ・時刻・ID 生成に触れる。
//! 実装は標準実装（Std*）やテスト用の実装を注入する。

pub mod file_json_log;
pub mod std_clock;
pub mod std_id_generator;

pub use file_json_log::{FileJsonLog, MemoryLog, NoopLog};
pub use std_clock::StdClock;
pub use std_id_generator::{SequenceIdGenerator, StdIdGenerator};
