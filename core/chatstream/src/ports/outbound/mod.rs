//! Outbound ポート: セッションが外界（ログ・時刻・ID 生成）を使うための trait

pub mod clock;
pub mod id_generator;
pub mod log;

pub use clock::Clock;
pub use id_generator::IdGenerator;
pub use log::{now_iso8601, Log, LogLevel, LogRecord};
