//! 時刻取得 Outbound ポート
//!
//! ID 生成はこの trait 経由で「現在時刻」を取得する。テストでは固定時刻を注入する。

/// 時刻取得の抽象
pub trait Clock: Send + Sync {
    /// 現在時刻をミリ秒（Unix epoch）で返す
    fn now_ms(&self) -> u64;
}
