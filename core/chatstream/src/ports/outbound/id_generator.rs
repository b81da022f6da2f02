//! ツール呼び出し ID 生成 Outbound ポート
//!
//! プロバイダが id を付けてこない functionCall / tool_calls に新しい ID を振る。
//! テストでは連番を返す実装を渡せる。

/// 一意な ID を生成する抽象（Outbound ポート）
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}
