//! Ports & Adapters のポート定義
//!
//! - inbound: なし（ライブラリのためアプリの入り口を持たない）
//! - outbound: セッションが外界（ログ・時刻・ID 生成）に依頼するための trait

pub mod outbound;
