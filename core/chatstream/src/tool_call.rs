//! ツール呼び出し（値オブジェクト）

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// モデルが要求した関数呼び出し 1 件。構築後は変更しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    /// 引数（JSON オブジェクト）。パースできなかった場合は空
    pub arguments: Map<String, Value>,
    pub id: String,
    /// プロバイダ側の call id（無ければ id と同じ）
    pub call_id: String,
    #[serde(default)]
    pub description: String,
}

impl ToolCall {
    pub fn new(
        name: impl Into<String>,
        arguments: Map<String, Value>,
        id: impl Into<String>,
        call_id: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            arguments,
            id: id.into(),
            call_id: call_id.into(),
            description: description.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &Map<String, Value> {
        &self.arguments
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// 引数を JSON オブジェクトとして解釈する。
///
/// オブジェクトならそのまま、文字列なら JSON としてもう一度パースする。
/// どちらも失敗したら空のオブジェクト。
pub fn arguments_from_value(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => arguments_from_str(s),
        _ => Map::new(),
    }
}

/// JSON 文字列の引数をオブジェクトとして解釈する（失敗時は空）
pub fn arguments_from_str(s: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
