//! プロバイダ応答パーサ
//!
//! デコード済みの JSON オブジェクト 1 件から、テキスト増分・ツール呼び出し・終了理由を取り出す。
//! 期待するフィールドが無いのはエラーではなく None（メタデータのみのチャンク等で普通に起こる）。
//! 型の合わないフィールドも「無い」として扱う。

use crate::events::StreamEvent;
use crate::ports::outbound::IdGenerator;
use crate::provider::Provider;
use crate::tool_call::{arguments_from_value, ToolCall};
use serde_json::Value;

/// OpenAI Responses API の完了センチネル
pub const OPENAI_COMPLETED_TYPE: &str = "response.completed";
/// response.completed を受けたときにラッチする終了理由
pub const OPENAI_COMPLETED_REASON: &str = "stop";

/// テキスト増分を取り出す
pub fn text_delta(obj: &Value, provider: Provider) -> Option<String> {
    match provider {
        Provider::Gemini => gemini_text(obj),
        Provider::OpenAi => openai_text(obj),
    }
}

/// ツール呼び出しを取り出す（1 ペイロードにつき最初の 1 件のみ）
///
/// id が無い場合は `ids` で新しく振る。
pub fn tool_call(obj: &Value, provider: Provider, ids: &dyn IdGenerator) -> Option<ToolCall> {
    match provider {
        Provider::Gemini => gemini_tool_call(obj, ids),
        Provider::OpenAi => openai_tool_call(obj, ids),
    }
}

/// このペイロードが持つ終了理由（ラッチはセッション側で行う）
pub fn finish_reason(obj: &Value, provider: Provider) -> Option<String> {
    match provider {
        Provider::Gemini => non_empty_str(&obj["candidates"][0]["finishReason"]),
        Provider::OpenAi => {
            if obj["type"].as_str() == Some(OPENAI_COMPLETED_TYPE) {
                return Some(OPENAI_COMPLETED_REASON.to_string());
            }
            non_empty_str(&obj["choices"][0]["finish_reason"])
        }
    }
}

/// 1 ペイロードを正規化イベント列にする。
///
/// 順序はテキスト → ツール呼び出し → 終了シグナル。何も無ければ `[Empty]`。
pub fn parse_events(obj: &Value, provider: Provider, ids: &dyn IdGenerator) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    if let Some(text) = text_delta(obj, provider) {
        events.push(StreamEvent::TextDelta(text));
    }
    if let Some(call) = tool_call(obj, provider, ids) {
        events.push(StreamEvent::ToolCall(call));
    }
    if let Some(reason) = finish_reason(obj, provider) {
        events.push(StreamEvent::FinishSignal(reason));
    }
    if events.is_empty() {
        events.push(StreamEvent::Empty);
    }
    events
}

fn gemini_parts(obj: &Value) -> Option<&Vec<Value>> {
    obj["candidates"][0]["content"]["parts"].as_array()
}

fn gemini_text(obj: &Value) -> Option<String> {
    let parts = gemini_parts(obj)?;
    let mut found = false;
    let mut text = String::new();
    for part in parts {
        if let Some(s) = part["text"].as_str() {
            found = true;
            text.push_str(s);
        }
    }
    found.then_some(text)
}

fn gemini_tool_call(obj: &Value, ids: &dyn IdGenerator) -> Option<ToolCall> {
    // 2 件目以降の functionCall は無視する
    let fc = gemini_parts(obj)?
        .iter()
        .map(|part| &part["functionCall"])
        .find(|fc| fc["name"].is_string())?;
    let name = fc["name"].as_str().unwrap_or_default();
    let id = non_empty_str(&fc["id"]).unwrap_or_else(|| ids.next_id());
    let call_id = non_empty_str(&fc["callId"]).unwrap_or_else(|| id.clone());
    let description = fc["description"].as_str().unwrap_or_default();
    Some(ToolCall::new(
        name,
        arguments_from_value(fc.get("args")),
        id,
        call_id,
        description,
    ))
}

fn openai_text(obj: &Value) -> Option<String> {
    if let Some(delta) = obj["delta"].as_str() {
        // Responses API の引数ストリーム（*.function_call_arguments.delta）はテキストではない
        let is_arguments = obj["type"]
            .as_str()
            .is_some_and(|t| t.contains("function_call_arguments"));
        return (!is_arguments).then(|| delta.to_string());
    }
    match &obj["choices"][0]["delta"] {
        Value::String(s) => Some(s.clone()),
        // Chat Completions 形式: delta.content（文字列 or content parts 配列）
        Value::Object(delta) => match delta.get("content") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(parts)) => {
                let texts: Vec<&str> = parts.iter().filter_map(|p| p["text"].as_str()).collect();
                (!texts.is_empty()).then(|| texts.concat())
            }
            _ => None,
        },
        _ => None,
    }
}

fn openai_tool_call(obj: &Value, ids: &dyn IdGenerator) -> Option<ToolCall> {
    // Chat Completions 形式は choices[0].delta.tool_calls に入る。
    // 引数は断片で届くため、name を持つ最初の断片だけを呼び出しとして扱う
    let entry = obj["tool_calls"]
        .as_array()
        .or_else(|| obj["choices"][0]["delta"]["tool_calls"].as_array())?
        .first()?;
    let name = entry["function"]["name"].as_str()?;
    let id = non_empty_str(&entry["id"]).unwrap_or_else(|| ids.next_id());
    let call_id = non_empty_str(&entry["call_id"]).unwrap_or_else(|| id.clone());
    Some(ToolCall::new(
        name,
        arguments_from_value(entry["function"].get("arguments")),
        id,
        call_id,
        "",
    ))
}

fn non_empty_str(v: &Value) -> Option<String> {
    v.as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SequenceIdGenerator;
    use serde_json::json;

    #[test]
    fn test_gemini_text_concatenates_parts() {
        let v = json!({"candidates":[{"content":{"parts":[{"text":"Hel"},{"text":"lo"}]}}]});
        assert_eq!(text_delta(&v, Provider::Gemini).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_gemini_text_absent() {
        let v = json!({"candidates":[]});
        assert_eq!(text_delta(&v, Provider::Gemini), None);
        let v = json!({"usageMetadata":{"totalTokenCount":12}});
        assert_eq!(text_delta(&v, Provider::Gemini), None);
        let v = json!({"candidates":[{"content":{"parts":[{"functionCall":{"name":"f"}}]}}]});
        assert_eq!(text_delta(&v, Provider::Gemini), None);
    }

    #[test]
    fn test_gemini_text_non_string_is_absent() {
        let v = json!({"candidates":[{"content":{"parts":[{"text":42}]}}]});
        assert_eq!(text_delta(&v, Provider::Gemini), None);
    }

    #[test]
    fn test_gemini_tool_call_args_object() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"candidates":[{"content":{"parts":[
            {"functionCall":{"name":"lookup","args":{"q":"x"}}}
        ]}}]});
        let tc = tool_call(&v, Provider::Gemini, &ids).unwrap();
        assert_eq!(tc.name, "lookup");
        assert_eq!(tc.arguments.get("q"), Some(&json!("x")));
        assert_eq!(tc.id, "call_1");
        assert_eq!(tc.call_id, "call_1");
        assert_eq!(tc.description, "");
    }

    #[test]
    fn test_gemini_tool_call_args_string_and_id() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"candidates":[{"content":{"parts":[
            {"functionCall":{"name":"lookup","id":"fc-9","args":"{\"q\":\"y\"}"}}
        ]}}]});
        let tc = tool_call(&v, Provider::Gemini, &ids).unwrap();
        assert_eq!(tc.id, "fc-9");
        assert_eq!(tc.arguments.get("q"), Some(&json!("y")));
    }

    #[test]
    fn test_gemini_tool_call_bad_args_default_empty() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"candidates":[{"content":{"parts":[
            {"functionCall":{"name":"lookup","args":"not json"}}
        ]}}]});
        let tc = tool_call(&v, Provider::Gemini, &ids).unwrap();
        assert!(tc.arguments.is_empty());
    }

    #[test]
    fn test_gemini_tool_call_first_only() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"candidates":[{"content":{"parts":[
            {"text":"calling"},
            {"functionCall":{"name":"first","args":{}}},
            {"functionCall":{"name":"second","args":{}}}
        ]}}]});
        let tc = tool_call(&v, Provider::Gemini, &ids).unwrap();
        assert_eq!(tc.name, "first");
    }

    #[test]
    fn test_openai_text_top_level_delta() {
        let v = json!({"type":"response.output_text.delta","delta":"Hi"});
        assert_eq!(text_delta(&v, Provider::OpenAi).as_deref(), Some("Hi"));
    }

    #[test]
    fn test_openai_text_choices_delta() {
        let v = json!({"choices":[{"delta":"Yo"}]});
        assert_eq!(text_delta(&v, Provider::OpenAi).as_deref(), Some("Yo"));
        let v = json!({"choices":[{"delta":{"content":"Hello"}}]});
        assert_eq!(text_delta(&v, Provider::OpenAi).as_deref(), Some("Hello"));
        let v = json!({"choices":[{"delta":{"content":[
            {"type":"text","text":"a"},
            {"text":"b"}
        ]}}]});
        assert_eq!(text_delta(&v, Provider::OpenAi).as_deref(), Some("ab"));
        let v = json!({"choices":[{"delta":{"role":"assistant"}}]});
        assert_eq!(text_delta(&v, Provider::OpenAi), None);
    }

    #[test]
    fn test_openai_arguments_delta_is_not_text() {
        let v = json!({"type":"response.function_call_arguments.delta","delta":"{\"q\""});
        assert_eq!(text_delta(&v, Provider::OpenAi), None);
    }

    #[test]
    fn test_openai_tool_call() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"tool_calls":[
            {"id":"call_abc","function":{"name":"run_shell","arguments":"{\"cmd\":\"ls\"}"}},
            {"id":"call_def","function":{"name":"ignored","arguments":"{}"}}
        ]});
        let tc = tool_call(&v, Provider::OpenAi, &ids).unwrap();
        assert_eq!(tc.name, "run_shell");
        assert_eq!(tc.id, "call_abc");
        assert_eq!(tc.arguments.get("cmd"), Some(&json!("ls")));
    }

    #[test]
    fn test_openai_tool_call_in_choices_delta() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"choices":[{"delta":{"tool_calls":[
            {"index":0,"id":"call_abc","function":{"name":"run_shell","arguments":"{\"x\":1}"}}
        ]}}]});
        let tc = tool_call(&v, Provider::OpenAi, &ids).unwrap();
        assert_eq!(tc.name, "run_shell");
        assert_eq!(tc.id, "call_abc");
        assert_eq!(tc.call_id, "call_abc");
        assert_eq!(tc.arguments.get("x"), Some(&json!(1)));
        assert_eq!(text_delta(&v, Provider::OpenAi), None);
    }

    #[test]
    fn test_openai_tool_call_arguments_fragment_is_skipped() {
        let ids = SequenceIdGenerator::new();
        let head = json!({"choices":[{"delta":{"tool_calls":[
            {"index":0,"id":"call_1","function":{"name":"f","arguments":"{\"a\":"}}
        ]}}]});
        let tail = json!({"choices":[{"delta":{"tool_calls":[
            {"index":0,"function":{"arguments":"1}"}}
        ]}}]});
        let tc = tool_call(&head, Provider::OpenAi, &ids).unwrap();
        assert_eq!(tc.name, "f");
        assert!(tc.arguments.is_empty());
        assert!(tool_call(&tail, Provider::OpenAi, &ids).is_none());
        assert!(tool_call(&head, Provider::Gemini, &ids).is_none());
    }

    #[test]
    fn test_openai_tool_call_missing_id_and_bad_args() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"tool_calls":[{"function":{"name":"f","arguments":"{oops"}}]});
        let tc = tool_call(&v, Provider::OpenAi, &ids).unwrap();
        assert_eq!(tc.id, "call_1");
        assert!(tc.arguments.is_empty());
    }

    #[test]
    fn test_tool_call_provider_isolation() {
        let ids = SequenceIdGenerator::new();
        let gemini = json!({"candidates":[{"content":{"parts":[
            {"functionCall":{"name":"lookup","args":{"q":"x"}}}
        ]}}]});
        let openai = json!({"tool_calls":[{"function":{"name":"f","arguments":"{}"}}]});
        assert!(tool_call(&gemini, Provider::OpenAi, &ids).is_none());
        assert!(tool_call(&openai, Provider::Gemini, &ids).is_none());
        assert_eq!(text_delta(&json!({"delta":"x"}), Provider::Gemini), None);
    }

    #[test]
    fn test_finish_reason_gemini() {
        let v = json!({"candidates":[{"content":{"parts":[{"text":"x"}]},"finishReason":"STOP"}]});
        assert_eq!(finish_reason(&v, Provider::Gemini).as_deref(), Some("STOP"));
        let v = json!({"candidates":[{"finishReason":null}]});
        assert_eq!(finish_reason(&v, Provider::Gemini), None);
    }

    #[test]
    fn test_finish_reason_openai() {
        let v = json!({"type":"response.completed","response":{"id":"r1"}});
        assert_eq!(finish_reason(&v, Provider::OpenAi).as_deref(), Some("stop"));
        let v = json!({"choices":[{"delta":{},"finish_reason":"length"}]});
        assert_eq!(finish_reason(&v, Provider::OpenAi).as_deref(), Some("length"));
        let v = json!({"choices":[{"delta":{"content":"x"},"finish_reason":null}]});
        assert_eq!(finish_reason(&v, Provider::OpenAi), None);
    }

    #[test]
    fn test_parse_events_order_and_empty() {
        let ids = SequenceIdGenerator::new();
        let v = json!({"candidates":[{"content":{"parts":[
            {"text":"let me check"},
            {"functionCall":{"name":"lookup","args":{}}}
        ]},"finishReason":"STOP"}]});
        let events = parse_events(&v, Provider::Gemini, &ids);
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::TextDelta(s) if s == "let me check"));
        assert!(matches!(&events[1], StreamEvent::ToolCall(tc) if tc.name == "lookup"));
        assert!(matches!(&events[2], StreamEvent::FinishSignal(s) if s == "STOP"));

        let events = parse_events(&json!({"type":"response.completed"}), Provider::OpenAi, &ids);
        assert_eq!(events, vec![StreamEvent::FinishSignal("stop".to_string())]);

        let events = parse_events(&json!({"usageMetadata":{}}), Provider::Gemini, &ids);
        assert_eq!(events, vec![StreamEvent::Empty]);
    }
}
