//! 順序保存・分割への不変性・終了理由ラッチ・救出・プロバイダ分離

use serde_json::{json, Value};

use crate::adapter::SequenceIdGenerator;
use crate::parser;
use crate::provider::Provider;
use crate::recover;

use super::support::{gemini_text, recording_session};

#[test]
fn test_deltas_concatenate_in_chunk_order() {
    let fragments = ["The ", "quick ", "", "brown ", "fox", " 🦊", "\n", "jumps"];
    let chunks: Vec<String> = fragments.iter().map(|f| gemini_text(f)).collect();

    let (mut s, _) = recording_session(Provider::Gemini);
    for c in &chunks {
        s.feed(c.as_bytes());
    }
    s.finish();

    // 各チャンクを単独でデコードして取り出した増分を順に連結したもの
    let isolated: String = chunks
        .iter()
        .filter_map(|c| {
            let v: Value = serde_json::from_str(c.trim_start_matches("data:").trim()).ok()?;
            parser::text_delta(&v, Provider::Gemini)
        })
        .collect();

    assert_eq!(s.handler().deltas.concat(), isolated);
    assert_eq!(s.accumulated_text(), isolated);
    assert_eq!(isolated, "The quick brown fox 🦊\njumps");
}

#[test]
fn test_split_anywhere_yields_same_payload() {
    let line = format!(
        "data: {}\n",
        json!({"candidates":[{"content":{"parts":[{"text":"Hello, 世界 \"quoted\" \\ end "}]},"finishReason":"STOP"}]})
    );
    let bytes = line.as_bytes();
    let expected = "Hello, 世界 \"quoted\" \\ end ";

    for cut in 1..bytes.len() {
        let (mut s, _) = recording_session(Provider::Gemini);
        s.feed(&bytes[..cut]);
        s.feed(&bytes[cut..]);
        s.finish();
        assert_eq!(s.handler().deltas, vec![expected], "cut at {}", cut);
        assert_eq!(
            s.handler().done,
            vec![(Some("STOP".to_string()), None)],
            "cut at {}",
            cut
        );
    }
}

#[test]
fn test_three_way_split_yields_same_payload() {
    let line = gemini_text("three way split");
    let bytes = line.as_bytes();
    for a in (1..bytes.len()).step_by(7) {
        for b in (a + 1..bytes.len()).step_by(5) {
            let (mut s, _) = recording_session(Provider::Gemini);
            s.feed(&bytes[..a]);
            s.feed(&bytes[a..b]);
            s.feed(&bytes[b..]);
            assert_eq!(s.accumulated_text(), "three way split", "cuts {} {}", a, b);
        }
    }
}

#[test]
fn test_finish_reason_latch_is_sticky() {
    let (mut s, _) = recording_session(Provider::Gemini);
    s.feed(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n");
    assert_eq!(s.finish_reason(), None);
    s.feed(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"b\"}]},\"finishReason\":\"STOP\"}]}\n");
    assert_eq!(s.finish_reason(), Some("STOP"));
    s.feed(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"c\"}]},\"finishReason\":null}]}\n");
    s.feed(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"d\"}]}}]}\n");
    s.feed(b"data: {\"candidates\":[{\"finishReason\":\"MAX_TOKENS\"}]}\n");
    assert_eq!(s.finish_reason(), Some("STOP"));
    s.finish();
    assert_eq!(s.handler().done, vec![(Some("STOP".to_string()), None)]);
    assert_eq!(s.accumulated_text(), "abcd");
}

#[test]
fn test_recover_from_truncated_payload() {
    assert_eq!(
        recover::recover(r#"{"candidates":[{"content":{"parts":[{"text": "hello"}, {"te"#),
        Some("hello".to_string())
    );
}

#[test]
fn test_tool_call_provider_isolation() {
    let ids = SequenceIdGenerator::new();
    let gemini = json!({"candidates":[{"content":{"parts":[{"functionCall":{"name":"lookup","args":{}}}]}}]});
    let openai = json!({"tool_calls":[{"function":{"name":"lookup","arguments":"{}"}}]});

    assert!(parser::tool_call(&gemini, Provider::OpenAi, &ids).is_none());
    assert!(parser::tool_call(&openai, Provider::Gemini, &ids).is_none());
    assert!(parser::tool_call(&gemini, Provider::Gemini, &ids).is_some());
    assert!(parser::tool_call(&openai, Provider::OpenAi, &ids).is_some());
}

#[test]
fn test_session_ignores_other_provider_shapes() {
    let (mut s, _) = recording_session(Provider::OpenAi);
    s.feed(gemini_text("not for openai").as_bytes());
    s.feed(b"data: {\"candidates\":[{\"finishReason\":\"STOP\"}]}\n");
    s.finish();
    assert!(s.handler().deltas.is_empty());
    assert_eq!(s.handler().done, vec![(None, None)]);

    let (mut s, _) = recording_session(Provider::Gemini);
    s.feed(b"data: {\"delta\":\"x\"}\ndata: {\"type\":\"response.completed\"}\n");
    s.finish();
    assert!(s.handler().deltas.is_empty());
    assert_eq!(s.handler().done, vec![(None, None)]);
}
