//! MessageAccumulator: テキスト増分を会話のメッセージ列に畳み込む
//!
//! 末尾のメッセージだけを変更し、それより前のメッセージは書き換えない（封印済み）。
//! 1 増分あたりの処理は末尾要素のみを見る。

use crate::msg::{Message, Part, Role};
use crate::tool_call::ToolCall;

/// 増分の畳み込み
#[derive(Debug, Clone, Copy)]
pub struct MessageAccumulator {
    /// 新しく開くメッセージに付ける role（Gemini は model、OpenAI は assistant）
    role: Role,
}

impl MessageAccumulator {
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// テキスト増分を追記する。
    ///
    /// 末尾が model/assistant のメッセージなら、その最後の text part に連結する
    /// （最後の part が text でなければ text part を足す）。それ以外は新しいメッセージを開く。
    pub fn append_delta(&self, text: &str, mut messages: Vec<Message>) -> Vec<Message> {
        match open_message(&mut messages) {
            Some(last) => match last.parts.last_mut() {
                Some(Part::Text { text: existing }) => existing.push_str(text),
                _ => last.parts.push(Part::text(text)),
            },
            None => messages.push(Message::new(self.role, vec![Part::text(text)])),
        }
        messages
    }

    /// ツール呼び出しを開いているメッセージに part として足す（無ければ開く）
    pub fn append_tool_call(&self, call: ToolCall, mut messages: Vec<Message>) -> Vec<Message> {
        match open_message(&mut messages) {
            Some(last) => last.parts.push(Part::tool_call(call)),
            None => messages.push(Message::new(self.role, vec![Part::tool_call(call)])),
        }
        messages
    }

    /// 無条件に新しいメッセージを足す（非ストリーミング応答・ユーザー入力用）
    pub fn append_full_message(
        &self,
        role: Role,
        parts: Vec<Part>,
        mut messages: Vec<Message>,
    ) -> Vec<Message> {
        messages.push(Message::new(role, parts));
        messages
    }
}

fn open_message(messages: &mut [Message]) -> Option<&mut Message> {
    messages.last_mut().filter(|m| m.role.is_model_side())
}
