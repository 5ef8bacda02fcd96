use serde::{Deserialize, Serialize};

/** \brief 模型未给出任何文本时返回给浏览器的占位回复。 */
pub const FALLBACK_REPLY: &str = "No response from AI";

/**
 * \brief 对话角色。浏览器端的聊天组件以 `model` 表示助手一侧，这里作为 `assistant` 的别名接受。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model")]
    Assistant,
}

/**
 * \brief 单条对话消息。消息序列按时间先后排列，全链路保持顺序不变。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /** \brief 角色：user/assistant */
    pub role: Role,
    /** \brief 内容 */
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/**
 * \brief `POST /chat` 的请求体。
 */
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /** \brief 调用方提供的完整对话历史 */
    pub messages: Vec<ChatTurn>,
}

/**
 * \brief `POST /chat` 的成功响应体。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: ChatReply,
}

/**
 * \brief 返回给浏览器的回复，沿用前端既有的 candidates/content/parts 结构。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub candidates: Vec<ReplyCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCandidate {
    pub content: ReplyContent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyContent {
    pub parts: Vec<ReplyPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyPart {
    pub text: String,
}

impl ChatReply {
    /**
     * \brief 以单段文本构造回复。
     */
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![ReplyCandidate {
                content: ReplyContent {
                    parts: vec![ReplyPart { text: text.into() }],
                },
            }],
        }
    }

    /**
     * \brief 取首个候选的首段文本。
     */
    pub fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_role_is_accepted_as_assistant() {
        let turn: ChatTurn =
            serde_json::from_value(json!({"role": "model", "content": "hi"})).expect("parse turn");
        assert_eq!(turn.role, Role::Assistant);
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        let parsed = serde_json::from_value::<ChatTurn>(json!({"role": "system", "content": "x"}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_request_keeps_message_order() {
        let req: ChatRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "second"},
                {"role": "user", "content": "third"}
            ]
        }))
        .expect("parse request");
        let contents: Vec<_> = req.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reply_serializes_to_candidate_shape() {
        let body = serde_json::to_value(ChatResponse {
            reply: ChatReply::from_text("He builds full-stack apps."),
        })
        .expect("serialize reply");
        assert_eq!(
            body,
            json!({"reply": {"candidates": [{"content": {"parts": [{"text": "He builds full-stack apps."}]}}]}})
        );
    }

    #[test]
    fn test_reply_text_reads_first_part() {
        let reply = ChatReply::from_text("hello");
        assert_eq!(reply.text(), Some("hello"));
        let empty = ChatReply { candidates: vec![] };
        assert_eq!(empty.text(), None);
    }
}
