use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    config::CompletionSettings,
    models::{ChatReply, ChatTurn, Role, FALLBACK_REPLY},
};

/**
 * \brief 补全调用失败。三种来源在网关侧统一映射为 500。
 */
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion failed: could not reach provider: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion failed: provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("completion failed: malformed provider payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/**
 * \brief 网关依赖的补全接口，便于在测试中替换为桩实现。
 */
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /**
     * \brief 根据调用方给出的对话历史生成一条回复。
     */
    async fn complete(&self, conversation: &[ChatTurn]) -> Result<ChatReply, CompletionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ProviderRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ProviderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ProviderRole::User,
            Role::Assistant => ProviderRole::Assistant,
        }
    }
}

#[derive(Debug, Serialize)]
struct ProviderMessage<'a> {
    role: ProviderRole,
    content: &'a str,
}

/**
 * \brief OpenAI 兼容的 chat/completions 请求体。
 */
#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    model: &'a str,
    messages: Vec<ProviderMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/**
 * \brief 只取需要的字段，其余字段一律忽略。
 */
#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    choices: Option<Vec<ProviderChoice>>,
}

#[derive(Debug, Deserialize)]
struct ProviderChoice {
    #[serde(default)]
    message: Option<ProviderChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ProviderChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ProviderResponse {
    fn into_text(self) -> String {
        self.choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }
}

/**
 * \brief 面向 OpenAI 兼容 Provider 的补全客户端，无状态，可在请求间共享。
 */
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    settings: Arc<CompletionSettings>,
}

impl CompletionClient {
    pub fn new(settings: CompletionSettings) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            settings: Arc::new(settings),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }

    /**
     * \brief 前置系统提示词并转换角色，得到发往 Provider 的请求体。
     */
    fn build_request<'a>(&'a self, conversation: &'a [ChatTurn]) -> ProviderRequest<'a> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ProviderMessage {
            role: ProviderRole::System,
            content: &self.settings.system_instruction,
        });
        messages.extend(conversation.iter().map(|turn| ProviderMessage {
            role: turn.role.into(),
            content: &turn.content,
        }));
        ProviderRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl ChatCompleter for CompletionClient {
    async fn complete(&self, conversation: &[ChatTurn]) -> Result<ChatReply, CompletionError> {
        let body = self.build_request(conversation);
        tracing::debug!(
            model = body.model,
            turns = body.messages.len(),
            "sending completion request"
        );

        let resp = self
            .http
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.settings.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "provider rejected completion request");
            return Err(CompletionError::Status { status, body: text });
        }

        let raw = resp.text().await?;
        let parsed: ProviderResponse = serde_json::from_str(&raw)?;
        Ok(ChatReply::from_text(parsed.into_text()))
    }
}
