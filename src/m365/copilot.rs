//! Microsoft 365 Copilot Chat API 连接器
//!
//! 两步调用模式：先创建（或复用缓存的）Copilot 会话，再向会话发送消息取回
//! 自然语言结果。会话 ID 按对话键缓存在 ConversationStateManager 中，跨轮复用。
//! Token 获取与交换属于外部引导层，这里只消费构造时传入的 Bearer Token。

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::TurnContext;
use crate::state::ConversationStateManager;

/// 会话状态中缓存 Copilot 会话 ID 的键
const CONVERSATION_ID_KEY: &str = "m365_conversation_id";

/// Copilot 连接器操作（按意图类型分派）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CopilotOperation {
    QueryEmails,
    QueryCalendar,
    QueryFiles,
    QueryPeople,
}

impl CopilotOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CopilotOperation::QueryEmails => "QueryEmails",
            CopilotOperation::QueryCalendar => "QueryCalendar",
            CopilotOperation::QueryFiles => "QueryFiles",
            CopilotOperation::QueryPeople => "QueryPeople",
        }
    }
}

/// 连接器错误：保留 HTTP 状态语义，上层据此决定用户话术或通用失败路径
#[derive(Debug, Error)]
pub enum CopilotError {
    #[error("unauthorized (401)")]
    Unauthorized,

    #[error("forbidden (403)")]
    Forbidden,

    #[error("not found (404)")]
    NotFound,

    #[error("server error (5xx)")]
    ServerError,

    #[error("unexpected status: {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl CopilotError {
    /// 已映射状态对应的固定用户话术；None 表示走通用失败路径
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            CopilotError::Unauthorized => Some("Your session has expired. Please log in again."),
            CopilotError::Forbidden => Some(
                "You don't have access to Microsoft 365 Copilot. \
                 Please contact your administrator to verify your license.",
            ),
            CopilotError::NotFound => {
                Some("The Copilot service is not available. Please try again later.")
            }
            CopilotError::ServerError => {
                Some("The Copilot service encountered an error. Please try again later.")
            }
            _ => None,
        }
    }

    fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 => CopilotError::Unauthorized,
            403 => CopilotError::Forbidden,
            404 => CopilotError::NotFound,
            500..=599 => CopilotError::ServerError,
            code => CopilotError::Status(code),
        }
    }
}

/// M365 连接器 trait：按操作与子查询取回文本结果
#[async_trait]
pub trait CopilotConnector: Send + Sync {
    async fn invoke(
        &self,
        operation: CopilotOperation,
        query: &str,
        turn: &TurnContext,
    ) -> Result<String, CopilotError>;
}

#[derive(Debug, Deserialize)]
struct CopilotConversation {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: ChatText<'a>,
    location_hint: LocationHint<'a>,
}

#[derive(Debug, Serialize)]
struct ChatText<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationHint<'a> {
    time_zone: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    text: Option<String>,
}

/// Graph Copilot 客户端：POST /copilot/conversations 建会话，
/// POST /copilot/conversations/{id}/microsoft.graph.copilot.chat 发消息
pub struct GraphCopilotClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    time_zone: String,
    state: Arc<ConversationStateManager>,
}

impl GraphCopilotClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        time_zone: impl Into<String>,
        state: Arc<ConversationStateManager>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
            time_zone: time_zone.into(),
            state,
        }
    }

    /// 取缓存的 Copilot 会话 ID，没有则创建并写回状态存储
    async fn ensure_conversation(&self, turn: &TurnContext) -> Result<String, CopilotError> {
        if let Some(value) = self
            .state
            .get_value(&turn.conversation_id, CONVERSATION_ID_KEY)
            .await
        {
            if let Some(id) = value.as_str() {
                return Ok(id.to_string());
            }
        }

        tracing::info!(request = %turn.request_id, "Creating Copilot conversation");
        let response = self
            .http
            .post(format!("{}/copilot/conversations", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CopilotError::from_status(response.status()));
        }

        let conversation: CopilotConversation = response
            .json()
            .await
            .map_err(|e| CopilotError::Protocol(e.to_string()))?;
        let id = conversation
            .id
            .ok_or_else(|| CopilotError::Protocol("no conversation id returned".to_string()))?;

        self.state
            .set_value(
                &turn.conversation_id,
                CONVERSATION_ID_KEY,
                serde_json::Value::String(id.clone()),
            )
            .await;
        tracing::info!(request = %turn.request_id, conversation = %id, "Created Copilot conversation");

        Ok(id)
    }
}

#[async_trait]
impl CopilotConnector for GraphCopilotClient {
    async fn invoke(
        &self,
        operation: CopilotOperation,
        query: &str,
        turn: &TurnContext,
    ) -> Result<String, CopilotError> {
        tracing::info!(
            request = %turn.request_id,
            operation = operation.as_str(),
            "Calling Copilot Chat API"
        );

        let conversation_id = self.ensure_conversation(turn).await?;
        let url = format!(
            "{}/copilot/conversations/{}/microsoft.graph.copilot.chat",
            self.base_url, conversation_id
        );
        let body = ChatRequest {
            message: ChatText { text: query },
            location_hint: LocationHint {
                time_zone: &self.time_zone,
            },
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CopilotError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CopilotError::from_status(response.status()));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CopilotError::Protocol(e.to_string()))?;

        // 取最后一条（助手）消息；列表为空或消息无正文时给出固定文案
        Ok(match chat.messages.last() {
            None => "No response received from Copilot.".to_string(),
            Some(message) => message
                .text
                .clone()
                .unwrap_or_else(|| "No response content.".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_mapping() {
        assert!(CopilotError::Unauthorized
            .user_message()
            .unwrap()
            .contains("session has expired"));
        assert!(CopilotError::Forbidden
            .user_message()
            .unwrap()
            .contains("administrator"));
        assert!(CopilotError::NotFound
            .user_message()
            .unwrap()
            .contains("not available"));
        assert!(CopilotError::ServerError
            .user_message()
            .unwrap()
            .contains("try again later"));
        assert!(CopilotError::Transport("boom".to_string())
            .user_message()
            .is_none());
        assert!(CopilotError::Status(429).user_message().is_none());
    }

    #[test]
    fn test_from_status() {
        assert!(matches!(
            CopilotError::from_status(reqwest::StatusCode::UNAUTHORIZED),
            CopilotError::Unauthorized
        ));
        assert!(matches!(
            CopilotError::from_status(reqwest::StatusCode::BAD_GATEWAY),
            CopilotError::ServerError
        ));
        assert!(matches!(
            CopilotError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS),
            CopilotError::Status(429)
        ));
    }
}
