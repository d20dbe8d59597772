//! 按意图执行
//!
//! 将单个意图分派给对应 responder（M365 连接器 / 通用知识 LLM），并把结果或
//! 失败归一为一条 AgentResponse；任何错误都在此捕获，绝不向调用方抛出。

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Intent, IntentType, TurnContext};
use crate::llm::{LlmClient, Message};
use crate::m365::{CopilotConnector, CopilotOperation};

const AGENT_M365: &str = "m365_copilot";
const AGENT_GENERAL: &str = "general_knowledge";
const AGENT_UNKNOWN: &str = "unknown";

/// 单个意图的执行结果
#[derive(Clone, Debug)]
pub struct AgentResponse {
    /// 产出该结果的 responder 标识
    pub agent: String,
    pub intent_type: IntentType,
    /// 成功时为自然语言结果；失败时为可直接展示的文案
    pub content: String,
    pub success: bool,
    /// 原始失败原因，仅 success=false 时存在，不直接呈现给用户
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentResponse {
    pub fn ok(agent: &str, intent_type: IntentType, content: impl Into<String>) -> Self {
        Self {
            agent: agent.to_string(),
            intent_type,
            content: content.into(),
            success: true,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failed(agent: &str, intent_type: IntentType, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            agent: agent.to_string(),
            intent_type,
            content: format!("Error: {}", error),
            success: false,
            error: Some(error),
            metadata: HashMap::new(),
        }
    }
}

/// 按意图分派的执行器；每轮由流水线重新构造，不跨轮持有可变绑定
pub struct IntentExecutor {
    llm: Arc<dyn LlmClient>,
    copilot: Arc<dyn CopilotConnector>,
}

impl IntentExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, copilot: Arc<dyn CopilotConnector>) -> Self {
        Self { llm, copilot }
    }

    /// 执行单个意图；任何失败都折叠为 success=false 的响应
    pub async fn execute(&self, intent: &Intent, turn: &TurnContext) -> AgentResponse {
        match intent.intent_type {
            IntentType::GeneralKnowledge => self.execute_general_knowledge(intent).await,
            other => match other.copilot_operation() {
                Some(operation) => self.execute_copilot(operation, intent, turn).await,
                // 防御分支：当前枚举下不可达
                None => AgentResponse {
                    agent: AGENT_UNKNOWN.to_string(),
                    intent_type: other,
                    content: "I'm not sure how to handle that request.".to_string(),
                    success: false,
                    error: None,
                    metadata: HashMap::new(),
                },
            },
        }
    }

    async fn execute_copilot(
        &self,
        operation: CopilotOperation,
        intent: &Intent,
        turn: &TurnContext,
    ) -> AgentResponse {
        match self.copilot.invoke(operation, &intent.query, turn).await {
            Ok(content) if content.trim().is_empty() => {
                AgentResponse::ok(AGENT_M365, intent.intent_type, "No response received.")
            }
            Ok(content) => AgentResponse::ok(AGENT_M365, intent.intent_type, content),
            Err(e) => match e.user_message() {
                // 已映射的状态（会话过期、无许可等）作为正常内容呈现
                Some(message) => {
                    tracing::warn!(
                        request = %turn.request_id,
                        intent = intent.intent_type.as_str(),
                        error = %e,
                        "Copilot call failed with mapped status"
                    );
                    AgentResponse::ok(AGENT_M365, intent.intent_type, message)
                }
                None => {
                    tracing::error!(
                        request = %turn.request_id,
                        intent = intent.intent_type.as_str(),
                        error = %e,
                        "Copilot call failed"
                    );
                    AgentResponse::failed(AGENT_M365, intent.intent_type, e.to_string())
                }
            },
        }
    }

    async fn execute_general_knowledge(&self, intent: &Intent) -> AgentResponse {
        let prompt = format!(
            "You are a helpful AI assistant. Answer the following question clearly and concisely.\n\n\
             Question: {}\n\n\
             Provide a clear, accurate answer based on your knowledge.",
            intent.query
        );

        match self.llm.complete(&[Message::user(prompt)]).await {
            Ok(answer) if answer.trim().is_empty() => AgentResponse::ok(
                AGENT_GENERAL,
                intent.intent_type,
                "I'm unable to answer that question at the moment.",
            ),
            Ok(answer) => AgentResponse::ok(AGENT_GENERAL, intent.intent_type, answer),
            Err(e) => {
                tracing::error!(error = %e, "General knowledge call failed");
                AgentResponse::failed(AGENT_GENERAL, intent.intent_type, e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::m365::CopilotError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StaticLlm(&'static str);

    #[async_trait]
    impl LlmClient for StaticLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            Err("llm down".to_string())
        }
    }

    /// 记录被调用的操作并返回固定文本
    struct RecordingCopilot {
        reply: &'static str,
        calls: Mutex<Vec<CopilotOperation>>,
    }

    impl RecordingCopilot {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CopilotConnector for RecordingCopilot {
        async fn invoke(
            &self,
            operation: CopilotOperation,
            _query: &str,
            _turn: &TurnContext,
        ) -> Result<String, CopilotError> {
            self.calls.lock().unwrap().push(operation);
            Ok(self.reply.to_string())
        }
    }

    struct UnauthorizedCopilot;

    #[async_trait]
    impl CopilotConnector for UnauthorizedCopilot {
        async fn invoke(
            &self,
            _operation: CopilotOperation,
            _query: &str,
            _turn: &TurnContext,
        ) -> Result<String, CopilotError> {
            Err(CopilotError::Unauthorized)
        }
    }

    struct BrokenCopilot;

    #[async_trait]
    impl CopilotConnector for BrokenCopilot {
        async fn invoke(
            &self,
            _operation: CopilotOperation,
            _query: &str,
            _turn: &TurnContext,
        ) -> Result<String, CopilotError> {
            Err(CopilotError::Transport("connection reset".to_string()))
        }
    }

    /// 统计 LLM 调用次数的 Copilot，用于确认分派不会误走 LLM 分支
    struct CountingLlm {
        count: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for CountingLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok("answer".to_string())
        }
    }

    fn intent(intent_type: IntentType, query: &str) -> Intent {
        Intent {
            intent_type,
            query: query.to_string(),
            confidence: None,
        }
    }

    #[tokio::test]
    async fn test_email_intent_routes_to_copilot() {
        let copilot = Arc::new(RecordingCopilot::new("3 unread emails"));
        let executor = IntentExecutor::new(Arc::new(StaticLlm("unused")), copilot.clone());
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::EmailQuery, "unread mail"), &turn)
            .await;

        assert!(response.success);
        assert_eq!(response.agent, "m365_copilot");
        assert_eq!(response.content, "3 unread emails");
        assert_eq!(
            copilot.calls.lock().unwrap().as_slice(),
            &[CopilotOperation::QueryEmails]
        );
    }

    #[tokio::test]
    async fn test_each_m365_type_maps_to_its_operation() {
        let cases = [
            (IntentType::EmailQuery, CopilotOperation::QueryEmails),
            (IntentType::CalendarQuery, CopilotOperation::QueryCalendar),
            (IntentType::FilesQuery, CopilotOperation::QueryFiles),
            (IntentType::PeopleQuery, CopilotOperation::QueryPeople),
        ];
        for (intent_type, expected) in cases {
            let copilot = Arc::new(RecordingCopilot::new("ok"));
            let executor = IntentExecutor::new(Arc::new(StaticLlm("unused")), copilot.clone());
            let turn = TurnContext::new("conv");

            executor.execute(&intent(intent_type, "q"), &turn).await;
            assert_eq!(copilot.calls.lock().unwrap().as_slice(), &[expected]);
        }
    }

    #[tokio::test]
    async fn test_empty_copilot_reply_becomes_placeholder() {
        let executor = IntentExecutor::new(
            Arc::new(StaticLlm("unused")),
            Arc::new(RecordingCopilot::new("   ")),
        );
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::CalendarQuery, "meetings"), &turn)
            .await;

        assert!(response.success);
        assert_eq!(response.content, "No response received.");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_session_expired() {
        let executor = IntentExecutor::new(
            Arc::new(StaticLlm("unused")),
            Arc::new(UnauthorizedCopilot),
        );
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::EmailQuery, "mail"), &turn)
            .await;

        assert!(response.success);
        assert!(response.content.contains("session has expired"));
        assert!(response.error.is_none());
    }

    #[tokio::test]
    async fn test_unmapped_error_becomes_failed_response() {
        let executor =
            IntentExecutor::new(Arc::new(StaticLlm("unused")), Arc::new(BrokenCopilot));
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::FilesQuery, "docs"), &turn)
            .await;

        assert!(!response.success);
        assert!(response.content.starts_with("Error: "));
        assert!(response.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_general_knowledge_routes_to_llm() {
        let llm = Arc::new(CountingLlm {
            count: AtomicUsize::new(0),
        });
        let executor = IntentExecutor::new(llm.clone(), Arc::new(RecordingCopilot::new("x")));
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::GeneralKnowledge, "what is Docker"), &turn)
            .await;

        assert!(response.success);
        assert_eq!(response.agent, "general_knowledge");
        assert_eq!(response.content, "answer");
        assert_eq!(llm.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_general_knowledge_empty_reply_becomes_placeholder() {
        let executor = IntentExecutor::new(
            Arc::new(StaticLlm("")),
            Arc::new(RecordingCopilot::new("unused")),
        );
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::GeneralKnowledge, "question"), &turn)
            .await;

        assert!(response.success);
        assert_eq!(
            response.content,
            "I'm unable to answer that question at the moment."
        );
    }

    #[tokio::test]
    async fn test_general_knowledge_error_becomes_failed_response() {
        let executor = IntentExecutor::new(
            Arc::new(FailingLlm),
            Arc::new(RecordingCopilot::new("unused")),
        );
        let turn = TurnContext::new("conv");

        let response = executor
            .execute(&intent(IntentType::GeneralKnowledge, "question"), &turn)
            .await;

        assert!(!response.success);
        assert_eq!(response.content, "Error: llm down");
        assert_eq!(response.error.as_deref(), Some("llm down"));
    }
}
