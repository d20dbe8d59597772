//! 编排流水线
//!
//! 单轮主流程：校验 → 意图分类 → 按意图执行（并行/串行） → 应答合成，整体受
//! 一个墙钟超时约束。每轮恰好产出一条回复文本；所有失败模式都映射为固定的
//! 用户文案，内部原因仅记录日志，绝不外泄。

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::{timeout, Duration};

use crate::config::OrchestrationSection;
use crate::core::{
    AgentResponse, Intent, IntentClassifier, IntentExecutor, OrchestratorError,
    ResponseSynthesizer, TurnContext,
};
use crate::llm::LlmClient;
use crate::m365::CopilotConnector;

/// 入站消息长度上限（字符数）
pub const MAX_MESSAGE_LENGTH: usize = 4000;

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";
pub const TIMEOUT_REPLY: &str =
    "The request timed out. Please try a simpler query or try again later.";
pub const GENERIC_FAILURE_REPLY: &str =
    "Sorry, an error occurred processing your request. Please try again.";

/// 超长消息的拒绝文案
pub fn message_too_long_reply() -> String {
    format!(
        "Message too long. Maximum {} characters allowed.",
        MAX_MESSAGE_LENGTH
    )
}

/// 编排器：持有长生命周期依赖（完成服务、连接器、配置），按轮驱动流水线
pub struct Orchestrator {
    classifier: IntentClassifier,
    synthesizer: ResponseSynthesizer,
    llm: Arc<dyn LlmClient>,
    copilot: Arc<dyn CopilotConnector>,
    settings: OrchestrationSection,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        copilot: Arc<dyn CopilotConnector>,
        settings: OrchestrationSection,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            synthesizer: ResponseSynthesizer::new(llm.clone()),
            llm,
            copilot,
            settings,
        }
    }

    /// 处理一条入站消息，返回唯一一条出站回复；绝不抛错
    pub async fn handle_turn(&self, conversation_id: &str, message: &str) -> String {
        let message = message.trim();
        if message.is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return message_too_long_reply();
        }

        let turn = TurnContext::new(conversation_id);
        tracing::info!(request = %turn.request_id, "Processing message");

        let budget = Duration::from_secs(self.settings.timeout_seconds);
        match timeout(budget, self.run_stages(&turn, message)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                tracing::error!(request = %turn.request_id, error = %e, "Error processing message");
                GENERIC_FAILURE_REPLY.to_string()
            }
            Err(_) => {
                tracing::warn!(
                    request = %turn.request_id,
                    timeout_seconds = self.settings.timeout_seconds,
                    "Request timed out"
                );
                TIMEOUT_REPLY.to_string()
            }
        }
    }

    /// 分类 → 执行 → 合成；在 handle_turn 的超时包络内运行
    async fn run_stages(
        &self,
        turn: &TurnContext,
        message: &str,
    ) -> Result<String, OrchestratorError> {
        tracing::info!(request = %turn.request_id, "Step 1: Analyzing intent");
        let mut intents = self.classifier.classify(message).await;
        if intents.len() > self.settings.max_agent_calls {
            tracing::warn!(
                request = %turn.request_id,
                from = intents.len(),
                to = self.settings.max_agent_calls,
                "Truncating intents"
            );
            intents.truncate(self.settings.max_agent_calls);
        }
        tracing::info!(
            request = %turn.request_id,
            count = intents.len(),
            types = %intents
                .iter()
                .map(|i| i.intent_type.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            "Detected intents"
        );

        tracing::info!(
            request = %turn.request_id,
            parallel = self.settings.enable_parallel_execution,
            "Step 2: Executing agents"
        );
        let responses = self.execute_intents(turn, &intents).await;
        for response in responses.iter().filter(|r| !r.success) {
            tracing::warn!(
                request = %turn.request_id,
                agent = %response.agent,
                intent = response.intent_type.as_str(),
                "Agent branch failed"
            );
        }

        tracing::info!(request = %turn.request_id, "Step 3: Synthesizing response");
        let reply = self.synthesizer.synthesize(message, &responses).await?;

        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::debug!(
            request = %turn.request_id,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "LLM token usage"
        );

        Ok(reply)
    }

    /// 执行全部意图：并行模式逐个 spawn 后汇合，串行模式按序逐个执行。
    /// 两种模式的结果都与输入意图按下标一一对应。
    async fn execute_intents(&self, turn: &TurnContext, intents: &[Intent]) -> Vec<AgentResponse> {
        let executor = Arc::new(IntentExecutor::new(self.llm.clone(), self.copilot.clone()));

        if self.settings.enable_parallel_execution {
            let handles: Vec<_> = intents
                .iter()
                .map(|intent| {
                    let executor = executor.clone();
                    let intent = intent.clone();
                    let turn = turn.clone();
                    tokio::spawn(async move { executor.execute(&intent, &turn).await })
                })
                .collect();

            join_all(handles)
                .await
                .into_iter()
                .zip(intents)
                .map(|(joined, intent)| match joined {
                    Ok(response) => response,
                    // 分支任务整体崩溃（panic）也折叠为该意图位置上的失败响应
                    Err(e) => {
                        tracing::error!(
                            request = %turn.request_id,
                            intent = intent.intent_type.as_str(),
                            error = %e,
                            "Agent task failed"
                        );
                        AgentResponse::failed(
                            intent.intent_type.as_str(),
                            intent.intent_type,
                            e.to_string(),
                        )
                    }
                })
                .collect()
        } else {
            let mut responses = Vec::with_capacity(intents.len());
            for intent in intents {
                responses.push(executor.execute(intent, turn).await);
            }
            responses
        }
    }
}
