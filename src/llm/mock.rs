//! Mock LLM 客户端（无 API Key 时的本地运行与测试）
//!
//! 取最后一条 User 消息回显。意图解析在回显文本上必然失败并回退为
//! GeneralKnowledge，随后通用知识与合成两步同样拿到回显，整条流水线可在
//! 无任何外部服务的情况下跑通。

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!("Mock reply: {}", last_user))
    }
}
