//! 应答合成
//!
//! 将各意图的执行结果合成为一段连贯回复。仅 success=true 的结果进入合成输入
//! （失败结果在此静默过滤）；LLM 空回复折叠为固定兜底文案，调用失败则上抛，
//! 由流水线映射为通用失败文案。

use std::sync::Arc;

use serde::Serialize;

use crate::core::{AgentResponse, OrchestratorError};
use crate::llm::{LlmClient, Message};

/// 合成输入中单条结果的序列化形态
#[derive(Serialize)]
struct SynthesisItem<'a> {
    agent: &'a str,
    intent_type: &'a str,
    content: &'a str,
}

/// 应答合成器
pub struct ResponseSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 合成最终回复；零条成功结果时仍发起合成调用
    pub async fn synthesize(
        &self,
        original_query: &str,
        responses: &[AgentResponse],
    ) -> Result<String, OrchestratorError> {
        let formatted = format_responses(responses);
        let prompt = synthesis_prompt(original_query, &formatted);

        let reply = self
            .llm
            .complete(&[Message::user(prompt)])
            .await
            .map_err(OrchestratorError::Llm)?;

        if reply.trim().is_empty() {
            return Ok("I couldn't generate a response.".to_string());
        }

        Ok(reply)
    }
}

/// 过滤失败结果并序列化为 JSON 文本块
pub(crate) fn format_responses(responses: &[AgentResponse]) -> String {
    let items: Vec<SynthesisItem> = responses
        .iter()
        .filter(|r| r.success)
        .map(|r| SynthesisItem {
            agent: &r.agent,
            intent_type: r.intent_type.as_str(),
            content: &r.content,
        })
        .collect();

    serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
}

fn synthesis_prompt(original_query: &str, responses: &str) -> String {
    format!(
        r#"You are a response synthesizer. Your job is to combine multiple agent responses into a single,
coherent response that addresses the user's original query.

Original User Query: {original_query}

Agent Responses:
{responses}

Instructions:
1. Analyze all the agent responses
2. Combine them into a single, well-organized response
3. Maintain clear structure - if there are multiple topics, organize them with headers or clear transitions
4. Remove any redundancy between responses
5. Ensure the response directly addresses the user's original query
6. Keep the tone helpful and conversational
7. If one response is about Microsoft 365 data (emails, calendar, etc.) and another is general knowledge,
   present the Microsoft 365 data first, then the general information

Synthesized Response:
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::IntentType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 回显收到的 Prompt，便于断言合成输入
    struct EchoLlm;

    #[async_trait]
    impl LlmClient for EchoLlm {
        async fn complete(&self, messages: &[Message]) -> Result<String, String> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    struct EmptyLlm {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for EmptyLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    #[test]
    fn test_format_filters_failed_responses() {
        let responses = vec![
            AgentResponse::ok("m365_copilot", IntentType::CalendarQuery, "3 meetings"),
            AgentResponse::failed("general_knowledge", IntentType::GeneralKnowledge, "llm down"),
        ];

        let formatted = format_responses(&responses);
        assert!(formatted.contains("3 meetings"));
        assert!(!formatted.contains("llm down"));
        assert!(!formatted.contains("Error:"));
    }

    #[test]
    fn test_format_zero_successes_is_empty_array() {
        let responses = vec![AgentResponse::failed(
            "m365_copilot",
            IntentType::EmailQuery,
            "boom",
        )];
        assert_eq!(format_responses(&responses), "[]");
    }

    #[tokio::test]
    async fn test_synthesis_prompt_carries_query_and_contents() {
        let synthesizer = ResponseSynthesizer::new(Arc::new(EchoLlm));
        let responses = vec![AgentResponse::ok(
            "m365_copilot",
            IntentType::CalendarQuery,
            "You have 3 meetings",
        )];

        let reply = synthesizer
            .synthesize("what meetings do I have", &responses)
            .await
            .unwrap();

        assert!(reply.contains("what meetings do I have"));
        assert!(reply.contains("You have 3 meetings"));
    }

    #[tokio::test]
    async fn test_empty_reply_falls_back() {
        let llm = Arc::new(EmptyLlm {
            calls: AtomicUsize::new(0),
        });
        let synthesizer = ResponseSynthesizer::new(llm.clone());

        let reply = synthesizer.synthesize("query", &[]).await.unwrap();

        assert_eq!(reply, "I couldn't generate a response.");
        // 零条成功结果仍发起了一次合成调用
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
