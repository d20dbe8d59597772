//! 意图分类
//!
//! 用 LLM 把一条用户查询分类为一个或多个带子查询的意图。任何解析或调用失败
//! 都回退为单个 GeneralKnowledge 意图（携带原始查询），绝不向上抛错。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, Message};
use crate::m365::CopilotOperation;

/// 意图类型（与分类 Prompt 中的枚举字面量一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentType {
    EmailQuery,
    CalendarQuery,
    FilesQuery,
    PeopleQuery,
    GeneralKnowledge,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::EmailQuery => "EmailQuery",
            IntentType::CalendarQuery => "CalendarQuery",
            IntentType::FilesQuery => "FilesQuery",
            IntentType::PeopleQuery => "PeopleQuery",
            IntentType::GeneralKnowledge => "GeneralKnowledge",
        }
    }

    /// 意图类型 → Copilot 操作的分派表；GeneralKnowledge 没有对应操作
    pub fn copilot_operation(&self) -> Option<CopilotOperation> {
        match self {
            IntentType::EmailQuery => Some(CopilotOperation::QueryEmails),
            IntentType::CalendarQuery => Some(CopilotOperation::QueryCalendar),
            IntentType::FilesQuery => Some(CopilotOperation::QueryFiles),
            IntentType::PeopleQuery => Some(CopilotOperation::QueryPeople),
            IntentType::GeneralKnowledge => None,
        }
    }
}

/// 一条分类出的意图：类型 + 为其抽取的子查询
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub query: String,
    /// 分类置信度，仅作参考，不参与控制流
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Intent {
    /// 回退意图：GeneralKnowledge + 原始查询
    pub fn general_knowledge(query: impl Into<String>) -> Self {
        Self {
            intent_type: IntentType::GeneralKnowledge,
            query: query.into(),
            confidence: None,
        }
    }
}

/// 意图分类器
pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 分类用户查询；返回序列必非空
    pub async fn classify(&self, query: &str) -> Vec<Intent> {
        let prompt = classification_prompt(query);
        let reply = match self.llm.complete(&[Message::user(prompt)]).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Intent classification call failed, defaulting to GeneralKnowledge");
                return vec![Intent::general_knowledge(query)];
            }
        };

        parse_intents(&reply, query)
    }
}

fn classification_prompt(query: &str) -> String {
    format!(
        r#"You are an intent classifier for a multi-agent system. Analyze the user's query and identify which agents should handle it.

Available intent types:
- EmailQuery: Questions about emails, messages, inbox, mail
- CalendarQuery: Questions about meetings, schedule, calendar, appointments
- FilesQuery: Questions about documents, files, SharePoint, OneDrive
- PeopleQuery: Questions about colleagues, organization, team members, expertise
- GeneralKnowledge: General questions not related to Microsoft 365 data

Rules:
1. A query can have multiple intents (e.g., "Summarize my emails and explain REST APIs" has EmailQuery + GeneralKnowledge)
2. If the query mentions personal data (my emails, my calendar, my files, my team), route to the appropriate Microsoft 365 intent
3. If the query is about general concepts, technology, or information not in Microsoft 365, use GeneralKnowledge
4. Extract the relevant sub-query for each intent

User Query: {query}

Respond with ONLY a JSON array, no other text:
[
  {{"type": "IntentType", "query": "extracted sub-query for this intent"}}
]

Example for "What meetings do I have tomorrow and what is Docker?":
[
  {{"type": "CalendarQuery", "query": "What meetings do I have tomorrow"}},
  {{"type": "GeneralKnowledge", "query": "What is Docker"}}
]"#
    )
}

/// 解析 LLM 回复中的意图数组；解析失败、非数组、空数组或全部条目非法时回退
pub(crate) fn parse_intents(reply: &str, original_query: &str) -> Vec<Intent> {
    let json = extract_json_block(reply);

    let items = match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!("Intent response is not an array, defaulting to GeneralKnowledge");
            return vec![Intent::general_knowledge(original_query)];
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse intent JSON, defaulting to GeneralKnowledge");
            return vec![Intent::general_knowledge(original_query)];
        }
    };

    let mut intents = Vec::new();
    for item in items {
        match serde_json::from_value::<Intent>(item.clone()) {
            Ok(intent) if !intent.query.trim().is_empty() => intents.push(intent),
            Ok(_) => tracing::warn!(item = %item, "Dropping intent with empty query"),
            Err(e) => tracing::warn!(item = %item, error = %e, "Dropping invalid intent item"),
        }
    }

    if intents.is_empty() {
        tracing::warn!("No valid intents parsed, defaulting to GeneralKnowledge");
        return vec![Intent::general_knowledge(original_query)];
    }

    intents
}

/// 提取回复中的 JSON 文本：优先 ```json 围栏，其次任意 ``` 围栏，否则整段去空白
pub(crate) fn extract_json_block(reply: &str) -> &str {
    let trimmed = reply.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        return match rest.find("```") {
            Some(end) => rest[..end].trim(),
            None => rest.trim(),
        };
    }

    trimmed
}
