//! Mock Copilot 连接器（无 Graph Token 时的本地运行与测试）

use async_trait::async_trait;

use crate::core::TurnContext;
use crate::m365::{CopilotConnector, CopilotError, CopilotOperation};

/// Mock 连接器：按操作返回固定样例文本
#[derive(Debug, Default)]
pub struct MockCopilotConnector;

#[async_trait]
impl CopilotConnector for MockCopilotConnector {
    async fn invoke(
        &self,
        operation: CopilotOperation,
        query: &str,
        _turn: &TurnContext,
    ) -> Result<String, CopilotError> {
        let sample = match operation {
            CopilotOperation::QueryEmails => "You have 2 unread emails in your inbox.",
            CopilotOperation::QueryCalendar => "You have a team sync at 10:00 tomorrow.",
            CopilotOperation::QueryFiles => "Your most recent document is Q3-plan.docx.",
            CopilotOperation::QueryPeople => "Your team has 5 members in the Seattle office.",
        };
        Ok(format!("[mock {}] {} (query: {})", operation.as_str(), sample, query))
    }
}
