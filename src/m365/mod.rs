//! M365 层：Copilot 连接器抽象与实现（Graph Chat API / Mock）

pub mod copilot;
pub mod mock;

pub use copilot::{CopilotConnector, CopilotError, CopilotOperation, GraphCopilotClient};
pub use mock::MockCopilotConnector;
