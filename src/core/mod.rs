//! 编排核心：意图分类、按意图执行、应答合成、流水线

pub mod context;
pub mod error;
pub mod executor;
pub mod intent;
pub mod pipeline;
pub mod synthesis;

pub use context::TurnContext;
pub use error::OrchestratorError;
pub use executor::{AgentResponse, IntentExecutor};
pub use intent::{Intent, IntentClassifier, IntentType};
pub use pipeline::{Orchestrator, MAX_MESSAGE_LENGTH};
pub use synthesis::ResponseSynthesizer;
