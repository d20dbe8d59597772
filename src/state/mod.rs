//! 状态层：会话级键值存储

pub mod conversation;

pub use conversation::ConversationStateManager;
