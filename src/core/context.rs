//! 轮上下文
//!
//! 每轮请求构造一次，显式传入各 responder 调用；任何组件不得跨轮缓存其中内容。
//! conversation_id 对编排核心是不透明值，仅由连接器用作状态存储的键。

use uuid::Uuid;

/// 单轮请求的上下文：请求追踪 ID + 不透明的对话键
#[derive(Clone, Debug)]
pub struct TurnContext {
    pub request_id: Uuid,
    pub conversation_id: String,
}

impl TurnContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
        }
    }
}
