//! 会话级状态存储
//!
//! 按对话键保存跨轮的键值状态（如缓存的 Copilot 会话 ID）。同一对话键的读写
//! 由锁串行化，不同对话互不相关；编排核心把其中的值当作不透明数据透传。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// 单个对话的状态：键值对 + 最后活跃时间
#[derive(Debug)]
struct ConversationState {
    values: HashMap<String, serde_json::Value>,
    last_active: DateTime<Utc>,
}

impl ConversationState {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            last_active: Utc::now(),
        }
    }
}

/// 内存会话状态存储
#[derive(Debug, Default)]
pub struct ConversationStateManager {
    storage: RwLock<HashMap<String, ConversationState>>,
}

impl ConversationStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取指定对话的单个键；不存在返回 None
    pub async fn get_value(&self, conversation_id: &str, key: &str) -> Option<serde_json::Value> {
        let storage = self.storage.read().await;
        storage
            .get(conversation_id)
            .and_then(|state| state.values.get(key).cloned())
    }

    /// 写入指定对话的单个键，并刷新最后活跃时间
    pub async fn set_value(&self, conversation_id: &str, key: &str, value: serde_json::Value) {
        let mut storage = self.storage.write().await;
        let state = storage
            .entry(conversation_id.to_string())
            .or_insert_with(ConversationState::new);
        state.values.insert(key.to_string(), value);
        state.last_active = Utc::now();
    }

    /// 批量更新指定对话的多个键
    pub async fn update(&self, conversation_id: &str, updates: HashMap<String, serde_json::Value>) {
        let mut storage = self.storage.write().await;
        let state = storage
            .entry(conversation_id.to_string())
            .or_insert_with(ConversationState::new);
        state.values.extend(updates);
        state.last_active = Utc::now();
    }

    /// 清空指定对话的全部状态
    pub async fn clear(&self, conversation_id: &str) {
        let mut storage = self.storage.write().await;
        storage.remove(conversation_id);
    }

    /// 清理空闲超过 max_idle_secs 的对话，返回清理数量
    pub async fn cleanup_expired(&self, max_idle_secs: u64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_idle_secs as i64);
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, state| state.last_active > cutoff);
        before - storage.len()
    }

    /// 当前持有状态的对话数
    pub async fn active_count(&self) -> usize {
        self.storage.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conversations_are_isolated() {
        let manager = ConversationStateManager::new();
        manager
            .set_value("conv-a", "k", serde_json::json!("va"))
            .await;

        assert_eq!(
            manager.get_value("conv-a", "k").await,
            Some(serde_json::json!("va"))
        );
        assert_eq!(manager.get_value("conv-b", "k").await, None);
    }

    #[tokio::test]
    async fn test_update_merges_keys() {
        let manager = ConversationStateManager::new();
        manager.set_value("conv", "a", serde_json::json!(1)).await;

        let mut updates = HashMap::new();
        updates.insert("a".to_string(), serde_json::json!(2));
        updates.insert("b".to_string(), serde_json::json!("x"));
        manager.update("conv", updates).await;

        assert_eq!(
            manager.get_value("conv", "a").await,
            Some(serde_json::json!(2))
        );
        assert_eq!(
            manager.get_value("conv", "b").await,
            Some(serde_json::json!("x"))
        );
    }

    #[tokio::test]
    async fn test_clear_removes_conversation() {
        let manager = ConversationStateManager::new();
        manager.set_value("conv", "k", serde_json::json!(1)).await;
        manager.clear("conv").await;

        assert_eq!(manager.get_value("conv", "k").await, None);
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let manager = ConversationStateManager::new();
        manager.set_value("conv", "k", serde_json::json!(1)).await;

        // 空闲阈值为 0 时，刚写入的会话尚未过期
        assert_eq!(manager.cleanup_expired(3600).await, 0);
        assert_eq!(manager.active_count().await, 1);

        // 把最后活跃时间拨回过去后应被清理
        {
            let mut storage = manager.storage.write().await;
            storage.get_mut("conv").unwrap().last_active =
                Utc::now() - chrono::Duration::seconds(7200);
        }
        assert_eq!(manager.cleanup_expired(3600).await, 1);
        assert_eq!(manager.active_count().await, 0);
    }
}
