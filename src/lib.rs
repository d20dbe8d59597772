//! Hive - 多智能体编排系统
//!
//! 单轮对话的扇出/扇入流水线：意图分类 → 按意图执行（M365 数据 / 通用知识） → 应答合成，
//! 整体受一个墙钟超时约束。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排核心（意图分类、按意图执行、应答合成、流水线）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **m365**: Microsoft 365 Copilot 连接器（Graph Chat API / Mock）
//! - **observability**: tracing 初始化
//! - **state**: 会话级状态存储（跨轮缓存，如 Copilot 会话 ID）

pub mod config;
pub mod core;
pub mod llm;
pub mod m365;
pub mod observability;
pub mod state;
