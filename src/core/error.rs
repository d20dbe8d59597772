//! 编排错误类型
//!
//! 各组件自吸收其领域内的失败（分类回退、单意图失败响应、合成兜底文案），
//! 能逃逸到流水线层的只剩这里的错误，由流水线映射为固定用户文案并记录日志。

use thiserror::Error;

/// 编排过程中可能逃逸到流水线层的错误
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// 合成阶段的 LLM 调用失败（分类与单意图执行各自就地吸收，不会走到这里）
    #[error("LLM error: {0}")]
    Llm(String),
}
