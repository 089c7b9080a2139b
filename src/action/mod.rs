//! # 动作执行层
//!
//! 把一次逻辑 UI 动作（点击、输入、读取、勾选）包装成"先等就绪、再执行、
//! 瞬态失败有界重试"的原子操作，调用方的页面对象代码完全不接触同步细节。
//!
//! ## 模块结构
//! - `retry`: 有界重试策略
//! - `executor`: 动作执行器实现

pub mod executor;
pub mod retry;


pub use executor::{Action, ActionExecutor, ActionOutcome};
pub use retry::RetryPolicy;
