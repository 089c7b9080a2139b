//! # 条件轮询层
//!
//! 整个探针的同步原语：以有界轮询的方式，把异步渐趋一致的页面状态桥接给
//! 同步的测试代码。成功立即返回，预期内的瞬态错误继续轮询，致命错误立即
//! 中止，超出预算返回超时及最后一次观察到的错误。
//!
//! ## 模块结构
//! - `condition`: 条件种类及其 DOM 探测脚本
//! - `poller`: 轮询循环实现

pub mod condition;
pub mod poller;

pub use condition::{Condition, ElementHandle, ElementRect};
pub use poller::{ConditionPoller, WaitOutcome, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};
