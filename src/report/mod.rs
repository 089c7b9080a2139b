//! # 报告层
//!
//! 结构化事件的外部出口：等待的开始与结果、每次动作尝试、重试与最终失败,
//! 以及失败取证截图。纯下沉通道，事件处理的任何失败都不得影响探针本身的
//! 成败。

mod sink;

pub use sink::{FileScreenshotSink, NullSink, ProbeEvent, RecordingSink};
pub use sink::EventSink;
