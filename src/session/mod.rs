//! # 会话管理层
//!
//! 管理浏览器会话的生命周期：每个并发工作线程恰好拥有一个会话，由注册表
//! 以按工作线程粒度的互斥来保证，工作线程之间互不阻塞。
//!
//! ## 主要功能
//! - **会话获取**: 首次使用时惰性创建，同一工作线程重复获取返回同一会话
//! - **状态机**: `Initializing → Ready → Closing → Closed`，只能前进
//! - **作用域释放**: 闭包在任何退出路径上都会释放会话，包括出错时
//! - **整体清理**: 套件收尾时批量释放，单个失败不阻塞其余会话
//!
//! ## 模块结构
//! - `traits`: 状态机与后端 seam 的定义
//! - `session`: 会话实现
//! - `registry`: 注册表实现
//! - `backend`: 生产后端，按工作线程启动浏览器进程
//! - `mock`: 用于测试的脚本化后端

pub mod backend;
pub mod mock;
pub mod registry;
pub mod session;
pub mod traits;

#[cfg(test)]
mod tests;

pub use traits::{SessionBackend, SessionState, SessionTransport};

// Re-export implementation structs
pub use backend::LauncherBackend;
pub use registry::{ReleaseReport, SessionGuard, SessionRegistry};
pub use session::Session;

// Re-export mock implementations for testing
pub use mock::MockSessionBackend;
