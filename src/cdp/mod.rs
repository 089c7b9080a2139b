//! # Chrome DevTools Protocol (CDP) 层
//!
//! 提供与 Chromium 系浏览器的 WebSocket 通信接口，是探针驱动页面的底层传输。
//!
//! ## 主要功能
//! - **WebSocket 连接管理**: 建立和维护与浏览器的 CDP WebSocket 连接
//! - **协议通信**: 发送 CDP 命令并接收响应
//! - **进程启动**: 按浏览器种类构建启动参数并等待 DevTools 端点就绪
//! - **脚本执行**: 在页面上下文中执行 JavaScript 探测脚本
//! - **截图功能**: 失败取证用的页面截图
//!
//! ## 模块结构
//! - `traits`: CDP 操作的核心 trait 定义
//! - `types`: CDP 协议相关的数据类型
//! - `connection`: WebSocket 连接实现
//! - `client`: CDP 客户端实现
//! - `launcher`: 浏览器进程启动与附着
//! - `mock`: 用于测试的脚本化 Mock 实现

pub mod client;
pub mod connection;
pub mod launcher;
pub mod mock;
pub mod traits;
pub mod types;

pub use traits::{
    CdpClient, CdpConnection, CdpError, CdpResponse, EvaluationResult, NavigationResult,
    ScreenshotFormat,
};

// Re-export implementation structs
pub use client::CdpClientImpl;
pub use connection::CdpWebSocketConnection;
pub use launcher::{LaunchProfile, LaunchedBrowser};

// Re-export mock for development/testing
pub use mock::{MockCdpClient, ScriptedEval};
