//! # RIS Web模块
//!
//! 对外HTTP接口：分配模拟端点、规则只读视图与健康检查。

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::WebServer;
