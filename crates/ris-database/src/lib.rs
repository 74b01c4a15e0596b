//! # RIS数据库模块
//!
//! PostgreSQL存储实现与内存缓存：
//! - 连接池管理与建表
//! - DataStore 的生产实现（批量查询为硬性契约）
//! - 排班与规则的带外刷新缓存

pub mod cache;
pub mod connection;
pub mod models;
pub mod queries;

pub use cache::{RosterCache, RulesCache};
pub use connection::DatabasePool;
pub use queries::PostgresStore;
