//! # RIS分配引擎模块
//!
//! 提供入站检查到放射科医生的自动分配能力，包括：
//! - 规则匹配器：对异构条件谓词求值
//! - 规则管线：按优先级收窄、改派、标记或分流候选集
//! - 排班解析：从班次展开去重后的候选医生集
//! - 容量过滤与负载均衡：批量读取工作量并选出负载最低者
//! - 引擎门面：编排六个阶段并产出分配记录

pub mod candidate;
pub mod clock;
pub mod engine;
pub mod matcher;
pub mod pipeline;
pub mod stores;
pub mod workload;

// 重新导出主要类型
pub use candidate::{Candidate, RosterResolver};
pub use clock::{Clock, SystemClock};
pub use engine::Engine;
pub use matcher::RuleMatcher;
pub use pipeline::{PipelineOutcome, RulePipeline};
pub use stores::{DataStore, RosterService, RulesService};
pub use workload::{CapacityFilter, LoadBalancer};
