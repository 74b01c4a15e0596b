//! 存储接口定义
//!
//! 引擎通过这三个接口借用外部数据，自身不持有可变状态。
//! 实现方须保证并发读安全；批量方法是强制契约，
//! 候选集可达上千人，逐个往返会拖垮p95延迟。

use std::collections::HashMap;

use async_trait::async_trait;
use ris_core::{Assignment, AssignmentRule, Radiologist, Result, RosterEntry, Shift};

/// 主数据存储（读写）
#[async_trait]
pub trait DataStore: Send + Sync {
    /// 按工作类型查询班次；body_part 和 site 供存储端预过滤使用
    async fn get_shifts_by_work_type(
        &self,
        modality: &str,
        body_part: &str,
        site: &str,
    ) -> Result<Vec<Shift>>;

    /// 批量获取放射科医生记录
    async fn get_radiologists(&self, ids: &[String]) -> Result<Vec<Radiologist>>;

    /// 批量获取当前工作量，返回 医生ID -> 在读检查数
    async fn get_radiologist_workloads(&self, ids: &[String]) -> Result<HashMap<String, i64>>;

    /// 持久化分配记录
    async fn save_assignment(&self, assignment: &Assignment) -> Result<()>;
}

/// 排班查询（只读，同步）
///
/// 预期由带外刷新的内存缓存提供服务。
pub trait RosterService: Send + Sync {
    fn get_by_shift(&self, shift_id: i64) -> Vec<RosterEntry>;
}

/// 规则查询（只读，同步）
///
/// 只返回启用的规则；顺序无关紧要，引擎自行排序。
pub trait RulesService: Send + Sync {
    fn get_active(&self) -> Vec<AssignmentRule>;
}
