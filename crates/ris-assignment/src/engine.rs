//! 分配引擎门面
//!
//! 编排 班次匹配 → 排班解析 → 规则管线 → 容量过滤 → 负载均衡
//! 五个阶段，持有失败分类并产出分配记录。单次 assign 调用内部
//! 严格串行且不持有可变状态，跨请求并发安全完全由存储实现保证。
//! 并发请求可能观察到相同的工作量快照而短暂超出上限一例，
//! 需要严格上限的调用方应在存储层做比较交换。

use std::sync::Arc;

use ris_core::{
    Assignment, Result, RisError, Study, STRATEGY_LOAD_BALANCED, WORKLIST_RADIOLOGIST_ID,
};
use tracing::info;

use crate::candidate::RosterResolver;
use crate::clock::{Clock, SystemClock};
use crate::pipeline::RulePipeline;
use crate::stores::{DataStore, RosterService, RulesService};
use crate::workload::{CapacityFilter, LoadBalancer};

/// 分配引擎
pub struct Engine {
    db: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    resolver: RosterResolver,
    pipeline: RulePipeline,
    capacity: CapacityFilter,
    balancer: LoadBalancer,
}

impl Engine {
    pub fn new(
        db: Arc<dyn DataStore>,
        roster: Arc<dyn RosterService>,
        rules: Arc<dyn RulesService>,
    ) -> Self {
        Self::with_clock(db, roster, rules, Arc::new(SystemClock))
    }

    /// 指定时钟构造，测试用于固定 min_age_minutes 的判定时间
    pub fn with_clock(
        db: Arc<dyn DataStore>,
        roster: Arc<dyn RosterService>,
        rules: Arc<dyn RulesService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver: RosterResolver::new(db.clone(), roster),
            pipeline: RulePipeline::new(rules, clock.clone()),
            capacity: CapacityFilter::new(db.clone()),
            balancer: LoadBalancer,
            db,
            clock,
        }
    }

    /// 为检查选出至多一名放射科医生，或分流到工作列表
    pub async fn assign(&self, study: &Study) -> Result<Assignment> {
        if study.id.is_empty() {
            return Err(RisError::InvalidStudy("检查ID不能为空".to_string()));
        }

        // 1. 按检查特征匹配班次
        let shifts = self
            .db
            .get_shifts_by_work_type(&study.modality, &study.body_part, &study.site)
            .await?;
        if shifts.is_empty() {
            return Err(RisError::NoMatchingShifts(study.id.clone()));
        }

        // 2. 从排班解析去重后的候选医生集
        let candidates = self.resolver.resolve(&shifts).await?;
        if candidates.is_empty() {
            return Err(RisError::NoAvailableRadiologists(study.id.clone()));
        }

        // 3. 规则管线收窄/改派/标记候选集
        let outcome = self.pipeline.apply(study, candidates);

        // 4. 分流：不再走容量与负载阶段，也不持久化
        if let Some(target) = outcome.worklist_target {
            return Ok(Assignment {
                id: 0,
                study_id: study.id.clone(),
                radiologist_id: WORKLIST_RADIOLOGIST_ID.to_string(),
                shift_id: 0,
                assigned_at: study.ingest_time,
                escalated: outcome.escalated,
                strategy: target,
                created_at: self.clock.now(),
            });
        }

        // 5. 容量过滤
        let candidates = self.capacity.filter(outcome.candidates).await?;
        if candidates.is_empty() {
            return Err(RisError::NoCapacity {
                study_id: study.id.clone(),
                escalated: outcome.escalated,
            });
        }

        // 6. 负载均衡选出唯一医生
        let Some(chosen) = self.balancer.pick(&candidates) else {
            return Err(RisError::NoRadiologistSelectable(study.id.clone()));
        };

        let assignment = Assignment {
            id: 0,
            study_id: study.id.clone(),
            radiologist_id: chosen.radiologist.id.clone(),
            shift_id: chosen.shift_id,
            assigned_at: study.ingest_time,
            escalated: outcome.escalated,
            strategy: STRATEGY_LOAD_BALANCED.to_string(),
            created_at: self.clock.now(),
        };

        // 7. 委托存储持久化；失败不回滚候选选择，由调用方决定重试
        if let Err(err) = self.db.save_assignment(&assignment).await {
            return Err(match err {
                RisError::Cancelled => RisError::Cancelled,
                other => RisError::Persistence(other.to_string()),
            });
        }

        info!(
            "study {} assigned to {} on shift {} (escalated: {})",
            study.id, assignment.radiologist_id, assignment.shift_id, assignment.escalated
        );

        Ok(assignment)
    }
}
