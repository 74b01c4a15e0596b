//! 容量过滤与负载均衡

use std::sync::Arc;

use ris_core::Result;
use tracing::debug;

use crate::candidate::Candidate;
use crate::stores::DataStore;

/// 容量过滤器
///
/// 单次批量查询候选集工作量并写入 current_load，
/// 剔除已达上限者；上限 0 表示不限。
pub struct CapacityFilter {
    db: Arc<dyn DataStore>,
}

impl CapacityFilter {
    pub fn new(db: Arc<dyn DataStore>) -> Self {
        Self { db }
    }

    pub async fn filter(&self, mut candidates: Vec<Candidate>) -> Result<Vec<Candidate>> {
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let ids: Vec<String> = candidates
            .iter()
            .map(|c| c.radiologist.id.clone())
            .collect();
        let workloads = self.db.get_radiologist_workloads(&ids).await?;

        for c in &mut candidates {
            c.current_load = workloads.get(&c.radiologist.id).copied().unwrap_or(0);
        }

        let before = candidates.len();
        candidates.retain(|c| {
            c.radiologist.max_concurrent_studies == 0
                || c.current_load < i64::from(c.radiologist.max_concurrent_studies)
        });
        debug!(
            "capacity filter retained {} of {} candidates",
            candidates.len(),
            before
        );

        Ok(candidates)
    }
}

/// 负载均衡器：取当前负载最小的候选
///
/// 负载并列时保留遍历顺序中先出现者，保证决策可复现。
pub struct LoadBalancer;

impl LoadBalancer {
    pub fn pick<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        candidates.iter().min_by_key(|c| c.current_load)
    }
}
