//! 候选集解析
//!
//! 把匹配到的班次展开为去重后的候选医生集。候选对象仅存活于
//! 单次决策内部，决策结束即丢弃。

use std::collections::HashMap;
use std::sync::Arc;

use ris_core::{ActivationStatus, Radiologist, Result, Shift};
use tracing::debug;

use crate::stores::{DataStore, RosterService};

/// 单次决策内部的候选医生
#[derive(Debug, Clone)]
pub struct Candidate {
    pub radiologist: Radiologist,
    pub shift_id: i64,
    /// 由容量过滤阶段批量查询后写入
    pub current_load: i64,
}

/// 排班解析器
///
/// 班次按入参顺序遍历，医生首次出现时绑定到该班次，
/// 因此每人归属其排班中优先级最高的班次。
pub struct RosterResolver {
    db: Arc<dyn DataStore>,
    roster: Arc<dyn RosterService>,
}

impl RosterResolver {
    pub fn new(db: Arc<dyn DataStore>, roster: Arc<dyn RosterService>) -> Self {
        Self { db, roster }
    }

    /// 解析候选集：首见绑定 + 单次批量取医生 + 剔除停用者
    pub async fn resolve(&self, shifts: &[Shift]) -> Result<Vec<Candidate>> {
        let mut shift_of: HashMap<String, i64> = HashMap::new();
        let mut unique_ids: Vec<String> = Vec::new();

        for shift in shifts {
            for entry in self.roster.get_by_shift(shift.id) {
                if !shift_of.contains_key(&entry.radiologist_id) {
                    shift_of.insert(entry.radiologist_id.clone(), shift.id);
                    unique_ids.push(entry.radiologist_id);
                }
            }
        }

        if unique_ids.is_empty() {
            return Ok(Vec::new());
        }

        // 医生记录必须一次批量取回，禁止逐个往返
        let radiologists = self.db.get_radiologists(&unique_ids).await?;
        debug!(
            "resolved {} roster entries into {} radiologist records",
            unique_ids.len(),
            radiologists.len()
        );

        let mut candidates = Vec::with_capacity(radiologists.len());
        for rad in radiologists {
            if rad.status != ActivationStatus::Active {
                continue;
            }
            let Some(&shift_id) = shift_of.get(&rad.id) else {
                continue;
            };
            candidates.push(Candidate {
                radiologist: rad,
                shift_id,
                current_load: 0,
            });
        }

        Ok(candidates)
    }
}
