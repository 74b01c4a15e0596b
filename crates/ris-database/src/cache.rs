//! 排班与规则内存缓存
//!
//! RosterService / RulesService 契约为同步读，由这里的快照缓存提供
//! 服务，后台任务带外调用 refresh 重载。读取方看到的是某一时刻的
//! 快照，单次决策内不感知漂移。

use std::collections::HashMap;
use std::sync::RwLock;

use ris_assignment::{RosterService, RulesService};
use ris_core::{AssignmentRule, Result, RisError, RosterEntry};
use sqlx::PgPool;
use tracing::info;

use crate::models::{DbRosterEntry, DbRule};

/// 排班缓存，按班次ID分组
pub struct RosterCache {
    entries: RwLock<HashMap<i64, Vec<RosterEntry>>>,
}

impl RosterCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// 从数据库重载全量排班
    pub async fn refresh(&self, pool: &PgPool) -> Result<()> {
        let rows = sqlx::query_as::<_, DbRosterEntry>(
            "SELECT id, shift_id, radiologist_id, start_date, end_date, status
             FROM roster_entries WHERE status = 'active'
             ORDER BY shift_id, id",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        let entries: Vec<RosterEntry> = rows.into_iter().map(RosterEntry::from).collect();
        let total = entries.len();
        self.replace(entries);

        info!("roster cache refreshed with {} entries", total);
        Ok(())
    }

    /// 用给定条目替换整个快照
    pub fn replace(&self, entries: Vec<RosterEntry>) {
        let mut grouped: HashMap<i64, Vec<RosterEntry>> = HashMap::new();
        for entry in entries {
            grouped.entry(entry.shift_id).or_default().push(entry);
        }
        *self.entries.write().unwrap() = grouped;
    }
}

impl Default for RosterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterService for RosterCache {
    fn get_by_shift(&self, shift_id: i64) -> Vec<RosterEntry> {
        self.entries
            .read()
            .unwrap()
            .get(&shift_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// 规则缓存，仅保存启用的规则
pub struct RulesCache {
    rules: RwLock<Vec<AssignmentRule>>,
}

impl RulesCache {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
        }
    }

    /// 从数据库重载启用的规则
    pub async fn refresh(&self, pool: &PgPool) -> Result<()> {
        let rows = sqlx::query_as::<_, DbRule>(
            "SELECT id, name, priority_order, condition_filters, action_type,
                    action_target, enabled, created_at, updated_at
             FROM assignment_rules WHERE enabled = TRUE
             ORDER BY priority_order ASC, id ASC",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| RisError::Database(e.to_string()))?;

        let rules: Vec<AssignmentRule> = rows.into_iter().filter_map(DbRule::into_rule).collect();
        let total = rules.len();
        self.replace(rules);

        info!("rules cache refreshed with {} active rules", total);
        Ok(())
    }

    /// 用给定规则替换整个快照
    pub fn replace(&self, rules: Vec<AssignmentRule>) {
        *self.rules.write().unwrap() = rules;
    }
}

impl Default for RulesCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesService for RulesCache {
    fn get_active(&self) -> Vec<AssignmentRule> {
        self.rules.read().unwrap().clone()
    }
}
