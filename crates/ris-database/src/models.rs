//! 数据库模型

use chrono::{DateTime, NaiveDate, Utc};
use ris_core::models::*;
use sqlx::FromRow;
use tracing::warn;

// 数据库表模型 - 使用FromRow trait用于SQL查询

fn parse_status(s: &str) -> ActivationStatus {
    match s {
        "active" => ActivationStatus::Active,
        _ => ActivationStatus::Inactive,
    }
}

/// 数据库班次表
#[derive(Debug, FromRow)]
pub struct DbShift {
    pub id: i64,
    pub name: String,
    pub work_type: String,
    pub sites: Vec<String>,
    pub priority_level: i32,
    pub required_credentials: Vec<String>,
}

impl From<DbShift> for Shift {
    fn from(db_shift: DbShift) -> Self {
        Shift {
            id: db_shift.id,
            name: db_shift.name,
            work_type: db_shift.work_type,
            sites: db_shift.sites,
            priority_level: db_shift.priority_level,
            required_credentials: db_shift.required_credentials,
        }
    }
}

/// 数据库放射科医生表
#[derive(Debug, FromRow)]
pub struct DbRadiologist {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub credentials: Vec<String>,
    pub specialties: Vec<String>,
    pub max_concurrent_studies: i32,
    pub status: String, // 存储为字符串，转换为ActivationStatus枚举
}

impl From<DbRadiologist> for Radiologist {
    fn from(db_rad: DbRadiologist) -> Self {
        Radiologist {
            id: db_rad.id,
            first_name: db_rad.first_name,
            last_name: db_rad.last_name,
            credentials: db_rad.credentials,
            specialties: db_rad.specialties,
            max_concurrent_studies: db_rad.max_concurrent_studies,
            status: parse_status(&db_rad.status),
        }
    }
}

/// 数据库排班表
#[derive(Debug, FromRow)]
pub struct DbRosterEntry {
    pub id: i64,
    pub shift_id: i64,
    pub radiologist_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: String,
}

impl From<DbRosterEntry> for RosterEntry {
    fn from(db_entry: DbRosterEntry) -> Self {
        RosterEntry {
            id: db_entry.id,
            shift_id: db_entry.shift_id,
            radiologist_id: db_entry.radiologist_id,
            start_date: db_entry.start_date,
            end_date: db_entry.end_date,
            status: parse_status(&db_entry.status),
        }
    }
}

/// 数据库分配规则表
#[derive(Debug, FromRow)]
pub struct DbRule {
    pub id: i64,
    pub name: String,
    pub priority_order: i32,
    pub condition_filters: serde_json::Value,
    pub action_type: String,
    pub action_target: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRule {
    /// 转换为领域规则；动作类型不可识别的规则被丢弃
    pub fn into_rule(self) -> Option<AssignmentRule> {
        let Some(action_type) = RuleAction::parse(&self.action_type) else {
            warn!(
                "rule {} has unknown action type {:?}, skipping",
                self.id, self.action_type
            );
            return None;
        };
        Some(AssignmentRule {
            id: self.id,
            name: self.name,
            priority_order: self.priority_order,
            condition_filters: self.condition_filters,
            action_type,
            action_target: self.action_target,
            enabled: self.enabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
