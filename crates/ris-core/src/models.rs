//! 核心数据模型定义

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::parse_hl7_timestamp;

/// 分流到工作列表时写入分配记录的哨兵医生ID
pub const WORKLIST_RADIOLOGIST_ID: &str = "WORKLIST";

/// 负载均衡决策路径标记
pub const STRATEGY_LOAD_BALANCED: &str = "load_balanced";

/// 待分配的影像检查
///
/// 每次分配决策的输入，决策期间不可变。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study {
    pub id: String,
    pub site: String,
    /// HL7格式检查时间戳 (YYYYMMDDHHMMSS)；缺失时回退到 ingest_time
    pub timestamp: String,
    pub modality: String, // 检查设备类型 (CT, MRI, US, XR)
    pub body_part: String,
    pub urgency: String, // 自由标签，如 STAT / ROUTINE
    pub procedure_code: String,
    pub procedure_description: String,
    pub ordering_physician: String,
    pub patient_age: i32, // 患者年龄（岁）
    pub ingest_time: DateTime<Utc>,
    pub prior_location: String,
    pub technician: String,
    pub transcriptionist: String,
}

impl Study {
    /// 检查发生时间：优先解析HL7时间戳，失败时回退到接收时间
    pub fn exam_time(&self) -> DateTime<Utc> {
        if self.timestamp.is_empty() {
            return self.ingest_time;
        }
        parse_hl7_timestamp(&self.timestamp).unwrap_or(self.ingest_time)
    }
}

/// 班次：按工作类型和院区划分的命名工作池
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: i64,
    pub name: String,
    /// 工作类型标签，可为斜杠分隔的复合标签，如 "MRI/MSK"
    pub work_type: String,
    pub sites: Vec<String>,
    pub priority_level: i32, // 数值越大越优先，仅用于并列裁决
    pub required_credentials: Vec<String>,
}

/// 启用状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivationStatus {
    Active,
    Inactive,
}

/// 排班条目：放射科医生与班次的日期绑定
///
/// (shift_id, radiologist_id, start_date) 唯一确定一条排班。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub id: i64,
    pub shift_id: i64,
    pub radiologist_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub status: ActivationStatus,
}

/// 放射科医生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Radiologist {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub credentials: Vec<String>,
    pub specialties: Vec<String>,
    /// 最大并行检查数，0 表示不限
    pub max_concurrent_studies: i32,
    pub status: ActivationStatus,
}

/// 规则动作类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    FilterCompetency,
    AssignToRadiologist,
    AssignToShift,
    AssignToWorklist,
    Escalate,
    SoftAlert,
}

impl RuleAction {
    /// 从数据库存储的字符串解析动作类型
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FILTER_COMPETENCY" => Some(Self::FilterCompetency),
            "ASSIGN_TO_RADIOLOGIST" => Some(Self::AssignToRadiologist),
            "ASSIGN_TO_SHIFT" => Some(Self::AssignToShift),
            "ASSIGN_TO_WORKLIST" => Some(Self::AssignToWorklist),
            "ESCALATE" => Some(Self::Escalate),
            "SOFT_ALERT" => Some(Self::SoftAlert),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilterCompetency => "FILTER_COMPETENCY",
            Self::AssignToRadiologist => "ASSIGN_TO_RADIOLOGIST",
            Self::AssignToShift => "ASSIGN_TO_SHIFT",
            Self::AssignToWorklist => "ASSIGN_TO_WORKLIST",
            Self::Escalate => "ESCALATE",
            Self::SoftAlert => "SOFT_ALERT",
        }
    }
}

/// 分配规则
///
/// condition_filters 以 §条件谓词语法 的JSON原样存储：
/// 标量等值、{op, val} 运算对象、或运算对象列表（逻辑与）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub id: i64,
    pub name: String,
    /// 数值越小优先级越高，越先评估
    pub priority_order: i32,
    pub condition_filters: serde_json::Value,
    pub action_type: RuleAction,
    pub action_target: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 分配结果：检查与放射科医生（或工作列表）的绑定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub study_id: String,
    /// 被选医生ID，分流时为 WORKLIST 哨兵值
    pub radiologist_id: String,
    /// 分流时为 0
    pub shift_id: i64,
    pub assigned_at: DateTime<Utc>,
    pub escalated: bool,
    /// 决策路径描述，如 load_balanced 或工作列表名称
    pub strategy: String,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// 该分配是否为工作列表分流
    pub fn is_worklist(&self) -> bool {
        self.radiologist_id == WORKLIST_RADIOLOGIST_ID
    }
}
