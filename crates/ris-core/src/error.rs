//! 错误定义模块

use thiserror::Error;

/// RIS系统统一错误类型
#[derive(Error, Debug)]
pub enum RisError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("无效检查: {0}")]
    InvalidStudy(String),

    #[error("检查 {0} 没有匹配的班次")]
    NoMatchingShifts(String),

    #[error("检查 {0} 的班次上没有可用的放射科医生")]
    NoAvailableRadiologists(String),

    #[error("检查 {study_id} 的候选医生均已满负荷")]
    NoCapacity { study_id: String, escalated: bool },

    #[error("规则评估后检查 {0} 无可选放射科医生")]
    NoRadiologistSelectable(String),

    #[error("保存分配记录失败: {0}")]
    Persistence(String),

    #[error("请求已取消")]
    Cancelled,

    #[error("网络错误: {0}")]
    Network(#[from] std::io::Error),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// RIS系统统一结果类型
pub type Result<T> = std::result::Result<T, RisError>;
