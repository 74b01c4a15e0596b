//! 通用工具函数

use chrono::{DateTime, NaiveDateTime, Utc};

/// 解析HL7格式时间戳 (YYYYMMDDHHMMSS)
pub fn parse_hl7_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(ts, "%Y%m%d%H%M%S")
        .ok()
        .map(|t| t.and_utc())
}

/// 格式化为HL7时间戳
pub fn format_hl7_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y%m%d%H%M%S").to_string()
}
