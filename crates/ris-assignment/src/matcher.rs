//! 规则匹配器
//!
//! 对规则的异构条件谓词求值：同一属性可写成旧式标量（等值）、
//! {op, val} 运算对象、或运算对象列表（逻辑与）；属性之间为逻辑与。
//! 属性集合是封闭的，通过显式分发求值，不做反射。

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use regex::Regex;
use ris_core::{AssignmentRule, Study};
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Neq,
    Gt,
    Ge,
    Lt,
    Le,
    Regex,
    In,
}

impl CmpOp {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "EQ" => Some(Self::Eq),
            "NEQ" => Some(Self::Neq),
            "GT" => Some(Self::Gt),
            "GE" => Some(Self::Ge),
            "LT" => Some(Self::Lt),
            "LE" => Some(Self::Le),
            "REGEX" => Some(Self::Regex),
            "IN" => Some(Self::In),
            _ => None,
        }
    }
}

/// 条件谓词
#[derive(Debug, Clone)]
enum Predicate {
    /// 旧式标量：等值比较，数字做类型强转
    Eq(Value),
    /// 运算对象 {op, val}
    Op { op: CmpOp, val: Value },
    /// 运算对象列表：逐项逻辑与，常用于区间
    All(Vec<Predicate>),
}

/// 被比较的检查属性值
enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

/// 规则匹配器
///
/// 纯函数式判定，无副作用；固定墙上时钟下结果确定。
pub struct RuleMatcher {
    clock: Arc<dyn Clock>,
}

impl RuleMatcher {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// 判定规则是否命中检查：每个属性谓词都满足才算命中
    pub fn matches(&self, rule: &AssignmentRule, study: &Study) -> bool {
        let Some(filters) = rule.condition_filters.as_object() else {
            // 无条件规则匹配所有检查
            return true;
        };

        for (attr, raw) in filters {
            let matched = match attr.as_str() {
                "urgency" => match_field(raw, FieldValue::Text(&study.urgency)),
                "procedure_code" => match_field(raw, FieldValue::Text(&study.procedure_code)),
                "procedure_description" => {
                    match_field(raw, FieldValue::Text(&study.procedure_description))
                }
                "ordering_physician" => {
                    match_field(raw, FieldValue::Text(&study.ordering_physician))
                }
                "site" => match_field(raw, FieldValue::Text(&study.site)),
                "body_part" => match_field(raw, FieldValue::Text(&study.body_part)),
                "prior_location" => match_field(raw, FieldValue::Text(&study.prior_location)),
                "technician" => match_field(raw, FieldValue::Text(&study.technician)),
                "transcriptionist" => match_field(raw, FieldValue::Text(&study.transcriptionist)),
                "patient_age" => match_field(raw, FieldValue::Number(f64::from(study.patient_age))),
                // 旧式区间标量
                "patient_age_min" => coerce_number(raw)
                    .map(|min| f64::from(study.patient_age) >= min)
                    .unwrap_or(false),
                "patient_age_max" => coerce_number(raw)
                    .map(|max| f64::from(study.patient_age) <= max)
                    .unwrap_or(false),
                // 等待时长须严格大于阈值
                "min_age_minutes" => coerce_number(raw)
                    .map(|threshold| self.study_age_minutes(study) > threshold)
                    .unwrap_or(false),
                "exam_time_range" => raw
                    .as_str()
                    .map(|range| time_in_range(study.exam_time().time(), range))
                    .unwrap_or(false),
                "days_of_week" => matches_day_of_week(study.exam_time(), raw),
                other => {
                    // 未识别的属性不参与判定
                    debug!("rule {} has unrecognized condition attribute {}", rule.id, other);
                    true
                }
            };

            if !matched {
                return false;
            }
        }

        true
    }

    /// 检查自接收以来的等待分钟数
    fn study_age_minutes(&self, study: &Study) -> f64 {
        let elapsed = self.clock.now() - study.ingest_time;
        elapsed.num_seconds() as f64 / 60.0
    }
}

fn match_field(raw: &Value, field: FieldValue) -> bool {
    match parse_predicate(raw) {
        Some(pred) => eval(&pred, &field),
        None => false,
    }
}

fn parse_predicate(raw: &Value) -> Option<Predicate> {
    match raw {
        Value::Object(map) => {
            let op = map.get("op")?.as_str().and_then(CmpOp::parse)?;
            let val = map.get("val")?.clone();
            Some(Predicate::Op { op, val })
        }
        Value::Array(items) => {
            let parsed: Option<Vec<Predicate>> = items.iter().map(parse_predicate).collect();
            Some(Predicate::All(parsed?))
        }
        scalar => Some(Predicate::Eq(scalar.clone())),
    }
}

fn eval(pred: &Predicate, field: &FieldValue) -> bool {
    match pred {
        Predicate::Eq(v) => eval_eq(v, field),
        Predicate::All(list) => list.iter().all(|p| eval(p, field)),
        Predicate::Op { op, val } => match op {
            CmpOp::Eq => eval_eq(val, field),
            CmpOp::Neq => !eval_eq(val, field),
            CmpOp::Gt => matches!(cmp_numbers(field, val), Some(Ordering::Greater)),
            CmpOp::Ge => matches!(
                cmp_numbers(field, val),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            CmpOp::Lt => matches!(cmp_numbers(field, val), Some(Ordering::Less)),
            CmpOp::Le => matches!(
                cmp_numbers(field, val),
                Some(Ordering::Less) | Some(Ordering::Equal)
            ),
            CmpOp::Regex => eval_regex(val, field),
            CmpOp::In => val
                .as_array()
                .map(|items| items.iter().any(|v| eval_eq(v, field)))
                .unwrap_or(false),
        },
    }
}

fn eval_eq(expected: &Value, field: &FieldValue) -> bool {
    match field {
        FieldValue::Number(n) => coerce_number(expected).map(|e| e == *n).unwrap_or(false),
        FieldValue::Text(s) => match expected {
            Value::String(e) => e == s,
            // 数字与数字样文本按实数比较
            Value::Number(_) => match (coerce_number(expected), s.trim().parse::<f64>().ok()) {
                (Some(lhs), Some(rhs)) => lhs == rhs,
                _ => false,
            },
            _ => false,
        },
    }
}

/// 整数、浮点、数字字符串统一强转为实数
fn coerce_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn cmp_numbers(field: &FieldValue, expected: &Value) -> Option<Ordering> {
    let lhs = match field {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
    }?;
    let rhs = coerce_number(expected)?;
    lhs.partial_cmp(&rhs)
}

fn eval_regex(pattern: &Value, field: &FieldValue) -> bool {
    let Some(pat) = pattern.as_str() else {
        return false;
    };
    let text = match field {
        FieldValue::Text(s) => (*s).to_string(),
        FieldValue::Number(n) => format_number(*n),
    };
    match Regex::new(pat) {
        Ok(re) => re.is_match(&text),
        // 非法正则视为不匹配，不上抛
        Err(_) => false,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// 检查时刻是否落入 "HH:MM-HH:MM" 区间（两端含）
///
/// 结束早于开始时视为跨午夜区间。
fn time_in_range(t: NaiveTime, range: &str) -> bool {
    let Some((start_s, end_s)) = range.split_once('-') else {
        return false;
    };
    let (Ok(start), Ok(end)) = (
        NaiveTime::parse_from_str(start_s, "%H:%M"),
        NaiveTime::parse_from_str(end_s, "%H:%M"),
    ) else {
        return false;
    };

    // 截断到分钟参与比较
    let t = NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t);

    if end < start {
        t >= start || t <= end
    } else {
        t >= start && t <= end
    }
}

/// 检查发生日是否在允许的星期列表中（全名或三字母缩写，不区分大小写）
fn matches_day_of_week(t: DateTime<Utc>, raw: &Value) -> bool {
    let Some(items) = raw.as_array() else {
        return false;
    };
    let full = t.format("%A").to_string();
    let abbr = &full[..3];
    items
        .iter()
        .filter_map(|v| v.as_str())
        .any(|d| d.eq_ignore_ascii_case(&full) || d.eq_ignore_ascii_case(abbr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, SystemClock};
    use chrono::Duration;
    use ris_core::RuleAction;
    use serde_json::json;

    fn rule_with(filters: Value) -> AssignmentRule {
        AssignmentRule {
            id: 1,
            name: "test rule".to_string(),
            priority_order: 1,
            condition_filters: filters,
            action_type: RuleAction::Escalate,
            action_target: String::new(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn study() -> Study {
        Study {
            id: "study1".to_string(),
            site: "SiteA".to_string(),
            timestamp: String::new(),
            modality: "CT".to_string(),
            body_part: "Head".to_string(),
            urgency: "ROUTINE".to_string(),
            procedure_code: "CTHEAD".to_string(),
            procedure_description: "CT Head without contrast".to_string(),
            ordering_physician: "Dr. Smith".to_string(),
            patient_age: 50,
            ingest_time: Utc::now(),
            prior_location: String::new(),
            technician: String::new(),
            transcriptionist: String::new(),
        }
    }

    fn matcher() -> RuleMatcher {
        RuleMatcher::new(Arc::new(SystemClock))
    }

    #[test]
    fn test_legacy_scalar_equality() {
        let m = matcher();
        let mut s = study();
        s.urgency = "STAT".to_string();

        assert!(m.matches(&rule_with(json!({"urgency": "STAT"})), &s));
        assert!(!m.matches(&rule_with(json!({"urgency": "ROUTINE"})), &s));
        assert!(m.matches(&rule_with(json!({"procedure_code": "CTHEAD"})), &s));
        assert!(!m.matches(&rule_with(json!({"procedure_code": "CTABD"})), &s));
        assert!(m.matches(&rule_with(json!({"ordering_physician": "Dr. Smith"})), &s));
    }

    #[test]
    fn test_empty_filters_match_all() {
        let m = matcher();
        assert!(m.matches(&rule_with(json!({})), &study()));
        assert!(m.matches(&rule_with(Value::Null), &study()));
    }

    #[test]
    fn test_legacy_patient_age_range() {
        let m = matcher();
        let s = study(); // 50岁

        // 区间端点为闭区间
        assert!(m.matches(
            &rule_with(json!({"patient_age_min": 10, "patient_age_max": 50})),
            &s
        ));
        assert!(m.matches(&rule_with(json!({"patient_age_min": 50})), &s));
        assert!(!m.matches(&rule_with(json!({"patient_age_min": 51})), &s));
        assert!(!m.matches(&rule_with(json!({"patient_age_max": 49})), &s));
    }

    #[test]
    fn test_operator_conditions() {
        let m = matcher();
        let mut s = study();
        s.urgency = "STAT".to_string();

        assert!(m.matches(
            &rule_with(json!({"urgency": {"op": "EQ", "val": "STAT"}})),
            &s
        ));
        assert!(m.matches(
            &rule_with(json!({"urgency": {"op": "NEQ", "val": "ROUTINE"}})),
            &s
        ));
        assert!(!m.matches(
            &rule_with(json!({"urgency": {"op": "NEQ", "val": "STAT"}})),
            &s
        ));

        // GT 为严格大于
        s.patient_age = 51;
        assert!(m.matches(
            &rule_with(json!({"patient_age": {"op": "GT", "val": 50}})),
            &s
        ));
        s.patient_age = 50;
        assert!(!m.matches(
            &rule_with(json!({"patient_age": {"op": "GT", "val": 50}})),
            &s
        ));
        assert!(m.matches(
            &rule_with(json!({"patient_age": {"op": "GE", "val": 50}})),
            &s
        ));
        assert!(m.matches(
            &rule_with(json!({"patient_age": {"op": "LE", "val": 50}})),
            &s
        ));
        assert!(!m.matches(
            &rule_with(json!({"patient_age": {"op": "LT", "val": 50}})),
            &s
        ));
    }

    #[test]
    fn test_in_operator() {
        let m = matcher();
        let s = study();

        assert!(m.matches(
            &rule_with(json!({"site": {"op": "IN", "val": ["SiteA", "SiteB"]}})),
            &s
        ));
        assert!(!m.matches(
            &rule_with(json!({"site": {"op": "IN", "val": ["SiteC"]}})),
            &s
        ));
        // IN 的值必须是列表
        assert!(!m.matches(
            &rule_with(json!({"site": {"op": "IN", "val": "SiteA"}})),
            &s
        ));
    }

    #[test]
    fn test_regex_condition() {
        let m = matcher();
        let s = study();

        assert!(m.matches(
            &rule_with(json!({"procedure_code": {"op": "REGEX", "val": "^CT.*"}})),
            &s
        ));
        let mut mr = study();
        mr.procedure_code = "MRHEAD".to_string();
        assert!(!m.matches(
            &rule_with(json!({"procedure_code": {"op": "REGEX", "val": "^CT.*"}})),
            &mr
        ));
        // 非法正则不匹配且不报错
        assert!(!m.matches(
            &rule_with(json!({"procedure_code": {"op": "REGEX", "val": "[unclosed"}})),
            &s
        ));
    }

    #[test]
    fn test_condition_list_as_and() {
        let m = matcher();
        let range = json!({"patient_age": [
            {"op": "GT", "val": 10},
            {"op": "LT", "val": 20}
        ]});

        let mut s = study();
        s.patient_age = 15;
        assert!(m.matches(&rule_with(range.clone()), &s));
        s.patient_age = 25;
        assert!(!m.matches(&rule_with(range), &s));
    }

    #[test]
    fn test_numeric_string_coercion() {
        let m = matcher();
        let s = study(); // 50岁

        // 数字字符串与数字按实数比较
        assert!(m.matches(
            &rule_with(json!({"patient_age": {"op": "EQ", "val": "50"}})),
            &s
        ));
        assert!(m.matches(
            &rule_with(json!({"patient_age": {"op": "GT", "val": "49"}})),
            &s
        ));
        assert!(m.matches(&rule_with(json!({"patient_age": "50"})), &s));
    }

    #[test]
    fn test_exam_time_range_boundaries() {
        let m = matcher();
        let at = |ts: &str| {
            let mut s = study();
            s.timestamp = ts.to_string();
            s
        };
        let day_range = rule_with(json!({"exam_time_range": "08:00-12:00"}));

        // 两端含
        assert!(m.matches(&day_range, &at("20231010090000")));
        assert!(m.matches(&day_range, &at("20231010080000")));
        assert!(m.matches(&day_range, &at("20231010120000")));
        assert!(!m.matches(&day_range, &at("20231010075900")));
        assert!(!m.matches(&day_range, &at("20231010130000")));
    }

    #[test]
    fn test_exam_time_range_overnight() {
        let m = matcher();
        let at = |ts: &str| {
            let mut s = study();
            s.timestamp = ts.to_string();
            s
        };
        let night = rule_with(json!({"exam_time_range": "22:00-06:00"}));

        assert!(m.matches(&night, &at("20231010230000")));
        assert!(m.matches(&night, &at("20231011050000")));
        assert!(m.matches(&night, &at("20231010220000")));
        assert!(m.matches(&night, &at("20231011060000")));
        assert!(!m.matches(&night, &at("20231010120000")));
    }

    #[test]
    fn test_malformed_time_range() {
        let m = matcher();
        let mut s = study();
        s.timestamp = "20231010090000".to_string();

        assert!(!m.matches(&rule_with(json!({"exam_time_range": "0800-1200"})), &s));
        assert!(!m.matches(&rule_with(json!({"exam_time_range": "08:00"})), &s));
    }

    #[test]
    fn test_days_of_week() {
        let m = matcher();
        // 2023-10-09 是星期一
        let mut s = study();
        s.timestamp = "20231009100000".to_string();

        assert!(m.matches(
            &rule_with(json!({"days_of_week": ["Monday", "Wednesday"]})),
            &s
        ));
        assert!(m.matches(&rule_with(json!({"days_of_week": ["mon"]})), &s));
        assert!(m.matches(&rule_with(json!({"days_of_week": ["MONDAY"]})), &s));
        assert!(!m.matches(
            &rule_with(json!({"days_of_week": ["Tuesday", "Thursday"]})),
            &s
        ));
        assert!(!m.matches(&rule_with(json!({"days_of_week": []})), &s));
    }

    #[test]
    fn test_min_age_minutes_strictly_greater() {
        let now = Utc::now();
        let m = RuleMatcher::new(Arc::new(FixedClock(now)));
        let rule = rule_with(json!({"min_age_minutes": 30}));

        let mut s = study();
        s.ingest_time = now - Duration::minutes(30);
        // 刚好等于阈值不算命中
        assert!(!m.matches(&rule, &s));

        s.ingest_time = now - Duration::minutes(31);
        assert!(m.matches(&rule, &s));
    }

    #[test]
    fn test_unknown_attribute_ignored() {
        let m = matcher();
        let mut s = study();
        s.urgency = "STAT".to_string();

        assert!(m.matches(
            &rule_with(json!({"urgency": "STAT", "no_such_attribute": "x"})),
            &s
        ));
    }

    #[test]
    fn test_all_attributes_combine_with_and() {
        let m = matcher();
        let mut s = study();
        s.urgency = "STAT".to_string();

        assert!(m.matches(
            &rule_with(json!({"urgency": "STAT", "site": "SiteA"})),
            &s
        ));
        assert!(!m.matches(
            &rule_with(json!({"urgency": "STAT", "site": "SiteB"})),
            &s
        ));
    }
}
