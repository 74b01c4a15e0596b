//! 规则管线
//!
//! 将启用的规则按 priority_order 升序稳定排序，逐条与检查匹配，
//! 把管线状态 {候选集, 升级标记, 工作列表目标} 折叠过去。
//! 管线只会收窄、改派或标记候选集，绝不增补；
//! ASSIGN_TO_WORKLIST 是唯一的短路动作，过滤出空集不会终止管线。

use std::sync::Arc;

use ris_core::{RuleAction, Study};
use tracing::{debug, info};

use crate::candidate::Candidate;
use crate::clock::Clock;
use crate::matcher::RuleMatcher;
use crate::stores::RulesService;

/// 管线输出
#[derive(Debug)]
pub struct PipelineOutcome {
    pub candidates: Vec<Candidate>,
    pub escalated: bool,
    /// 命中 ASSIGN_TO_WORKLIST 时的目标队列名
    pub worklist_target: Option<String>,
}

/// 规则管线
pub struct RulePipeline {
    rules: Arc<dyn RulesService>,
    matcher: RuleMatcher,
}

impl RulePipeline {
    pub fn new(rules: Arc<dyn RulesService>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rules,
            matcher: RuleMatcher::new(clock),
        }
    }

    /// 按优先级评估规则并折叠候选集
    pub fn apply(&self, study: &Study, candidates: Vec<Candidate>) -> PipelineOutcome {
        let mut rules = self.rules.get_active();
        // sort_by_key 为稳定排序，优先级并列时保持取回顺序
        rules.sort_by_key(|r| r.priority_order);

        let mut current = candidates;
        let mut escalated = false;

        for rule in &rules {
            if !self.matcher.matches(rule, study) {
                continue;
            }

            match rule.action_type {
                RuleAction::FilterCompetency => {
                    current.retain(|c| {
                        c.radiologist
                            .credentials
                            .iter()
                            .any(|cred| cred == &study.modality)
                    });
                    debug!(
                        "rule {} competency filter left {} candidates for study {}",
                        rule.id,
                        current.len(),
                        study.id
                    );
                }
                RuleAction::AssignToRadiologist => {
                    if !rule.action_target.is_empty() {
                        current.retain(|c| c.radiologist.id == rule.action_target);
                    }
                }
                RuleAction::AssignToShift => match rule.action_target.parse::<i64>() {
                    Ok(shift_id) => current.retain(|c| c.shift_id == shift_id),
                    // 目标不可解析时该规则不生效
                    Err(_) => debug!(
                        "rule {} has unparsable shift target {:?}",
                        rule.id, rule.action_target
                    ),
                },
                RuleAction::AssignToWorklist => {
                    info!(
                        "rule {} diverted study {} to worklist {}",
                        rule.id, study.id, rule.action_target
                    );
                    // 分流立即终止管线，跳过后续规则与容量/负载阶段
                    return PipelineOutcome {
                        candidates: Vec::new(),
                        escalated,
                        worklist_target: Some(rule.action_target.clone()),
                    };
                }
                RuleAction::Escalate => {
                    escalated = true;
                }
                RuleAction::SoftAlert => {
                    // 暂无通知通道，命中即记录
                    info!(
                        "soft alert rule {} ({}) matched study {}",
                        rule.id, rule.name, study.id
                    );
                }
            }
        }

        PipelineOutcome {
            candidates: current,
            escalated,
            worklist_target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use chrono::Utc;
    use ris_core::{ActivationStatus, AssignmentRule, Radiologist};
    use serde_json::{json, Value};

    struct StaticRules(Vec<AssignmentRule>);

    impl RulesService for StaticRules {
        fn get_active(&self) -> Vec<AssignmentRule> {
            self.0.clone()
        }
    }

    fn rule(id: i64, priority: i32, action: RuleAction, target: &str, filters: Value) -> AssignmentRule {
        AssignmentRule {
            id,
            name: format!("rule-{}", id),
            priority_order: priority,
            condition_filters: filters,
            action_type: action,
            action_target: target.to_string(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn radiologist(id: &str, credentials: &[&str]) -> Radiologist {
        Radiologist {
            id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: id.to_string(),
            credentials: credentials.iter().map(|s| s.to_string()).collect(),
            specialties: Vec::new(),
            max_concurrent_studies: 5,
            status: ActivationStatus::Active,
        }
    }

    fn candidate(id: &str, credentials: &[&str], shift_id: i64) -> Candidate {
        Candidate {
            radiologist: radiologist(id, credentials),
            shift_id,
            current_load: 0,
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
            procedure_code: String::new(),
            procedure_description: String::new(),
            ordering_physician: String::new(),
            patient_age: 40,
            ingest_time: Utc::now(),
            prior_location: String::new(),
            technician: String::new(),
            transcriptionist: String::new(),
        }
    }

    fn pipeline(rules: Vec<AssignmentRule>) -> RulePipeline {
        RulePipeline::new(Arc::new(StaticRules(rules)), Arc::new(SystemClock))
    }

    #[test]
    fn test_competency_filter_narrows() {
        let p = pipeline(vec![rule(1, 1, RuleAction::FilterCompetency, "", json!({}))]);
        let outcome = p.apply(
            &study(),
            vec![
                candidate("rad1", &["CT"], 1),
                candidate("rad2", &["MRI"], 1),
            ],
        );

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].radiologist.id, "rad1");
        assert!(!outcome.escalated);
        assert!(outcome.worklist_target.is_none());
    }

    #[test]
    fn test_priority_order_is_ascending() {
        // 优先级 1 的分流规则先于优先级 2 的升级规则执行
        let p = pipeline(vec![
            rule(2, 2, RuleAction::Escalate, "", json!({})),
            rule(1, 1, RuleAction::AssignToWorklist, "UrgentQueue", json!({})),
        ]);
        let outcome = p.apply(&study(), vec![candidate("rad1", &["CT"], 1)]);

        assert_eq!(outcome.worklist_target.as_deref(), Some("UrgentQueue"));
        // 分流短路，后续升级规则不再执行
        assert!(!outcome.escalated);
    }

    #[test]
    fn test_worklist_short_circuit_keeps_prior_escalation() {
        let p = pipeline(vec![
            rule(1, 1, RuleAction::Escalate, "", json!({})),
            rule(2, 2, RuleAction::AssignToWorklist, "NightQueue", json!({})),
        ]);
        let outcome = p.apply(&study(), vec![candidate("rad1", &["CT"], 1)]);

        assert_eq!(outcome.worklist_target.as_deref(), Some("NightQueue"));
        assert!(outcome.escalated);
    }

    #[test]
    fn test_empty_set_does_not_terminate() {
        // 过滤出空集后管线继续走完，升级标记仍然生效
        let p = pipeline(vec![
            rule(1, 1, RuleAction::AssignToRadiologist, "rad_absent", json!({})),
            rule(2, 2, RuleAction::Escalate, "", json!({})),
        ]);
        let outcome = p.apply(&study(), vec![candidate("rad1", &["CT"], 1)]);

        assert!(outcome.candidates.is_empty());
        assert!(outcome.escalated);
        assert!(outcome.worklist_target.is_none());
    }

    #[test]
    fn test_assign_to_shift() {
        let p = pipeline(vec![rule(1, 1, RuleAction::AssignToShift, "2", json!({}))]);
        let outcome = p.apply(
            &study(),
            vec![candidate("rad1", &["CT"], 1), candidate("rad2", &["CT"], 2)],
        );

        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].shift_id, 2);
    }

    #[test]
    fn test_unparsable_shift_target_is_noop() {
        let p = pipeline(vec![rule(1, 1, RuleAction::AssignToShift, "abc", json!({}))]);
        let outcome = p.apply(
            &study(),
            vec![candidate("rad1", &["CT"], 1), candidate("rad2", &["CT"], 2)],
        );

        assert_eq!(outcome.candidates.len(), 2);
    }

    #[test]
    fn test_soft_alert_does_not_mutate() {
        let p = pipeline(vec![rule(1, 1, RuleAction::SoftAlert, "", json!({}))]);
        let outcome = p.apply(
            &study(),
            vec![candidate("rad1", &["CT"], 1), candidate("rad2", &["MRI"], 1)],
        );

        assert_eq!(outcome.candidates.len(), 2);
        assert!(!outcome.escalated);
    }

    #[test]
    fn test_non_matching_rule_is_skipped() {
        let p = pipeline(vec![rule(
            1,
            1,
            RuleAction::AssignToWorklist,
            "StatQueue",
            json!({"urgency": "STAT"}),
        )]);
        let outcome = p.apply(&study(), vec![candidate("rad1", &["CT"], 1)]);

        assert!(outcome.worklist_target.is_none());
        assert_eq!(outcome.candidates.len(), 1);
    }
}
