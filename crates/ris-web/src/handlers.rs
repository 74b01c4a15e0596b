//! HTTP处理器

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Form,
};
use chrono::{DateTime, Utc};
use ris_assignment::{Engine, RulesService};
use ris_core::{utils::format_hl7_timestamp, RisError, Study};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// 共享应用状态
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub rules: Arc<dyn RulesService>,
}

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "RIS Assignment API",
        "version": "1.0.0",
        "status": "running",
        "endpoints": {
            "health": "/health",
            "simulate": "/api/simulate",
            "rules": "/api/rules"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0"
    }))
}

/// 分配模拟请求，字段均可缺省
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulateRequest {
    pub study_id: String,
    pub modality: String,
    pub procedure_code: String,
    pub ordering_physician: String,
    pub patient_age: String,
    pub ingest_time: String,
    pub urgency: String,
    pub site: String,
    pub procedure_description: String,
    pub prior_location: String,
    pub technician: String,
    pub transcriptionist: String,
}

/// 从表单构造检查对象
fn build_study(req: &SimulateRequest) -> Study {
    let patient_age = req.patient_age.trim().parse::<i32>().unwrap_or(0);

    let ingest_time = DateTime::parse_from_rfc3339(&req.ingest_time)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());

    // 站点缺省为 SiteA
    let site = if req.site.is_empty() {
        "SiteA".to_string()
    } else {
        req.site.clone()
    };

    Study {
        id: req.study_id.clone(),
        site,
        timestamp: format_hl7_timestamp(ingest_time),
        modality: req.modality.clone(),
        body_part: "General".to_string(),
        urgency: req.urgency.clone(),
        procedure_code: req.procedure_code.clone(),
        procedure_description: req.procedure_description.clone(),
        ordering_physician: req.ordering_physician.clone(),
        patient_age,
        ingest_time,
        prior_location: req.prior_location.clone(),
        technician: req.technician.clone(),
        transcriptionist: req.transcriptionist.clone(),
    }
}

/// 分配模拟处理器
///
/// 成功返回 "Assigned to <医生ID>"，分流返回
/// "Assigned to Worklist: <目标>"，失败按错误分类映射HTTP状态码。
pub async fn simulate_assignment(
    State(state): State<AppState>,
    Form(req): Form<SimulateRequest>,
) -> Response {
    info!("simulating assignment for study {:?}", req.study_id);

    let study = build_study(&req);
    match state.engine.assign(&study).await {
        Ok(assignment) if assignment.is_worklist() => (
            StatusCode::OK,
            format!("Assigned to Worklist: {}", assignment.strategy),
        )
            .into_response(),
        Ok(assignment) => (
            StatusCode::OK,
            format!("Assigned to {}", assignment.radiologist_id),
        )
            .into_response(),
        Err(err) => {
            let status = status_for(&err);
            (status, format!("Assignment Failed: {}", err)).into_response()
        }
    }
}

/// 启用规则只读视图处理器
pub async fn list_rules(State(state): State<AppState>) -> impl IntoResponse {
    let rules = state.rules.get_active();
    let total = rules.len();
    Json(json!({
        "rules": rules,
        "total": total
    }))
}

/// 错误分类到HTTP状态码的映射
pub fn status_for(err: &RisError) -> StatusCode {
    match err {
        RisError::Validation(_) | RisError::InvalidStudy(_) => StatusCode::BAD_REQUEST,
        RisError::NoMatchingShifts(_)
        | RisError::NoAvailableRadiologists(_)
        | RisError::NoCapacity { .. } => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
