use crate::api::{api_error, error_response, query_error, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitepulse_common::types::{Alert, AlertType, KpiId};
use sitepulse_kpi::{AlertEngine, AlertStore};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const DEFAULT_ACKNOWLEDGED_BY: &str = "anonymous";

/// 仪表盘告警
#[derive(Serialize, ToSchema)]
struct AlertItem {
    id: String,
    kpi_id: KpiId,
    /// info / warning / critical
    #[serde(rename = "type")]
    alert_type: AlertType,
    message: String,
    value: f64,
    threshold: f64,
    created_at: DateTime<Utc>,
    acknowledged: bool,
    acknowledged_by: Option<String>,
    acknowledged_at: Option<DateTime<Utc>>,
}

impl From<Alert> for AlertItem {
    fn from(a: Alert) -> Self {
        Self {
            id: a.id,
            kpi_id: a.kpi_id,
            alert_type: a.alert_type,
            message: a.message,
            value: a.value,
            threshold: a.threshold,
            created_at: a.created_at,
            acknowledged: a.acknowledged,
            acknowledged_by: a.acknowledged_by,
            acknowledged_at: a.acknowledged_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct AlertList {
    total: usize,
    alerts: Vec<AlertItem>,
}

/// 告警列表查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct AlertListParams {
    /// 是否已确认（默认 false，即仅返回未确认告警）
    #[param(required = false)]
    acknowledged: Option<bool>,
}

/// 获取项目仪表盘告警，按创建时间倒序。
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/dashboard/alerts",
    tag = "Alerts",
    params(("project_id" = String, Path, description = "项目 ID"), AlertListParams),
    responses(
        (status = 200, description = "告警列表", body = AlertList),
        (status = 400, description = "查询参数无效", body = crate::api::ApiError),
        (status = 404, description = "项目不存在", body = crate::api::ApiError)
    )
)]
async fn list_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    params: Result<Query<AlertListParams>, QueryRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return query_error(&trace_id, &rejection),
    };
    if let Err(e) = state.store.require_project(&project_id).await {
        return api_error(&trace_id, &e);
    }
    let engine = AlertEngine::new(state.store.as_ref(), state.store.as_ref());
    let acknowledged = params.acknowledged.unwrap_or(false);
    match engine.list_alerts(&project_id, Some(acknowledged)).await {
        Ok(alerts) => {
            let alerts: Vec<AlertItem> = alerts.into_iter().map(AlertItem::from).collect();
            success_response(
                StatusCode::OK,
                &trace_id,
                AlertList {
                    total: alerts.len(),
                    alerts,
                },
            )
        }
        Err(e) => api_error(&trace_id, &e),
    }
}

/// 确认请求
#[derive(Debug, Default, Deserialize, ToSchema)]
struct AcknowledgeRequest {
    /// 确认人（可选）
    acknowledged_by: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct AcknowledgeResponse {
    /// 固定为 acknowledged
    status: String,
    alert_id: String,
    acknowledged_at: Option<DateTime<Utc>>,
}

/// 确认告警。重复确认保留首次确认人与时间。
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/dashboard/alerts/{alert_id}/acknowledge",
    tag = "Alerts",
    params(
        ("project_id" = String, Path, description = "项目 ID"),
        ("alert_id" = String, Path, description = "告警 ID")
    ),
    request_body(content = AcknowledgeRequest, description = "可选请求体"),
    responses(
        (status = 200, description = "告警已确认", body = AcknowledgeResponse),
        (status = 404, description = "告警不存在", body = crate::api::ApiError)
    )
)]
async fn acknowledge_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path((project_id, alert_id)): Path<(String, String)>,
    body: Option<Json<AcknowledgeRequest>>,
) -> impl IntoResponse {
    let acknowledged_by = body
        .and_then(|Json(req)| req.acknowledged_by)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ACKNOWLEDGED_BY.to_string());

    let engine = AlertEngine::new(state.store.as_ref(), state.store.as_ref());

    // 告警必须属于路径中的项目
    match state.store.get_alert(&alert_id).await {
        Ok(Some(alert)) if alert.project_id == project_id => {}
        Ok(_) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                "Alert not found",
            )
        }
        Err(e) => return api_error(&trace_id, &e),
    }

    match engine.acknowledge(&alert_id, &acknowledged_by).await {
        Ok(alert) => {
            tracing::info!(
                project_id = %project_id,
                alert_id = %alert.id,
                acknowledged_by = alert.acknowledged_by.as_deref().unwrap_or("-"),
                "Alert acknowledged"
            );
            success_response(
                StatusCode::OK,
                &trace_id,
                AcknowledgeResponse {
                    status: "acknowledged".to_string(),
                    alert_id: alert.id,
                    acknowledged_at: alert.acknowledged_at,
                },
            )
        }
        Err(e) => api_error(&trace_id, &e),
    }
}

pub fn alert_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_alerts))
        .routes(routes!(acknowledge_alert))
}
