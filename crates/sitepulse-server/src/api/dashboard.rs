use crate::api::{api_error, query_error, success_response};
use crate::dashboard::{DashboardService, KpiReading, DEFAULT_HISTORY_DAYS};
use crate::logging::TraceId;
use crate::retry::RetryPolicy;
use crate::scheduler::calculate_project;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitepulse_common::types::KpiId;
use std::collections::BTreeMap;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 获取项目全部 KPI 的最新读数。
/// 从未计算过的 KPI 会实时计算，`recorded_at` 为 null。
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/dashboard/kpis",
    tag = "Dashboard",
    params(("project_id" = String, Path, description = "项目 ID")),
    responses(
        (status = 200, description = "KPI 读数（按 KPI ID 索引）", body = BTreeMap<String, KpiReading>),
        (status = 404, description = "项目不存在", body = crate::api::ApiError)
    )
)]
async fn get_all_kpis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let service = DashboardService::new(&state.store, &state.calculator);
    match service.all_kpis(&project_id, Utc::now()).await {
        Ok(readings) => success_response(StatusCode::OK, &trace_id, readings),
        Err(e) => api_error(&trace_id, &e),
    }
}

/// 手动刷新结果
#[derive(Serialize, ToSchema)]
struct RefreshResponse {
    project_id: String,
    recorded_at: DateTime<Utc>,
    kpis: BTreeMap<KpiId, KpiReading>,
}

/// 立即为项目执行一次 KPI 计算。
#[utoipa::path(
    post,
    path = "/v1/projects/{project_id}/dashboard/kpis/refresh",
    tag = "Dashboard",
    params(("project_id" = String, Path, description = "项目 ID")),
    responses(
        (status = 200, description = "新写入的 KPI 快照", body = RefreshResponse),
        (status = 404, description = "项目不存在", body = crate::api::ApiError),
        (status = 503, description = "存储暂不可用", body = crate::api::ApiError)
    )
)]
async fn refresh_kpis(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let retry = RetryPolicy::new(
        state.config.scheduler.retry_attempts,
        state.config.scheduler.retry_base_delay_ms,
    );
    match calculate_project(&state.store, &state.calculator, retry, &project_id).await {
        Ok(outcome) => {
            let kpis = outcome
                .values
                .into_iter()
                .map(|v| {
                    let kpi_id = v.kpi_id;
                    let mut reading = KpiReading::from(v);
                    reading.recorded_at = Some(outcome.recorded_at);
                    (kpi_id, reading)
                })
                .collect();
            success_response(
                StatusCode::OK,
                &trace_id,
                RefreshResponse {
                    project_id: outcome.project_id,
                    recorded_at: outcome.recorded_at,
                    kpis,
                },
            )
        }
        Err(e) => api_error(&trace_id, &e),
    }
}

/// 获取项目仪表盘汇总（文档、RFI、传送单计数与 KPI 状态分布）。
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/dashboard/summary",
    tag = "Dashboard",
    params(("project_id" = String, Path, description = "项目 ID")),
    responses(
        (status = 200, description = "仪表盘汇总", body = crate::dashboard::DashboardSummary),
        (status = 404, description = "项目不存在", body = crate::api::ApiError)
    )
)]
async fn get_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    let service = DashboardService::new(&state.store, &state.calculator);
    match service.summary(&project_id, Utc::now()).await {
        Ok(summary) => success_response(StatusCode::OK, &trace_id, summary),
        Err(e) => api_error(&trace_id, &e),
    }
}

/// KPI 历史查询参数
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct HistoryParams {
    /// 回溯天数（1-365，默认 7）
    #[param(required = false, minimum = 1, maximum = 365)]
    days: Option<u32>,
}

/// 获取单个 KPI 的按日聚合历史。
#[utoipa::path(
    get,
    path = "/v1/projects/{project_id}/dashboard/kpi/{kpi_id}/history",
    tag = "Dashboard",
    params(
        ("project_id" = String, Path, description = "项目 ID"),
        ("kpi_id" = String, Path, description = "KPI ID，例如 KPI-001"),
        HistoryParams
    ),
    responses(
        (status = 200, description = "按日聚合的历史数据", body = crate::dashboard::KpiHistory),
        (status = 400, description = "KPI ID 或天数无效", body = crate::api::ApiError),
        (status = 404, description = "项目不存在", body = crate::api::ApiError)
    )
)]
async fn get_kpi_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path((project_id, kpi_id)): Path<(String, String)>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> impl IntoResponse {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => return query_error(&trace_id, &rejection),
    };
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    let service = DashboardService::new(&state.store, &state.calculator);
    match service.history(&project_id, &kpi_id, days, Utc::now()).await {
        Ok(history) => success_response(StatusCode::OK, &trace_id, history),
        Err(e) => api_error(&trace_id, &e),
    }
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_all_kpis))
        .routes(routes!(refresh_kpis))
        .routes(routes!(get_summary))
        .routes(routes!(get_kpi_history))
}
