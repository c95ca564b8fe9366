pub mod alerts;
pub mod dashboard;

use crate::logging::TraceId;
use crate::retry::error_kind;
use crate::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sitepulse_common::error::ErrorKind;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API 错误响应
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// 错误码
    pub err_code: i32,
    /// 错误信息
    pub err_msg: String,
    /// 链路追踪 ID
    pub trace_id: String,
}

/// API 统一响应包裹
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// 错误码（成功时为 0）
    pub err_code: i32,
    /// 错误信息（成功时为 success）
    pub err_msg: String,
    /// 链路追踪 ID
    pub trace_id: String,
    /// 业务数据
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "unavailable" => 1503,
        "storage_error" => 1501,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Malformed query strings answer with the envelope instead of axum's plain text.
pub fn query_error(trace_id: &str, rejection: &QueryRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", &rejection.body_text())
}

/// Maps a handler failure onto status and error code by its error kind.
/// Client errors echo the message; server errors are logged and hidden.
pub fn api_error(trace_id: &str, err: &anyhow::Error) -> Response {
    match error_kind(err) {
        ErrorKind::NotFound => {
            error_response(StatusCode::NOT_FOUND, trace_id, "not_found", &err.to_string())
        }
        ErrorKind::InvalidInput => {
            error_response(StatusCode::BAD_REQUEST, trace_id, "bad_request", &err.to_string())
        }
        ErrorKind::Transient => {
            let error = format!("{err:#}");
            tracing::warn!(trace_id = %trace_id, error = %error, "Storage unavailable");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                trace_id,
                "unavailable",
                "Storage temporarily unavailable",
            )
        }
        ErrorKind::Permanent => {
            let error = format!("{err:#}");
            tracing::error!(trace_id = %trace_id, error = %error, "Request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                trace_id,
                "internal_error",
                "Internal error",
            )
        }
    }
}

/// 健康检查响应
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// 服务版本号
    version: String,
    /// 运行时长（秒）
    uptime_secs: i64,
    /// 存储状态
    storage_status: String,
}

/// 获取服务健康状态。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务健康状态", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let storage_status = match state.store.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Storage ping failed");
            "unavailable"
        }
    };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: (Utc::now() - state.start_time).num_seconds(),
            storage_status: storage_status.to_string(),
        },
    )
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(dashboard::dashboard_routes())
        .merge(alerts::alert_routes())
}
