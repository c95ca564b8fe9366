use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::time::Instant;
use tracing::Instrument;

pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Trace id of the current request, stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

fn generate_trace_id() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}

/// Reuses a caller supplied trace id when it is short and printable.
fn incoming_trace_id(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(TRACE_ID_HEADER)?.to_str().ok()?;
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| value.to_string())
}

/// Project segment of `/v1/projects/{project_id}/...`, `-` elsewhere.
fn project_of(path: &str) -> &str {
    path.strip_prefix("/v1/projects/")
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
        .unwrap_or("-")
}

/// Runs each request inside a span carrying its trace id and project, and
/// echoes the id back in `X-Trace-Id`.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = incoming_trace_id(req.headers()).unwrap_or_else(generate_trace_id);
    req.extensions_mut().insert(TraceId(trace_id.clone()));

    let path = req.uri().path().to_string();
    // 健康检查不记录日志
    let quiet = path == "/v1/health";
    let span = tracing::info_span!(
        "http",
        trace_id = %trace_id,
        method = %req.method(),
        project_id = project_of(&path),
    );

    let start = Instant::now();
    let mut response = next.run(req).instrument(span.clone()).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    let status = response.status();

    span.in_scope(|| {
        if status.is_server_error() {
            tracing::error!(path = %path, status = status.as_u16(), elapsed_ms, "request failed");
        } else if status.is_client_error() {
            tracing::warn!(path = %path, status = status.as_u16(), elapsed_ms, "request rejected");
        } else if !quiet {
            tracing::info!(path = %path, status = status.as_u16(), elapsed_ms, "request served");
        }
    });

    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, val);
    }
    response
}
