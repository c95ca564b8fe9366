#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::Value;
use sitepulse_server::app;
use sitepulse_server::config::{SchedulerConfig, ServerConfig};
use sitepulse_server::state::AppState;
use sitepulse_storage::{KpiStore, NewRfi};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub store: Arc<KpiStore>,
    pub state: AppState,
    pub app: axum::Router,
}

pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        max_concurrent: 4,
        retry_base_delay_ms: 10,
        ..SchedulerConfig::default()
    }
}

pub async fn open_test_store(dir: &TempDir) -> Result<Arc<KpiStore>> {
    sitepulse_common::id::init(1, 1);
    let url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("sitepulse.db").display()
    );
    Ok(Arc::new(KpiStore::new(&url, dir.path()).await?))
}

pub async fn build_test_context() -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let store = open_test_store(&temp_dir).await?;

    let mut config = ServerConfig::default();
    config.database.data_dir = temp_dir.path().to_string_lossy().to_string();
    config.scheduler = test_scheduler_config();

    let state = AppState::new(store.clone(), config);
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        store,
        state,
        app,
    })
}

/// A project whose RFI closure rate (KPI-005) is 25%, well under the
/// warning threshold, while every other KPI stays OK.
pub async fn seed_degraded_project(store: &KpiStore, name: &str) -> Result<String> {
    let project = store.insert_project(name, "active").await?;
    let created_at = Utc::now() - Duration::hours(2);
    for status in ["open", "open", "open", "closed"] {
        store
            .insert_rfi(&NewRfi {
                project_id: project.id.clone(),
                title: "Curtain wall anchor detail".to_string(),
                status: status.to_string(),
                due_date: None,
                created_at,
                responded_at: None,
                closed_at: None,
            })
            .await?;
    }
    Ok(project.id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let req_body = match body {
        Some(body) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };
    let req = builder.body(req_body).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok(status: StatusCode, body: &Value) {
    assert_eq!(status, StatusCode::OK, "unexpected response: {body}");
    assert_eq!(body["err_code"], 0, "unexpected response: {body}");
}
