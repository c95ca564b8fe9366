use anyhow::Result;
use sitepulse_kpi::KpiCalculator;
use sitepulse_storage::KpiStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use sitepulse_server::app;
use sitepulse_server::config::ServerConfig;
use sitepulse_server::scheduler::{KpiScheduler, RoundReport};
use sitepulse_server::state::AppState;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  sitepulse-server [config.toml]                              Start the HTTP server and scheduler");
    eprintln!("  sitepulse-server run-cycle <config.toml> [project_id]       Run one calculation and threshold round");
    eprintln!("  sitepulse-server purge-history <config.toml> [days]         Delete KPI history older than <days>");
}

#[tokio::main]
async fn main() -> Result<()> {
    sitepulse_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sitepulse=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("run-cycle") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("run-cycle requires <config.toml> argument")
            })?;
            run_cycle(config_path, args.get(3).map(String::as_str)).await
        }
        Some("purge-history") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("purge-history requires <config.toml> argument")
            })?;
            let days = args
                .get(3)
                .map(|d| {
                    d.parse::<u32>()
                        .map_err(|e| anyhow::anyhow!("Invalid retention days '{d}': {e}"))
                })
                .transpose()?;
            purge_history(config_path, days).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

async fn open_store(config: &ServerConfig) -> Result<Arc<KpiStore>> {
    let store = KpiStore::open(
        &config.database.resolved_url(),
        Path::new(&config.database.data_dir),
        config.database.max_connections,
    )
    .await?;
    Ok(Arc::new(store))
}

fn ensure_round_ok(job: &str, report: RoundReport) -> Result<()> {
    tracing::info!(job, succeeded = report.succeeded, failed = report.failed, "Round finished");
    if report.failed > 0 {
        anyhow::bail!("{job}: {} project(s) failed", report.failed);
    }
    Ok(())
}

/// One calculation round followed by one threshold round.
async fn run_cycle(config_path: &str, project_id: Option<&str>) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;
    let scheduler = KpiScheduler::new(
        store,
        Arc::new(KpiCalculator::standard()),
        config.scheduler.clone(),
    );

    let (calculated, checked) = match project_id {
        Some(id) => {
            let calculated = scheduler.calculate_projects(vec![id.to_string()]).await?;
            let checked = scheduler.check_projects(vec![id.to_string()]).await?;
            (calculated, checked)
        }
        None => {
            let calculated = scheduler.run_calculation_round().await?;
            let checked = scheduler.run_threshold_round().await?;
            (calculated, checked)
        }
    };
    ensure_round_ok("calculation", calculated)?;
    ensure_round_ok("threshold-check", checked)
}

async fn purge_history(config_path: &str, days: Option<u32>) -> Result<()> {
    let mut config = ServerConfig::load(config_path)?;
    if let Some(days) = days {
        config.scheduler.retention_days = days;
    }
    let store = open_store(&config).await?;
    let retention_days = config.scheduler.retention_days;
    let scheduler = KpiScheduler::new(
        store,
        Arc::new(KpiCalculator::standard()),
        config.scheduler,
    );
    let removed = scheduler.run_purge().await?;
    tracing::info!(removed, retention_days, "KPI history purged");
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        scheduler_enabled = config.scheduler.enabled,
        "sitepulse-server starting"
    );

    let store = open_store(&config).await?;
    let state = AppState::new(store.clone(), config.clone());

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = app::build_http_app(state.clone());
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app);

    let scheduler_handle = if config.scheduler.enabled {
        let scheduler =
            KpiScheduler::new(store, state.calculator.clone(), config.scheduler.clone());
        Some(tokio::spawn(async move {
            scheduler.run().await;
        }))
    } else {
        tracing::info!("KPI scheduler disabled");
        None
    };

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    if let Some(h) = scheduler_handle {
        h.abort();
    }
    tracing::info!("Server stopped");

    Ok(())
}
