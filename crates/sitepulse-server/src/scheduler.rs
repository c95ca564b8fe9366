use anyhow::Result;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use sitepulse_kpi::pipeline::{run_calculation_cycle, CycleOutcome};
use sitepulse_kpi::{AlertEngine, KpiCalculator, SnapshotStore};
use sitepulse_storage::KpiStore;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::retry::{with_retry, RetryPolicy};

/// Outcome of one fan-out over projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum Job {
    Calculate,
    CheckThresholds,
}

impl Job {
    fn label(self) -> &'static str {
        match self {
            Job::Calculate => "kpi-calculation",
            Job::CheckThresholds => "kpi-threshold-check",
        }
    }
}

/// Drives the three periodic KPI jobs: calculation, threshold checks and
/// the weekly history purge.
///
/// Each job fans out one unit of work per active project. Units run
/// concurrently up to `max_concurrent`, retry transient failures, and a
/// failing project never aborts the others.
pub struct KpiScheduler {
    store: Arc<KpiStore>,
    calculator: Arc<KpiCalculator>,
    config: SchedulerConfig,
    purge_weekday: Weekday,
    retry: RetryPolicy,
}

impl KpiScheduler {
    pub fn new(
        store: Arc<KpiStore>,
        calculator: Arc<KpiCalculator>,
        config: SchedulerConfig,
    ) -> Self {
        let purge_weekday = match config.purge_day() {
            Ok(day) => day,
            Err(e) => {
                tracing::warn!(error = %e, "Falling back to Sunday for history purge");
                Weekday::Sun
            }
        };
        let retry = RetryPolicy::new(config.retry_attempts, config.retry_base_delay_ms);
        Self {
            store,
            calculator,
            config,
            purge_weekday,
            retry,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            calculation_interval_secs = self.config.calculation_interval_secs,
            threshold_interval_secs = self.config.threshold_interval_secs,
            purge_weekday = %self.purge_weekday,
            purge_hour = self.config.purge_hour,
            max_concurrent = self.config.max_concurrent,
            "KPI scheduler started"
        );
        tokio::join!(
            self.calculation_loop(),
            self.threshold_loop(),
            self.purge_loop()
        );
    }

    async fn calculation_loop(&self) {
        let mut tick = interval(Duration::from_secs(self.config.calculation_interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if let Err(e) = self.run_calculation_round().await {
                tracing::error!(error = %e, "KPI calculation round failed");
            }
        }
    }

    async fn threshold_loop(&self) {
        let mut tick = interval(Duration::from_secs(self.config.threshold_interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if let Err(e) = self.run_threshold_round().await {
                tracing::error!(error = %e, "KPI threshold round failed");
            }
        }
    }

    async fn purge_loop(&self) {
        loop {
            let now = Utc::now();
            let next = next_weekly_run(now, self.purge_weekday, self.config.purge_hour);
            tracing::debug!(next = %next, "Next KPI history purge scheduled");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
            if let Err(e) = self.run_purge().await {
                tracing::error!(error = %e, "KPI history purge failed");
            }
        }
    }

    /// Calculation cycle for every active project.
    pub async fn run_calculation_round(&self) -> Result<RoundReport> {
        let projects = self.active_project_ids().await?;
        self.fan_out(Job::Calculate, projects).await
    }

    /// Threshold check for every active project.
    pub async fn run_threshold_round(&self) -> Result<RoundReport> {
        let projects = self.active_project_ids().await?;
        self.fan_out(Job::CheckThresholds, projects).await
    }

    /// Calculation cycle for the given projects only.
    pub async fn calculate_projects(&self, project_ids: Vec<String>) -> Result<RoundReport> {
        self.fan_out(Job::Calculate, project_ids).await
    }

    /// Threshold check for the given projects only.
    pub async fn check_projects(&self, project_ids: Vec<String>) -> Result<RoundReport> {
        self.fan_out(Job::CheckThresholds, project_ids).await
    }

    /// Deletes history older than the retention window.
    pub async fn run_purge(&self) -> Result<u64> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(self.config.retention_days));
        let store = self.store.as_ref();
        with_retry(self.retry, "kpi-history-purge", move || store.purge_history(cutoff)).await
    }

    async fn active_project_ids(&self) -> Result<Vec<String>> {
        let store = self.store.as_ref();
        let projects =
            with_retry(self.retry, "list-active-projects", move || store.list_active_projects())
                .await?;
        Ok(projects.into_iter().map(|p| p.id).collect())
    }

    async fn fan_out(&self, job: Job, project_ids: Vec<String>) -> Result<RoundReport> {
        if project_ids.is_empty() {
            return Ok(RoundReport::default());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let mut handles = Vec::with_capacity(project_ids.len());

        for project_id in project_ids {
            let permit = semaphore.clone().acquire_owned().await?;
            let store = self.store.clone();
            let calculator = self.calculator.clone();
            let retry = self.retry;

            let handle = tokio::spawn(async move {
                let result = match job {
                    Job::Calculate => calculate_project(&store, &calculator, retry, &project_id)
                        .await
                        .map(|_| ()),
                    Job::CheckThresholds => check_project(&store, retry, &project_id)
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = &result {
                    let error = format!("{e:#}");
                    tracing::error!(
                        project_id = %project_id,
                        job = job.label(),
                        error = %error,
                        "Project unit of work failed"
                    );
                }
                drop(permit);
                result.is_ok()
            });
            handles.push(handle);
        }

        let mut report = RoundReport::default();
        for handle in handles {
            match handle.await {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    tracing::error!(job = job.label(), error = %e, "Project task panicked");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            job = job.label(),
            succeeded = report.succeeded,
            failed = report.failed,
            "KPI round finished"
        );
        Ok(report)
    }
}

/// One retried calculation cycle. Unknown projects fail without retry.
pub async fn calculate_project(
    store: &KpiStore,
    calculator: &KpiCalculator,
    retry: RetryPolicy,
    project_id: &str,
) -> Result<CycleOutcome> {
    with_retry(retry, Job::Calculate.label(), move || async move {
        store.require_project(project_id).await?;
        run_calculation_cycle(calculator, store, store, project_id, Utc::now()).await
    })
    .await
}

/// One retried threshold check, returning the number of alerts opened.
pub async fn check_project(store: &KpiStore, retry: RetryPolicy, project_id: &str) -> Result<usize> {
    with_retry(retry, Job::CheckThresholds.label(), move || async move {
        store.require_project(project_id).await?;
        AlertEngine::new(store, store).check_thresholds(project_id).await
    })
    .await
}

/// The first `weekday` at `hour`:00 UTC strictly after `now`.
pub fn next_weekly_run(now: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let days_ahead = (7 + weekday.num_days_from_monday() - now.weekday().num_days_from_monday()) % 7;
    let candidate = (now.date_naive() + ChronoDuration::days(i64::from(days_ahead)))
        .and_time(at)
        .and_utc();
    if candidate > now {
        candidate
    } else {
        candidate + ChronoDuration::days(7)
    }
}
