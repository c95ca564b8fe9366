//! Persistence seams of the pipeline.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitepulse_common::types::{
    Alert, CycleStamp, DailyAggregate, KpiId, KpiSnapshot, KpiValue, NewAlert,
};

/// Current snapshots plus the append-only history.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Appends one snapshot row and one history row per value, all stamped
    /// with `stamp.recorded_at`. Either every row is written or none is.
    async fn record_cycle(
        &self,
        project_id: &str,
        values: &[KpiValue],
        stamp: &CycleStamp,
    ) -> Result<()>;

    /// Most recent snapshot of one KPI.
    async fn latest(&self, project_id: &str, kpi_id: KpiId) -> Result<Option<KpiSnapshot>>;

    /// Most recent snapshot of every KPI that has ever been recorded,
    /// ordered by KPI id.
    async fn latest_all(&self, project_id: &str) -> Result<Vec<KpiSnapshot>>;

    /// History since `since`, bucketed by UTC date, ascending.
    async fn history(
        &self,
        project_id: &str,
        kpi_id: KpiId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAggregate>>;

    /// Deletes history rows recorded before `older_than`. Snapshots stay.
    async fn purge_history(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

/// Dashboard alerts scoped by project.
///
/// Implementations must guarantee at most one unacknowledged alert per
/// `(project_id, kpi_id)` even under concurrent writers.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn has_open_alert(&self, project_id: &str, kpi_id: KpiId) -> Result<bool>;

    /// Inserts the alerts in one transaction, silently skipping any that
    /// would open a second alert for the same KPI. Returns how many were
    /// inserted.
    async fn insert_open_alerts(&self, alerts: &[NewAlert]) -> Result<usize>;

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>>;

    /// Acknowledges the alert if it is still open. Returns `false` when the
    /// alert is unknown or was already acknowledged.
    async fn mark_acknowledged(
        &self,
        alert_id: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Alerts of a project, newest first. `acknowledged` filters exactly
    /// when set.
    async fn list_alerts(&self, project_id: &str, acknowledged: Option<bool>) -> Result<Vec<Alert>>;
}
