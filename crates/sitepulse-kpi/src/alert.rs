use anyhow::Result;
use chrono::Utc;
use sitepulse_common::types::{Alert, KpiSnapshot, KpiStatus, NewAlert};

use crate::definition::definition;
use crate::error::KpiError;
use crate::store::{AlertStore, SnapshotStore};

/// Raises and acknowledges dashboard alerts from stored snapshots.
///
/// The engine borrows its stores and keeps nothing between calls; build one
/// wherever a check or acknowledgment is needed.
pub struct AlertEngine<'a> {
    snapshots: &'a dyn SnapshotStore,
    alerts: &'a dyn AlertStore,
}

impl<'a> AlertEngine<'a> {
    pub fn new(snapshots: &'a dyn SnapshotStore, alerts: &'a dyn AlertStore) -> Self {
        Self { snapshots, alerts }
    }

    /// Opens an alert for every degraded KPI of the project that does not
    /// already have one. Returns the number of alerts created.
    pub async fn check_thresholds(&self, project_id: &str) -> Result<usize> {
        let mut pending = Vec::new();
        for snapshot in self.snapshots.latest_all(project_id).await? {
            let Some(alert) = build_alert(&snapshot) else {
                continue;
            };
            if self.alerts.has_open_alert(project_id, snapshot.kpi_id).await? {
                tracing::debug!(
                    project_id = %project_id,
                    kpi_id = %snapshot.kpi_id,
                    "Open alert exists, suppressing"
                );
                continue;
            }
            pending.push(alert);
        }

        if pending.is_empty() {
            return Ok(0);
        }

        // 并发检查可能同时通过上面的判断，由存储层唯一约束兜底
        let created = self.alerts.insert_open_alerts(&pending).await?;
        if created > 0 {
            tracing::info!(project_id = %project_id, created, "Opened KPI alerts");
        }
        Ok(created)
    }

    /// Acknowledges an alert. Acknowledging twice keeps the first
    /// `acknowledged_by` and `acknowledged_at`.
    pub async fn acknowledge(&self, alert_id: &str, acknowledged_by: &str) -> Result<Alert> {
        let alert = self.find(alert_id).await?;
        if alert.acknowledged {
            return Ok(alert);
        }

        let changed = self
            .alerts
            .mark_acknowledged(alert_id, acknowledged_by, Utc::now())
            .await?;
        if changed {
            tracing::info!(alert_id = %alert_id, acknowledged_by = %acknowledged_by, "Alert acknowledged");
        }
        self.find(alert_id).await
    }

    pub async fn list_alerts(&self, project_id: &str, acknowledged: Option<bool>) -> Result<Vec<Alert>> {
        self.alerts.list_alerts(project_id, acknowledged).await
    }

    async fn find(&self, alert_id: &str) -> Result<Alert> {
        self.alerts
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| {
                KpiError::NotFound {
                    entity: "alert",
                    id: alert_id.to_string(),
                }
                .into()
            })
    }
}

/// The alert a snapshot calls for, `None` when the KPI is OK.
pub fn build_alert(snapshot: &KpiSnapshot) -> Option<NewAlert> {
    let alert_type = snapshot.status.alert_type()?;
    let threshold = match snapshot.status {
        KpiStatus::Critical => snapshot.threshold_warning,
        _ => snapshot.target,
    };
    Some(NewAlert {
        project_id: snapshot.project_id.clone(),
        kpi_id: snapshot.kpi_id,
        alert_type,
        message: alert_message(snapshot),
        value: snapshot.value,
        threshold,
    })
}

/// Human-readable alert text, e.g.
/// `KPI-001 is below target: 99.2% (target: 99.5)`.
pub fn alert_message(snapshot: &KpiSnapshot) -> String {
    let def = definition(snapshot.kpi_id);
    match snapshot.status {
        KpiStatus::Critical => format!(
            "{} is critically low: {}{} (warning threshold: {})",
            snapshot.kpi_id, snapshot.value, def.unit, snapshot.threshold_warning
        ),
        _ => format!(
            "{} is below target: {}{} (target: {})",
            snapshot.kpi_id, snapshot.value, def.unit, snapshot.target
        ),
    }
}
