use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use sitepulse_common::types::{CycleStamp, KpiValue};

use crate::calculator::KpiCalculator;
use crate::formulas::Scope;
use crate::source::MetricSource;
use crate::store::SnapshotStore;

/// Length of the period a real-time cycle is stamped with.
pub const CYCLE_PERIOD_MINUTES: i64 = 5;

/// Result of one calculation cycle for one project.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub project_id: String,
    pub recorded_at: DateTime<Utc>,
    pub values: Vec<KpiValue>,
}

/// Computes every KPI of a project and records them as one cycle.
///
/// A source failure aborts before anything is written, so a failed cycle
/// leaves the previous snapshots authoritative.
pub async fn run_calculation_cycle(
    calculator: &KpiCalculator,
    source: &dyn MetricSource,
    store: &dyn SnapshotStore,
    project_id: &str,
    now: DateTime<Utc>,
) -> Result<CycleOutcome> {
    let scope = Scope::new(project_id, now);
    let values = calculator.calculate_all(source, &scope).await?;

    let stamp = CycleStamp::real_time(now, Duration::minutes(CYCLE_PERIOD_MINUTES));
    store.record_cycle(project_id, &values, &stamp).await?;

    let degraded = values
        .iter()
        .filter(|v| v.status.alert_type().is_some())
        .count();
    tracing::info!(
        project_id = %project_id,
        kpis = values.len(),
        degraded,
        "Recorded KPI cycle"
    );

    Ok(CycleOutcome {
        project_id: project_id.to_string(),
        recorded_at: stamp.recorded_at,
        values,
    })
}
