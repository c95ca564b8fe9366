use anyhow::Result;
use async_trait::async_trait;
use sitepulse_common::types::KpiId;

use super::{finite_count, mean, ratio_percent, KpiFormula, Measurement, Scope};
use crate::definition::{definition, KpiDefinition};
use crate::source::MetricSource;

/// KPI-004: mean days until an RFI gets its first response.
pub struct RfiResponseTime;

#[async_trait]
impl KpiFormula for RfiResponseTime {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi004)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let days = source
            .rfi_response_days(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(match mean(&days) {
            Some(avg) => Measurement::measured(avg, finite_count(&days)),
            None => Measurement::no_activity(0.0),
        })
    }
}

/// KPI-005: closed RFIs over all RFIs.
pub struct RfiClosureRate;

#[async_trait]
impl KpiFormula for RfiClosureRate {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi005)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let counts = source
            .rfi_counts(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(ratio_percent(counts.closed.min(counts.total), counts.total))
    }
}

/// KPI-007: closed items that met their due date.
pub struct OnTimeCompletion;

#[async_trait]
impl KpiFormula for OnTimeCompletion {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi007)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let counts = source
            .completion_counts(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(ratio_percent(counts.on_time.min(counts.closed), counts.closed))
    }
}
