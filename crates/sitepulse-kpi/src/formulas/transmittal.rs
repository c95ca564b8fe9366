use anyhow::Result;
use async_trait::async_trait;
use sitepulse_common::types::KpiId;

use super::{finite_count, mean, KpiFormula, Measurement, Scope};
use crate::definition::{definition, KpiDefinition};
use crate::source::MetricSource;

/// KPI-006: mean days from submission to approval.
pub struct TransmittalApprovalTime;

#[async_trait]
impl KpiFormula for TransmittalApprovalTime {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi006)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let days = source
            .transmittal_approval_days(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(match mean(&days) {
            Some(avg) => Measurement::measured(avg, finite_count(&days)),
            None => Measurement::no_activity(0.0),
        })
    }
}
