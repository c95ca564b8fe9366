use anyhow::Result;
use async_trait::async_trait;
use sitepulse_common::types::KpiId;

use super::{finite_count, mean, percentile, KpiFormula, Measurement, Scope};
use crate::definition::{definition, KpiDefinition};
use crate::source::MetricSource;

/// Reported for KPI-002 until the first analysis has been timed.
pub const ANALYSIS_TIME_BASELINE_SECS: f64 = 25.0;

/// Reported for KPI-003 until the first analysis has been scored.
pub const ANALYSIS_ACCURACY_BASELINE: f64 = 92.0;

/// KPI-002: median AI analysis processing time in seconds.
pub struct AnalysisTimeP50;

#[async_trait]
impl KpiFormula for AnalysisTimeP50 {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi002)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let durations = source
            .analysis_durations(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(match percentile(&durations, 50.0) {
            Some(p50) => Measurement::measured(p50, finite_count(&durations)),
            None => Measurement::baseline(ANALYSIS_TIME_BASELINE_SECS),
        })
    }
}

/// KPI-003: mean AI confidence score as a percentage.
pub struct AnalysisAccuracy;

#[async_trait]
impl KpiFormula for AnalysisAccuracy {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi003)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let scores = source
            .confidence_scores(scope.project_id, scope.window.as_ref())
            .await?;
        Ok(match mean(&scores) {
            Some(avg) => Measurement::measured(avg * 100.0, finite_count(&scores)),
            None => Measurement::baseline(ANALYSIS_ACCURACY_BASELINE),
        })
    }
}
