use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use sitepulse_common::types::{KpiId, TimeWindow};

use super::{ratio_percent, KpiFormula, Measurement, Scope};
use crate::definition::{definition, KpiDefinition};
use crate::source::MetricSource;

/// KPI-001: share of document uploads that did not fail.
///
/// Looks at the trailing 24 hours unless the scope carries a window.
pub struct UploadSuccessRate;

impl UploadSuccessRate {
    pub const DEFAULT_WINDOW_HOURS: i64 = 24;
}

#[async_trait]
impl KpiFormula for UploadSuccessRate {
    fn definition(&self) -> &'static KpiDefinition {
        definition(KpiId::Kpi001)
    }

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement> {
        let window = scope.window.unwrap_or_else(|| {
            TimeWindow::trailing(scope.now, Duration::hours(Self::DEFAULT_WINDOW_HOURS))
        });
        let counts = source.upload_counts(scope.project_id, &window).await?;
        let succeeded = counts.total.saturating_sub(counts.failed);
        Ok(ratio_percent(succeeded, counts.total))
    }
}
