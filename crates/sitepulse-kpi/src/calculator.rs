use anyhow::{Context, Result};
use sitepulse_common::types::{KpiId, KpiValue};

use crate::classify::{classify, round_to, variance};
use crate::definition::KpiDefinition;
use crate::formulas::analysis::{AnalysisAccuracy, AnalysisTimeP50};
use crate::formulas::rfi::{OnTimeCompletion, RfiClosureRate, RfiResponseTime};
use crate::formulas::transmittal::TransmittalApprovalTime;
use crate::formulas::uploads::UploadSuccessRate;
use crate::formulas::{KpiFormula, Measurement, Scope};
use crate::source::MetricSource;

/// Runs a set of [`KpiFormula`]s against a [`MetricSource`].
///
/// Holds no per-project state; one instance can serve every worker.
pub struct KpiCalculator {
    formulas: Vec<Box<dyn KpiFormula>>,
}

impl KpiCalculator {
    pub fn new(mut formulas: Vec<Box<dyn KpiFormula>>) -> Self {
        formulas.sort_by_key(|f| f.definition().id);
        Self { formulas }
    }

    /// The seven built-in KPIs.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(UploadSuccessRate),
            Box::new(AnalysisTimeP50),
            Box::new(AnalysisAccuracy),
            Box::new(RfiResponseTime),
            Box::new(RfiClosureRate),
            Box::new(TransmittalApprovalTime),
            Box::new(OnTimeCompletion),
        ])
    }

    pub fn kpi_ids(&self) -> Vec<KpiId> {
        self.formulas.iter().map(|f| f.definition().id).collect()
    }

    /// Computes every KPI, ordered by id. The first source failure aborts
    /// the whole set.
    pub async fn calculate_all(
        &self,
        source: &dyn MetricSource,
        scope: &Scope<'_>,
    ) -> Result<Vec<KpiValue>> {
        let mut values = Vec::with_capacity(self.formulas.len());
        for formula in &self.formulas {
            values.push(compute(formula.as_ref(), source, scope).await?);
        }
        Ok(values)
    }

    /// Computes a single KPI, `None` if this calculator does not know it.
    pub async fn calculate_one(
        &self,
        source: &dyn MetricSource,
        kpi_id: KpiId,
        scope: &Scope<'_>,
    ) -> Result<Option<KpiValue>> {
        match self.formulas.iter().find(|f| f.definition().id == kpi_id) {
            Some(formula) => Ok(Some(compute(formula.as_ref(), source, scope).await?)),
            None => Ok(None),
        }
    }
}

async fn compute(
    formula: &dyn KpiFormula,
    source: &dyn MetricSource,
    scope: &Scope<'_>,
) -> Result<KpiValue> {
    let def = formula.definition();
    let measurement = formula
        .measure(source, scope)
        .await
        .with_context(|| format!("computing {} for project {}", def.id, scope.project_id))?;
    Ok(evaluate(def, scope.project_id, measurement))
}

/// Rounds a measurement to the definition's precision, then classifies it
/// and computes the variance from the rounded value.
pub fn evaluate(def: &KpiDefinition, project_id: &str, measurement: Measurement) -> KpiValue {
    let value = round_to(measurement.value, def.precision);
    KpiValue {
        kpi_id: def.id,
        project_id: project_id.to_string(),
        value,
        target: def.target,
        threshold_warning: def.threshold_warning,
        threshold_critical: def.threshold_critical,
        unit: def.unit.to_string(),
        status: classify(value, def.target, def.threshold_warning),
        variance: variance(value, def.target),
        source: measurement.source,
        sample_count: measurement.sample_count,
    }
}
