//! One [`KpiFormula`] per KPI.

pub mod analysis;
pub mod rfi;
pub mod transmittal;
pub mod uploads;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sitepulse_common::types::{TimeWindow, ValueSource};

use crate::definition::KpiDefinition;
use crate::source::MetricSource;

/// What a formula is computed over.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub project_id: &'a str,
    /// Explicit window; formulas fall back to their own default when `None`.
    pub window: Option<TimeWindow>,
    pub now: DateTime<Utc>,
}

impl<'a> Scope<'a> {
    pub fn new(project_id: &'a str, now: DateTime<Utc>) -> Self {
        Self {
            project_id,
            window: None,
            now,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Unrounded output of a formula.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub source: ValueSource,
    pub sample_count: u64,
}

impl Measurement {
    pub fn measured(value: f64, sample_count: u64) -> Self {
        Self {
            value,
            source: ValueSource::Measured,
            sample_count,
        }
    }

    pub fn no_activity(value: f64) -> Self {
        Self {
            value,
            source: ValueSource::NoActivity,
            sample_count: 0,
        }
    }

    pub fn baseline(value: f64) -> Self {
        Self {
            value,
            source: ValueSource::Baseline,
            sample_count: 0,
        }
    }
}

/// A stateless KPI computation.
///
/// Implementations only gather and aggregate; rounding and classification
/// happen once in [`crate::calculator::evaluate`].
#[async_trait]
pub trait KpiFormula: Send + Sync {
    fn definition(&self) -> &'static KpiDefinition;

    async fn measure(&self, source: &dyn MetricSource, scope: &Scope<'_>) -> Result<Measurement>;
}

/// `numerator / denominator * 100`; an empty denominator counts as a
/// perfect score.
pub fn ratio_percent(numerator: u64, denominator: u64) -> Measurement {
    if denominator == 0 {
        return Measurement::no_activity(100.0);
    }
    Measurement::measured(
        numerator as f64 / denominator as f64 * 100.0,
        denominator,
    )
}

/// Arithmetic mean of the finite samples.
pub fn mean(samples: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Percentile `p` in `0.0..=100.0` with linear interpolation between the
/// closest ranks. Non-finite samples are ignored.
///
/// # Examples
///
/// ```
/// use sitepulse_kpi::formulas::percentile;
///
/// assert_eq!(percentile(&[40.0, 10.0, 30.0, 20.0], 50.0), Some(25.0));
/// assert_eq!(percentile(&[7.0], 50.0), Some(7.0));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
pub fn percentile(samples: &[f64], p: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Counts the finite samples in `samples`.
pub(crate) fn finite_count(samples: &[f64]) -> u64 {
    samples.iter().filter(|v| v.is_finite()).count() as u64
}
