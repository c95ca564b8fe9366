//! Status classification and variance.

use sitepulse_common::types::KpiStatus;

/// Three-way classification shared by every KPI, durations included.
///
/// - `OK` when `value >= target`
/// - `WARNING` when `threshold_warning <= value < target`
/// - `CRITICAL` when `value < threshold_warning`
///
/// The critical threshold never takes part in the decision.
///
/// # Examples
///
/// ```
/// use sitepulse_common::types::KpiStatus;
/// use sitepulse_kpi::classify::classify;
///
/// assert_eq!(classify(99.5, 99.5, 99.0), KpiStatus::Ok);
/// assert_eq!(classify(99.0, 99.5, 99.0), KpiStatus::Warning);
/// assert_eq!(classify(98.9, 99.5, 99.0), KpiStatus::Critical);
/// ```
pub fn classify(value: f64, target: f64, threshold_warning: f64) -> KpiStatus {
    if value >= target {
        KpiStatus::Ok
    } else if value >= threshold_warning {
        KpiStatus::Warning
    } else {
        KpiStatus::Critical
    }
}

/// Signed deviation from target in percent, rounded to one decimal.
/// Returns `0.0` when the target is zero.
///
/// # Examples
///
/// ```
/// use sitepulse_kpi::classify::variance;
///
/// assert_eq!(variance(85.5, 95.0), -10.0);
/// assert_eq!(variance(12.0, 0.0), 0.0);
/// ```
pub fn variance(value: f64, target: f64) -> f64 {
    if target == 0.0 {
        return 0.0;
    }
    round_to((value - target) / target * 100.0, 1)
}

/// Rounds half away from zero to `precision` decimal places.
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).round() / factor
}
