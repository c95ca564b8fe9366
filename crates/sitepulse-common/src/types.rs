use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseEnumError;

/// Identifier of one of the seven tracked KPIs.
///
/// # Examples
///
/// ```
/// use sitepulse_common::types::KpiId;
///
/// let id: KpiId = "KPI-004".parse().unwrap();
/// assert_eq!(id, KpiId::Kpi004);
/// assert_eq!(id.to_string(), "KPI-004");
/// assert_eq!(KpiId::ALL.len(), 7);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
pub enum KpiId {
    #[serde(rename = "KPI-001")]
    Kpi001,
    #[serde(rename = "KPI-002")]
    Kpi002,
    #[serde(rename = "KPI-003")]
    Kpi003,
    #[serde(rename = "KPI-004")]
    Kpi004,
    #[serde(rename = "KPI-005")]
    Kpi005,
    #[serde(rename = "KPI-006")]
    Kpi006,
    #[serde(rename = "KPI-007")]
    Kpi007,
}

impl KpiId {
    pub const ALL: [KpiId; 7] = [
        KpiId::Kpi001,
        KpiId::Kpi002,
        KpiId::Kpi003,
        KpiId::Kpi004,
        KpiId::Kpi005,
        KpiId::Kpi006,
        KpiId::Kpi007,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            KpiId::Kpi001 => "KPI-001",
            KpiId::Kpi002 => "KPI-002",
            KpiId::Kpi003 => "KPI-003",
            KpiId::Kpi004 => "KPI-004",
            KpiId::Kpi005 => "KPI-005",
            KpiId::Kpi006 => "KPI-006",
            KpiId::Kpi007 => "KPI-007",
        }
    }
}

impl std::fmt::Display for KpiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KpiId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KpiId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("kpi id", s))
    }
}

/// Classification of a KPI value against its target and warning threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum KpiStatus {
    Ok,
    Warning,
    Critical,
}

impl KpiStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            KpiStatus::Ok => "OK",
            KpiStatus::Warning => "WARNING",
            KpiStatus::Critical => "CRITICAL",
        }
    }

    /// Alert type raised for this status, `None` when nothing is wrong.
    pub fn alert_type(self) -> Option<AlertType> {
        match self {
            KpiStatus::Ok => None,
            KpiStatus::Warning => Some(AlertType::Warning),
            KpiStatus::Critical => Some(AlertType::Critical),
        }
    }
}

impl std::fmt::Display for KpiStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for KpiStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OK" => Ok(KpiStatus::Ok),
            "WARNING" => Ok(KpiStatus::Warning),
            "CRITICAL" => Ok(KpiStatus::Critical),
            _ => Err(ParseEnumError::new("kpi status", s)),
        }
    }
}

/// Dashboard alert level, stored lowercase.
///
/// # Examples
///
/// ```
/// use sitepulse_common::types::{AlertType, KpiStatus};
///
/// assert_eq!(KpiStatus::Critical.alert_type(), Some(AlertType::Critical));
/// assert_eq!(AlertType::Warning.to_string(), "warning");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Info,
    Warning,
    Critical,
}

impl AlertType {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertType::Info => "info",
            AlertType::Warning => "warning",
            AlertType::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(AlertType::Info),
            "warning" => Ok(AlertType::Warning),
            "critical" => Ok(AlertType::Critical),
            _ => Err(ParseEnumError::new("alert type", s)),
        }
    }
}

/// Where a KPI value came from.
///
/// Values that are not backed by samples stay distinguishable from real
/// measurements all the way to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// Computed from at least one sample.
    Measured,
    /// No events in the window, so the "no activity" default applies.
    NoActivity,
    /// No samples yet, the definition baseline is reported.
    Baseline,
}

impl ValueSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueSource::Measured => "measured",
            ValueSource::NoActivity => "no_activity",
            ValueSource::Baseline => "baseline",
        }
    }
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValueSource {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "measured" => Ok(ValueSource::Measured),
            "no_activity" => Ok(ValueSource::NoActivity),
            "baseline" => Ok(ValueSource::Baseline),
            _ => Err(ParseEnumError::new("value source", s)),
        }
    }
}

/// Half-open time range `[from, to)` used by the metric source queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// The `length` immediately preceding `now`.
    pub fn trailing(now: DateTime<Utc>, length: Duration) -> Self {
        Self {
            from: now - length,
            to: now,
        }
    }
}

/// One computed and classified KPI for a project, produced once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiValue {
    pub kpi_id: KpiId,
    pub project_id: String,
    pub value: f64,
    pub target: f64,
    pub threshold_warning: f64,
    pub threshold_critical: f64,
    pub unit: String,
    pub status: KpiStatus,
    pub variance: f64,
    pub source: ValueSource,
    /// Number of underlying events the value was derived from.
    pub sample_count: u64,
}

/// Stamps shared by every row written in one calculation cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStamp {
    pub recorded_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub period: String,
}

impl CycleStamp {
    pub const REAL_TIME: &'static str = "real-time";

    /// A real-time stamp covering the `period` that ends at `now`.
    pub fn real_time(now: DateTime<Utc>, period: Duration) -> Self {
        Self {
            recorded_at: now,
            period_start: now - period,
            period_end: now,
            period: Self::REAL_TIME.to_string(),
        }
    }
}

/// A persisted KPI value; the newest row per (project, KPI) is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSnapshot {
    pub id: String,
    pub project_id: String,
    pub kpi_id: KpiId,
    pub value: f64,
    pub target: f64,
    pub threshold_warning: f64,
    pub threshold_critical: f64,
    pub status: KpiStatus,
    pub source: ValueSource,
    pub period: String,
    pub recorded_at: DateTime<Utc>,
}

/// Daily aggregate of history values for one KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DailyAggregate {
    #[schema(value_type = String, format = Date)]
    pub date: NaiveDate,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// A dashboard alert raised for a degraded KPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub project_id: String,
    pub kpi_id: KpiId,
    pub alert_type: AlertType,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// An alert about to be opened; ids and timestamps are assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub project_id: String,
    pub kpi_id: KpiId,
    pub alert_type: AlertType,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}
