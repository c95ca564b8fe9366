//! Read side of the dashboard: current KPI readings, daily history and
//! project counters.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sitepulse_common::types::{
    DailyAggregate, KpiId, KpiSnapshot, KpiStatus, KpiValue, ValueSource,
};
use sitepulse_kpi::classify::variance;
use sitepulse_kpi::formulas::Scope;
use sitepulse_kpi::{definition, AlertStore, KpiCalculator, KpiError, SnapshotStore};
use sitepulse_storage::{KpiStore, ProjectSummary};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub const DEFAULT_HISTORY_DAYS: u32 = 7;
pub const MAX_HISTORY_DAYS: u32 = 365;

/// 单个 KPI 当前读数
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct KpiReading {
    pub value: f64,
    pub target: f64,
    pub threshold_warning: f64,
    pub threshold_critical: f64,
    pub status: KpiStatus,
    /// 相对目标值的偏差百分比
    pub variance: f64,
    pub unit: String,
    /// measured / no_activity / baseline
    pub source: ValueSource,
    /// 快照写入时间；实时计算的读数为 null
    pub recorded_at: Option<DateTime<Utc>>,
}

impl From<KpiSnapshot> for KpiReading {
    fn from(s: KpiSnapshot) -> Self {
        Self {
            value: s.value,
            target: s.target,
            threshold_warning: s.threshold_warning,
            threshold_critical: s.threshold_critical,
            status: s.status,
            variance: variance(s.value, s.target),
            unit: definition(s.kpi_id).unit.to_string(),
            source: s.source,
            recorded_at: Some(s.recorded_at),
        }
    }
}

impl From<KpiValue> for KpiReading {
    fn from(v: KpiValue) -> Self {
        Self {
            value: v.value,
            target: v.target,
            threshold_warning: v.threshold_warning,
            threshold_critical: v.threshold_critical,
            status: v.status,
            variance: v.variance,
            unit: v.unit,
            source: v.source,
            recorded_at: None,
        }
    }
}

/// KPI 历史
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct KpiHistory {
    pub kpi_id: KpiId,
    pub period_days: u32,
    pub data: Vec<DailyAggregate>,
}

/// KPI 状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub ok: usize,
    pub warning: usize,
    pub critical: usize,
}

/// 仪表盘汇总
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub documents_total: u64,
    pub documents_analyzed: u64,
    pub rfis_total: u64,
    pub rfis_open: u64,
    pub rfis_overdue: u64,
    pub rfis_closed: u64,
    pub transmittals_total: u64,
    pub transmittals_pending: u64,
    pub transmittals_approved: u64,
    pub kpi_status: StatusCounts,
    pub open_alerts: usize,
}

impl DashboardSummary {
    fn new(counts: ProjectSummary, kpi_status: StatusCounts, open_alerts: usize) -> Self {
        Self {
            documents_total: counts.documents_total,
            documents_analyzed: counts.documents_analyzed,
            rfis_total: counts.rfis_total,
            rfis_open: counts.rfis_open,
            rfis_overdue: counts.rfis_overdue,
            rfis_closed: counts.rfis_closed,
            transmittals_total: counts.transmittals_total,
            transmittals_pending: counts.transmittals_pending,
            transmittals_approved: counts.transmittals_approved,
            kpi_status,
            open_alerts,
        }
    }
}

/// Stateless view over the store. Every call fails with not-found for an
/// unknown project.
pub struct DashboardService<'a> {
    store: &'a KpiStore,
    calculator: &'a KpiCalculator,
}

impl<'a> DashboardService<'a> {
    pub fn new(store: &'a KpiStore, calculator: &'a KpiCalculator) -> Self {
        Self { store, calculator }
    }

    /// Latest stored reading of every KPI. A KPI that was never recorded is
    /// computed on the spot and carries no `recorded_at`.
    pub async fn all_kpis(
        &self,
        project_id: &str,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<KpiId, KpiReading>> {
        self.store.require_project(project_id).await?;

        let mut readings: BTreeMap<KpiId, KpiReading> = self
            .store
            .latest_all(project_id)
            .await?
            .into_iter()
            .map(|s| (s.kpi_id, KpiReading::from(s)))
            .collect();

        let scope = Scope::new(project_id, now);
        for kpi_id in self.calculator.kpi_ids() {
            if readings.contains_key(&kpi_id) {
                continue;
            }
            if let Some(value) = self
                .calculator
                .calculate_one(self.store, kpi_id, &scope)
                .await?
            {
                readings.insert(kpi_id, value.into());
            }
        }
        Ok(readings)
    }

    /// Daily aggregates of one KPI over the last `days` days.
    pub async fn history(
        &self,
        project_id: &str,
        kpi_id: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<KpiHistory> {
        let kpi_id: KpiId = kpi_id.parse()?;
        if !(1..=MAX_HISTORY_DAYS).contains(&days) {
            return Err(KpiError::InvalidInput(format!(
                "days must be between 1 and {MAX_HISTORY_DAYS}, got {days}"
            ))
            .into());
        }
        self.store.require_project(project_id).await?;

        let since = now - Duration::days(i64::from(days));
        let data = self.store.history(project_id, kpi_id, since).await?;
        Ok(KpiHistory {
            kpi_id,
            period_days: days,
            data,
        })
    }

    pub async fn summary(&self, project_id: &str, now: DateTime<Utc>) -> Result<DashboardSummary> {
        let readings = self.all_kpis(project_id, now).await?;
        let counts = self.store.project_summary(project_id, now).await?;

        let mut kpi_status = StatusCounts::default();
        for reading in readings.values() {
            match reading.status {
                KpiStatus::Ok => kpi_status.ok += 1,
                KpiStatus::Warning => kpi_status.warning += 1,
                KpiStatus::Critical => kpi_status.critical += 1,
            }
        }
        let open_alerts = self
            .store
            .list_alerts(project_id, Some(false))
            .await?
            .len();

        Ok(DashboardSummary::new(counts, kpi_status, open_alerts))
    }
}
