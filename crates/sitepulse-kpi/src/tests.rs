use crate::alert::{alert_message, build_alert};
use crate::calculator::{evaluate, KpiCalculator};
use crate::classify::{classify, round_to, variance};
use crate::definition::{definition, DEFINITIONS};
use crate::error::KpiError;
use crate::formulas::{percentile, ratio_percent, Measurement, Scope};
use crate::pipeline::run_calculation_cycle;
use crate::source::{CompletionCounts, MetricSource, RfiCounts, UploadCounts};
use crate::store::{AlertStore, SnapshotStore};
use crate::AlertEngine;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use sitepulse_common::types::{
    Alert, CycleStamp, DailyAggregate, KpiId, KpiSnapshot, KpiStatus, KpiValue,
    NewAlert, TimeWindow, ValueSource,
};
use std::collections::BTreeMap;
use std::sync::Mutex;

// ---- fakes ----

#[derive(Default)]
struct FakeSource {
    uploads: UploadCounts,
    durations: Vec<f64>,
    scores: Vec<f64>,
    response_days: Vec<f64>,
    rfis: RfiCounts,
    approval_days: Vec<f64>,
    completion: CompletionCounts,
    fail: bool,
    seen_upload_window: Mutex<Option<TimeWindow>>,
}

impl FakeSource {
    fn check(&self) -> Result<()> {
        if self.fail {
            anyhow::bail!("source offline");
        }
        Ok(())
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn upload_counts(&self, _project_id: &str, window: &TimeWindow) -> Result<UploadCounts> {
        self.check()?;
        *self.seen_upload_window.lock().unwrap() = Some(*window);
        Ok(self.uploads)
    }

    async fn analysis_durations(&self, _: &str, _: Option<&TimeWindow>) -> Result<Vec<f64>> {
        self.check()?;
        Ok(self.durations.clone())
    }

    async fn confidence_scores(&self, _: &str, _: Option<&TimeWindow>) -> Result<Vec<f64>> {
        self.check()?;
        Ok(self.scores.clone())
    }

    async fn rfi_response_days(&self, _: &str, _: Option<&TimeWindow>) -> Result<Vec<f64>> {
        self.check()?;
        Ok(self.response_days.clone())
    }

    async fn rfi_counts(&self, _: &str, _: Option<&TimeWindow>) -> Result<RfiCounts> {
        self.check()?;
        Ok(self.rfis)
    }

    async fn transmittal_approval_days(&self, _: &str, _: Option<&TimeWindow>) -> Result<Vec<f64>> {
        self.check()?;
        Ok(self.approval_days.clone())
    }

    async fn completion_counts(&self, _: &str, _: Option<&TimeWindow>) -> Result<CompletionCounts> {
        self.check()?;
        Ok(self.completion)
    }
}

#[derive(Default)]
struct MemoryStore {
    snapshots: Mutex<Vec<KpiSnapshot>>,
    alerts: Mutex<Vec<Alert>>,
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn record_cycle(&self, project_id: &str, values: &[KpiValue], stamp: &CycleStamp) -> Result<()> {
        let mut snapshots = self.snapshots.lock().unwrap();
        for v in values {
            snapshots.push(KpiSnapshot {
                id: sitepulse_common::id::next_id(),
                project_id: project_id.to_string(),
                kpi_id: v.kpi_id,
                value: v.value,
                target: v.target,
                threshold_warning: v.threshold_warning,
                threshold_critical: v.threshold_critical,
                status: v.status,
                source: v.source,
                period: stamp.period.clone(),
                recorded_at: stamp.recorded_at,
            });
        }
        Ok(())
    }

    async fn latest(&self, project_id: &str, kpi_id: KpiId) -> Result<Option<KpiSnapshot>> {
        let snapshots = self.snapshots.lock().unwrap();
        Ok(snapshots
            .iter()
            .rev()
            .find(|s| s.project_id == project_id && s.kpi_id == kpi_id)
            .cloned())
    }

    async fn latest_all(&self, project_id: &str) -> Result<Vec<KpiSnapshot>> {
        let mut out = Vec::new();
        for kpi_id in KpiId::ALL {
            if let Some(s) = self.latest(project_id, kpi_id).await? {
                out.push(s);
            }
        }
        Ok(out)
    }

    async fn history(&self, _: &str, _: KpiId, _: DateTime<Utc>) -> Result<Vec<DailyAggregate>> {
        Ok(Vec::new())
    }

    async fn purge_history(&self, _: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn has_open_alert(&self, project_id: &str, kpi_id: KpiId) -> Result<bool> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts
            .iter()
            .any(|a| a.project_id == project_id && a.kpi_id == kpi_id && !a.acknowledged))
    }

    async fn insert_open_alerts(&self, new: &[NewAlert]) -> Result<usize> {
        let mut alerts = self.alerts.lock().unwrap();
        let mut created = 0;
        for n in new {
            let open = alerts
                .iter()
                .any(|a| a.project_id == n.project_id && a.kpi_id == n.kpi_id && !a.acknowledged);
            if open {
                continue;
            }
            alerts.push(Alert {
                id: sitepulse_common::id::next_id(),
                project_id: n.project_id.clone(),
                kpi_id: n.kpi_id,
                alert_type: n.alert_type,
                message: n.message.clone(),
                value: n.value,
                threshold: n.threshold,
                acknowledged: false,
                acknowledged_by: None,
                acknowledged_at: None,
                created_at: Utc::now(),
            });
            created += 1;
        }
        Ok(created)
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.iter().find(|a| a.id == alert_id).cloned())
    }

    async fn mark_acknowledged(&self, alert_id: &str, by: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut alerts = self.alerts.lock().unwrap();
        match alerts.iter_mut().find(|a| a.id == alert_id && !a.acknowledged) {
            Some(a) => {
                a.acknowledged = true;
                a.acknowledged_by = Some(by.to_string());
                a.acknowledged_at = Some(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_alerts(&self, project_id: &str, acknowledged: Option<bool>) -> Result<Vec<Alert>> {
        let alerts = self.alerts.lock().unwrap();
        let mut out: Vec<Alert> = alerts
            .iter()
            .filter(|a| a.project_id == project_id)
            .filter(|a| acknowledged.is_none_or(|ack| a.acknowledged == ack))
            .cloned()
            .collect();
        out.reverse();
        Ok(out)
    }
}

async fn calculate(source: &FakeSource) -> BTreeMap<KpiId, KpiValue> {
    let scope = Scope::new("p1", Utc::now());
    KpiCalculator::standard()
        .calculate_all(source, &scope)
        .await
        .unwrap()
        .into_iter()
        .map(|v| (v.kpi_id, v))
        .collect()
}

/// Every KPI at or above its target.
fn healthy_source() -> FakeSource {
    FakeSource {
        durations: vec![30.0],
        response_days: vec![3.0],
        approval_days: vec![5.0],
        ..Default::default()
    }
}

fn degraded_source() -> FakeSource {
    FakeSource {
        // 97.0% -> CRITICAL
        uploads: UploadCounts { total: 100, failed: 3 },
        // 90.0% -> WARNING
        rfis: RfiCounts { total: 10, closed: 9 },
        ..healthy_source()
    }
}

// ---- classifier ----

#[test]
fn classify_boundaries_are_inclusive() {
    assert_eq!(classify(95.0, 95.0, 85.0), KpiStatus::Ok);
    assert_eq!(classify(85.0, 95.0, 85.0), KpiStatus::Warning);
    assert_eq!(classify(84.99, 95.0, 85.0), KpiStatus::Critical);
    assert_eq!(classify(120.0, 95.0, 85.0), KpiStatus::Ok);
}

#[test]
fn duration_thresholds_use_the_same_comparison() {
    // warning threshold above target leaves no WARNING band
    assert_eq!(classify(3.0, 3.0, 4.0), KpiStatus::Ok);
    assert_eq!(classify(12.0, 3.0, 4.0), KpiStatus::Ok);
    assert_eq!(classify(2.9, 3.0, 4.0), KpiStatus::Critical);
    assert_eq!(classify(0.0, 3.0, 4.0), KpiStatus::Critical);
}

#[test]
fn variance_handles_zero_target() {
    assert_eq!(variance(42.0, 0.0), 0.0);
    assert_eq!(variance(-3.0, 0.0), 0.0);
    assert_eq!(variance(99.0, 99.5), -0.5);
    assert_eq!(variance(4.5, 3.0), 50.0);
}

#[test]
fn round_to_is_half_away_from_zero() {
    assert_eq!(round_to(98.25, 1), 98.3);
    assert_eq!(round_to(-1.25, 1), -1.3);
    assert_eq!(round_to(25.125, 2), 25.13);
    assert_eq!(round_to(7.0, 0), 7.0);
}

proptest! {
    #[test]
    fn classify_is_monotone_in_value(a in -1000.0f64..1000.0, b in -1000.0f64..1000.0,
                                     target in 0.0f64..200.0, gap in 0.0f64..50.0) {
        let warn = target - gap;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let rank = |s: KpiStatus| match s {
            KpiStatus::Critical => 0,
            KpiStatus::Warning => 1,
            KpiStatus::Ok => 2,
        };
        prop_assert!(rank(classify(lo, target, warn)) <= rank(classify(hi, target, warn)));
    }

    #[test]
    fn variance_sign_follows_value(value in -1000.0f64..1000.0, target in 0.1f64..500.0) {
        let v = variance(value, target);
        if value > target * 1.01 {
            prop_assert!(v > 0.0);
        }
        if value < target * 0.99 {
            prop_assert!(v < 0.0);
        }
    }
}

// ---- formulas ----

#[test]
fn definitions_follow_kpi_id_order() {
    for (def, id) in DEFINITIONS.iter().zip(KpiId::ALL) {
        assert_eq!(def.id, id);
        assert_eq!(definition(id).id, id);
    }
}

#[test]
fn ratio_with_empty_denominator_is_perfect() {
    let m = ratio_percent(0, 0);
    assert_eq!(m.value, 100.0);
    assert_eq!(m.source, ValueSource::NoActivity);
}

#[test]
fn percentile_interpolates_between_ranks() {
    assert_eq!(percentile(&[10.0, 20.0, 30.0, 40.0], 50.0), Some(25.0));
    assert_eq!(percentile(&[3.0, 1.0, 2.0], 50.0), Some(2.0));
    assert_eq!(percentile(&[f64::NAN, 4.0], 50.0), Some(4.0));
}

#[tokio::test]
async fn empty_project_statuses_follow_the_classifier() {
    let values = calculate(&FakeSource::default()).await;
    assert_eq!(values.len(), 7);

    for id in [KpiId::Kpi001, KpiId::Kpi005, KpiId::Kpi007] {
        assert_eq!(values[&id].value, 100.0, "{id}");
        assert_eq!(values[&id].source, ValueSource::NoActivity);
    }
    assert_eq!(values[&KpiId::Kpi002].value, 25.0);
    assert_eq!(values[&KpiId::Kpi002].source, ValueSource::Baseline);
    assert_eq!(values[&KpiId::Kpi003].value, 92.0);
    assert_eq!(values[&KpiId::Kpi003].source, ValueSource::Baseline);
    assert_eq!(values[&KpiId::Kpi004].value, 0.0);
    assert_eq!(values[&KpiId::Kpi006].value, 0.0);

    for id in [KpiId::Kpi001, KpiId::Kpi003, KpiId::Kpi005, KpiId::Kpi007] {
        assert_eq!(values[&id].status, KpiStatus::Ok, "{id}");
    }
    // below their warning thresholds on the shared axis
    for id in [KpiId::Kpi002, KpiId::Kpi004, KpiId::Kpi006] {
        assert_eq!(values[&id].status, KpiStatus::Critical, "{id}");
    }
}

#[tokio::test]
async fn healthy_source_reports_every_kpi_ok() {
    let values = calculate(&healthy_source()).await;
    for v in values.values() {
        assert_eq!(v.status, KpiStatus::Ok, "{} should be OK", v.kpi_id);
    }
}

#[tokio::test]
async fn upload_rate_defaults_to_trailing_day() {
    let source = FakeSource::default();
    let now = Utc::now();
    let scope = Scope::new("p1", now);
    KpiCalculator::standard()
        .calculate_one(&source, KpiId::Kpi001, &scope)
        .await
        .unwrap();

    let window = source.seen_upload_window.lock().unwrap().unwrap();
    assert_eq!(window.to, now);
    assert_eq!(window.from, now - Duration::hours(24));
}

#[tokio::test]
async fn explicit_window_overrides_default() {
    let source = FakeSource::default();
    let now = Utc::now();
    let week = TimeWindow::trailing(now - Duration::days(1), Duration::days(7));
    let scope = Scope::new("p1", now).with_window(week);
    KpiCalculator::standard()
        .calculate_one(&source, KpiId::Kpi001, &scope)
        .await
        .unwrap();

    assert_eq!(*source.seen_upload_window.lock().unwrap(), Some(week));
}

#[tokio::test]
async fn status_uses_rounded_value() {
    // 98.96% rounds to 99.0, which sits on the warning threshold
    let source = FakeSource {
        uploads: UploadCounts { total: 10_000, failed: 104 },
        ..Default::default()
    };
    let values = calculate(&source).await;
    let upload = &values[&KpiId::Kpi001];
    assert_eq!(upload.value, 99.0);
    assert_eq!(upload.status, KpiStatus::Warning);
    assert_eq!(upload.variance, -0.5);
    assert_eq!(upload.sample_count, 10_000);
}

#[tokio::test]
async fn measured_values_are_classified() {
    let source = FakeSource {
        durations: vec![20.0, 40.0, 50.0, 34.0],
        scores: vec![0.9, 0.8],
        response_days: vec![2.0, 5.0],
        approval_days: vec![8.0, 6.0],
        rfis: RfiCounts { total: 4, closed: 3 },
        completion: CompletionCounts { closed: 3, on_time: 3 },
        ..Default::default()
    };
    let values = calculate(&source).await;

    assert_eq!(values[&KpiId::Kpi002].value, 37.0);
    assert_eq!(values[&KpiId::Kpi002].status, KpiStatus::Ok);
    assert_eq!(values[&KpiId::Kpi003].value, 85.0);
    assert_eq!(values[&KpiId::Kpi003].status, KpiStatus::Warning);
    assert_eq!(values[&KpiId::Kpi004].value, 3.5);
    assert_eq!(values[&KpiId::Kpi004].status, KpiStatus::Ok);
    assert_eq!(values[&KpiId::Kpi005].value, 75.0);
    assert_eq!(values[&KpiId::Kpi005].status, KpiStatus::Critical);
    assert_eq!(values[&KpiId::Kpi006].value, 7.0);
    assert_eq!(values[&KpiId::Kpi006].status, KpiStatus::Ok);
    assert_eq!(values[&KpiId::Kpi007].value, 100.0);
    assert_eq!(values[&KpiId::Kpi007].source, ValueSource::Measured);
}

#[test]
fn evaluate_rounds_analysis_time_to_two_decimals() {
    let v = evaluate(definition(KpiId::Kpi002), "p1", Measurement::measured(29.996, 3));
    assert_eq!(v.value, 30.0);
    assert_eq!(v.status, KpiStatus::Ok);
    assert_eq!(v.unit, "seconds");
}

// ---- pipeline ----

#[tokio::test]
async fn source_failure_records_nothing() {
    let store = MemoryStore::default();
    let source = FakeSource {
        fail: true,
        ..Default::default()
    };
    let err = run_calculation_cycle(&KpiCalculator::standard(), &source, &store, "p1", Utc::now())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("KPI-001"), "{err:#}");
    assert!(store.snapshots.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cycle_stamps_every_kpi_identically() {
    let store = MemoryStore::default();
    let outcome = run_calculation_cycle(
        &KpiCalculator::standard(),
        &FakeSource::default(),
        &store,
        "p1",
        Utc::now(),
    )
    .await
    .unwrap();

    let snapshots = store.snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 7);
    assert!(snapshots.iter().all(|s| s.recorded_at == outcome.recorded_at));
    assert!(snapshots.iter().all(|s| s.period == CycleStamp::REAL_TIME));
}

// ---- alerts ----

async fn record(store: &MemoryStore, source: &FakeSource) {
    run_calculation_cycle(&KpiCalculator::standard(), source, store, "p1", Utc::now())
        .await
        .unwrap();
}

#[tokio::test]
async fn check_thresholds_opens_one_alert_per_degraded_kpi() {
    let store = MemoryStore::default();
    record(&store, &degraded_source()).await;
    let engine = AlertEngine::new(&store, &store);

    assert_eq!(engine.check_thresholds("p1").await.unwrap(), 2);
    assert_eq!(engine.check_thresholds("p1").await.unwrap(), 0);

    let alerts = engine.list_alerts("p1", Some(false)).await.unwrap();
    assert_eq!(alerts.len(), 2);
    let critical = alerts.iter().find(|a| a.kpi_id == KpiId::Kpi001).unwrap();
    assert_eq!(critical.alert_type.as_str(), "critical");
    assert_eq!(critical.message, "KPI-001 is critically low: 97% (warning threshold: 99)");
    assert_eq!(critical.threshold, 99.0);
    let warning = alerts.iter().find(|a| a.kpi_id == KpiId::Kpi005).unwrap();
    assert_eq!(warning.message, "KPI-005 is below target: 90% (target: 95)");
}

#[tokio::test]
async fn alerts_are_scoped_by_project() {
    let store = MemoryStore::default();
    record(&store, &degraded_source()).await;
    run_calculation_cycle(&KpiCalculator::standard(), &degraded_source(), &store, "p2", Utc::now())
        .await
        .unwrap();
    let engine = AlertEngine::new(&store, &store);

    assert_eq!(engine.check_thresholds("p1").await.unwrap(), 2);
    assert_eq!(engine.check_thresholds("p2").await.unwrap(), 2);
}

#[tokio::test]
async fn recovered_kpi_keeps_its_open_alert() {
    let store = MemoryStore::default();
    record(&store, &degraded_source()).await;
    let engine = AlertEngine::new(&store, &store);
    engine.check_thresholds("p1").await.unwrap();

    record(&store, &healthy_source()).await;
    assert_eq!(engine.check_thresholds("p1").await.unwrap(), 0);
    assert_eq!(engine.list_alerts("p1", Some(false)).await.unwrap().len(), 2);
}

#[tokio::test]
async fn acknowledge_is_idempotent() {
    let store = MemoryStore::default();
    record(&store, &degraded_source()).await;
    let engine = AlertEngine::new(&store, &store);
    engine.check_thresholds("p1").await.unwrap();
    let alert_id = engine.list_alerts("p1", None).await.unwrap()[0].id.clone();

    let first = engine.acknowledge(&alert_id, "alice").await.unwrap();
    assert!(first.acknowledged);
    assert_eq!(first.acknowledged_by.as_deref(), Some("alice"));

    let second = engine.acknowledge(&alert_id, "bob").await.unwrap();
    assert_eq!(second.acknowledged_by.as_deref(), Some("alice"));
    assert_eq!(second.acknowledged_at, first.acknowledged_at);
}

#[tokio::test]
async fn acknowledge_unknown_alert_is_not_found() {
    let store = MemoryStore::default();
    let engine = AlertEngine::new(&store, &store);
    let err = engine.acknowledge("missing", "alice").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<KpiError>(),
        Some(KpiError::NotFound { entity: "alert", .. })
    ));
}

#[tokio::test]
async fn acknowledged_kpi_can_alert_again() {
    let store = MemoryStore::default();
    record(&store, &degraded_source()).await;
    let engine = AlertEngine::new(&store, &store);
    engine.check_thresholds("p1").await.unwrap();
    for alert in engine.list_alerts("p1", Some(false)).await.unwrap() {
        engine.acknowledge(&alert.id, "alice").await.unwrap();
    }

    assert_eq!(engine.check_thresholds("p1").await.unwrap(), 2);
    assert_eq!(engine.list_alerts("p1", None).await.unwrap().len(), 4);
    assert_eq!(engine.list_alerts("p1", Some(true)).await.unwrap().len(), 2);
}

#[test]
fn duration_messages_use_the_shared_wording() {
    let snapshot = KpiSnapshot {
        id: "1".into(),
        project_id: "p1".into(),
        kpi_id: KpiId::Kpi004,
        value: 0.0,
        target: 3.0,
        threshold_warning: 4.0,
        threshold_critical: 5.0,
        status: KpiStatus::Critical,
        source: ValueSource::Measured,
        period: "real-time".into(),
        recorded_at: Utc::now(),
    };
    assert_eq!(
        alert_message(&snapshot),
        "KPI-004 is critically low: 0days (warning threshold: 4)"
    );

    let ok = KpiSnapshot {
        status: KpiStatus::Ok,
        ..snapshot
    };
    assert!(build_alert(&ok).is_none());
}
