use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use sitepulse_common::types::{CycleStamp, DailyAggregate, KpiId, KpiSnapshot, KpiValue};
use sitepulse_kpi::SnapshotStore;
use std::collections::HashSet;

use crate::entities::{kpi_history, kpi_metric};
use crate::error::StorageError;
use crate::store::{parse_column, to_db_time, KpiStore};

fn to_snapshot(m: kpi_metric::Model) -> Result<KpiSnapshot> {
    Ok(KpiSnapshot {
        kpi_id: parse_column("kpi_id", &m.kpi_id)?,
        status: parse_column("status", &m.status)?,
        source: parse_column("source", &m.source)?,
        id: m.id,
        project_id: m.project_id,
        value: m.value,
        target: m.target,
        threshold_warning: m.threshold_warning,
        threshold_critical: m.threshold_critical,
        period: m.period,
        recorded_at: m.recorded_at.with_timezone(&Utc),
    })
}

fn validate_cycle(project_id: &str, values: &[KpiValue]) -> Result<()> {
    let mut seen = HashSet::new();
    for v in values {
        if v.project_id != project_id {
            return Err(StorageError::InvalidInput(format!(
                "{} belongs to project {}, not {project_id}",
                v.kpi_id, v.project_id
            ))
            .into());
        }
        if !seen.insert(v.kpi_id) {
            return Err(StorageError::InvalidInput(format!(
                "{} appears twice in one cycle",
                v.kpi_id
            ))
            .into());
        }
    }
    Ok(())
}

impl KpiStore {
    /// 项目的快照行数（含被后续周期取代的行）。
    pub async fn count_snapshots(&self, project_id: &str) -> Result<u64> {
        Ok(kpi_metric::Entity::find()
            .filter(kpi_metric::Column::ProjectId.eq(project_id))
            .count(self.db())
            .await?)
    }
}

#[async_trait]
impl SnapshotStore for KpiStore {
    async fn record_cycle(
        &self,
        project_id: &str,
        values: &[KpiValue],
        stamp: &CycleStamp,
    ) -> Result<()> {
        validate_cycle(project_id, values)?;
        if values.is_empty() {
            return Ok(());
        }

        let recorded_at = to_db_time(stamp.recorded_at);
        let metrics = values.iter().map(|v| kpi_metric::ActiveModel {
            id: Set(sitepulse_common::id::next_id()),
            project_id: Set(project_id.to_string()),
            kpi_id: Set(v.kpi_id.to_string()),
            value: Set(v.value),
            target: Set(v.target),
            threshold_warning: Set(v.threshold_warning),
            threshold_critical: Set(v.threshold_critical),
            status: Set(v.status.to_string()),
            source: Set(v.source.to_string()),
            period: Set(stamp.period.clone()),
            recorded_at: Set(recorded_at),
        });
        let history = values.iter().map(|v| kpi_history::ActiveModel {
            id: Set(sitepulse_common::id::next_id()),
            project_id: Set(project_id.to_string()),
            kpi_id: Set(v.kpi_id.to_string()),
            value: Set(v.value),
            target: Set(v.target),
            status: Set(v.status.to_string()),
            source: Set(v.source.to_string()),
            recorded_at: Set(recorded_at),
            period_start: Set(to_db_time(stamp.period_start)),
            period_end: Set(to_db_time(stamp.period_end)),
        });

        // 快照与历史同一事务提交，失败时整体回滚
        let txn = self.db().begin().await?;
        kpi_metric::Entity::insert_many(metrics)
            .exec_without_returning(&txn)
            .await?;
        kpi_history::Entity::insert_many(history)
            .exec_without_returning(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    async fn latest(&self, project_id: &str, kpi_id: KpiId) -> Result<Option<KpiSnapshot>> {
        let model = kpi_metric::Entity::find()
            .filter(kpi_metric::Column::ProjectId.eq(project_id))
            .filter(kpi_metric::Column::KpiId.eq(kpi_id.as_str()))
            .order_by(kpi_metric::Column::RecordedAt, Order::Desc)
            .order_by(kpi_metric::Column::Id, Order::Desc)
            .one(self.db())
            .await?;
        model.map(to_snapshot).transpose()
    }

    async fn latest_all(&self, project_id: &str) -> Result<Vec<KpiSnapshot>> {
        let mut out = Vec::with_capacity(KpiId::ALL.len());
        for kpi_id in KpiId::ALL {
            if let Some(snapshot) = self.latest(project_id, kpi_id).await? {
                out.push(snapshot);
            }
        }
        Ok(out)
    }

    async fn history(
        &self,
        project_id: &str,
        kpi_id: KpiId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAggregate>> {
        self.daily_history(project_id, kpi_id, since).await
    }

    async fn purge_history(&self, older_than: DateTime<Utc>) -> Result<u64> {
        self.delete_history_before(older_than).await
    }
}
