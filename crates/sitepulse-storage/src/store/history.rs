use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder};
use sitepulse_common::types::{DailyAggregate, KpiId};
use sitepulse_kpi::classify::round_to;
use std::collections::BTreeMap;

use crate::entities::kpi_history::{self, Column, Entity};
use crate::store::{to_db_time, KpiStore};

#[derive(Default)]
struct Bucket {
    sum: f64,
    count: u32,
    max: f64,
    min: f64,
}

impl Bucket {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.max = value;
            self.min = value;
        } else {
            self.max = self.max.max(value);
            self.min = self.min.min(value);
        }
        self.sum += value;
        self.count += 1;
    }
}

impl KpiStore {
    /// 按 UTC 日期聚合历史记录（avg/max/min，保留两位小数），日期升序。
    pub async fn daily_history(
        &self,
        project_id: &str,
        kpi_id: KpiId,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyAggregate>> {
        let rows = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::KpiId.eq(kpi_id.as_str()))
            .filter(Column::RecordedAt.gte(to_db_time(since)))
            .order_by(Column::RecordedAt, Order::Asc)
            .all(self.db())
            .await?;

        let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        for row in rows {
            let day = row.recorded_at.with_timezone(&Utc).date_naive();
            buckets.entry(day).or_default().push(row.value);
        }

        Ok(buckets
            .into_iter()
            .map(|(date, b)| DailyAggregate {
                date,
                avg: round_to(b.sum / f64::from(b.count), 2),
                max: round_to(b.max, 2),
                min: round_to(b.min, 2),
            })
            .collect())
    }

    /// 删除 `older_than` 之前的历史记录，返回删除条数。快照表不受影响。
    pub async fn delete_history_before(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let res = kpi_history::Entity::delete_many()
            .filter(Column::RecordedAt.lt(to_db_time(older_than)))
            .exec(self.db())
            .await?;
        tracing::info!(
            deleted = res.rows_affected,
            cutoff = %older_than,
            "Purged KPI history"
        );
        Ok(res.rows_affected)
    }

    /// 项目的历史记录条数。
    pub async fn count_history(&self, project_id: &str) -> Result<u64> {
        Ok(Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .count(self.db())
            .await?)
    }
}
