use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseBackend, EntityTrait, PaginatorTrait,
    QueryFilter, Statement, Value,
};
use sitepulse_common::types::TimeWindow;
use sitepulse_kpi::source::{CompletionCounts, MetricSource, RfiCounts, UploadCounts};

use crate::entities::{document, rfi, transmittal};
use crate::store::{to_db_time, KpiStore};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// `[from, to)` on `column`, or no restriction.
fn within<C: ColumnTrait>(column: C, window: Option<&TimeWindow>) -> Condition {
    match window {
        Some(w) => Condition::all()
            .add(column.gte(to_db_time(w.from)))
            .add(column.lt(to_db_time(w.to))),
        None => Condition::all(),
    }
}

fn elapsed_days(from: DateTime<FixedOffset>, to: DateTime<FixedOffset>) -> f64 {
    ((to - from).num_seconds().max(0)) as f64 / SECONDS_PER_DAY
}

impl KpiStore {
    /// 查询项目下已完成分析的某个数值列（processing_time / confidence_score）。
    async fn analysis_column(
        &self,
        column: &'static str,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>> {
        let mut sql = format!(
            "SELECT a.{column} AS v FROM document_analyses a \
             JOIN documents d ON d.id = a.document_id \
             WHERE d.project_id = ? AND a.{column} IS NOT NULL"
        );
        let mut values: Vec<Value> = vec![project_id.into()];
        if let Some(w) = window {
            sql.push_str(" AND a.analyzed_at >= ? AND a.analyzed_at < ?");
            values.push(to_db_time(w.from).into());
            values.push(to_db_time(w.to).into());
        }

        let stmt = Statement::from_sql_and_values(DatabaseBackend::Sqlite, sql, values);
        let rows = self.db().query_all(stmt).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(row.try_get::<f64>("", "v")?);
        }
        Ok(out)
    }
}

#[async_trait]
impl MetricSource for KpiStore {
    async fn upload_counts(&self, project_id: &str, window: &TimeWindow) -> Result<UploadCounts> {
        let scope = Condition::all()
            .add(document::Column::ProjectId.eq(project_id))
            .add(within(document::Column::CreatedAt, Some(window)));

        let total = document::Entity::find()
            .filter(scope.clone())
            .count(self.db())
            .await?;
        let failed = document::Entity::find()
            .filter(scope)
            .filter(document::Column::UploadStatus.eq("failed"))
            .count(self.db())
            .await?;
        Ok(UploadCounts { total, failed })
    }

    async fn analysis_durations(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>> {
        self.analysis_column("processing_time", project_id, window).await
    }

    async fn confidence_scores(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>> {
        self.analysis_column("confidence_score", project_id, window).await
    }

    async fn rfi_response_days(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>> {
        let rows = rfi::Entity::find()
            .filter(rfi::Column::ProjectId.eq(project_id))
            .filter(rfi::Column::Status.is_in(["answered", "closed"]))
            .filter(within(rfi::Column::CreatedAt, window))
            .all(self.db())
            .await?;

        // 缺少 responded_at 的已关闭 RFI 以关闭时间作为首次响应
        Ok(rows
            .into_iter()
            .filter_map(|r| {
                let responded = r.responded_at.or(r.closed_at)?;
                Some(elapsed_days(r.created_at, responded))
            })
            .collect())
    }

    async fn rfi_counts(&self, project_id: &str, window: Option<&TimeWindow>) -> Result<RfiCounts> {
        let scope = Condition::all()
            .add(rfi::Column::ProjectId.eq(project_id))
            .add(within(rfi::Column::CreatedAt, window));

        let total = rfi::Entity::find()
            .filter(scope.clone())
            .count(self.db())
            .await?;
        let closed = rfi::Entity::find()
            .filter(scope)
            .filter(rfi::Column::Status.eq("closed"))
            .count(self.db())
            .await?;
        Ok(RfiCounts { total, closed })
    }

    async fn transmittal_approval_days(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<f64>> {
        let rows = transmittal::Entity::find()
            .filter(transmittal::Column::ProjectId.eq(project_id))
            .filter(transmittal::Column::Status.eq("approved"))
            .filter(transmittal::Column::SubmittedAt.is_not_null())
            .filter(transmittal::Column::ApprovedAt.is_not_null())
            .filter(within(transmittal::Column::CreatedAt, window))
            .all(self.db())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|t| Some(elapsed_days(t.submitted_at?, t.approved_at?)))
            .collect())
    }

    async fn completion_counts(
        &self,
        project_id: &str,
        window: Option<&TimeWindow>,
    ) -> Result<CompletionCounts> {
        let rows = rfi::Entity::find()
            .filter(rfi::Column::ProjectId.eq(project_id))
            .filter(rfi::Column::Status.eq("closed"))
            .filter(rfi::Column::DueDate.is_not_null())
            .filter(rfi::Column::ClosedAt.is_not_null())
            .filter(within(rfi::Column::CreatedAt, window))
            .all(self.db())
            .await?;

        let mut counts = CompletionCounts::default();
        for r in rows {
            let (Some(due), Some(closed_at)) = (r.due_date, r.closed_at) else {
                continue;
            };
            counts.closed += 1;
            if closed_at <= due {
                counts.on_time += 1;
            }
        }
        Ok(counts)
    }
}
