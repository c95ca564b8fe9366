use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Statement, TransactionTrait, Value,
};
use sitepulse_common::types::{Alert, KpiId, NewAlert};
use sitepulse_kpi::AlertStore;

use crate::entities::dashboard_alert::{self, Column, Entity};
use crate::store::{parse_column, to_db_time, KpiStore};

// 依赖 idx_dashboard_alerts_open 部分唯一索引：同一 (project_id, kpi_id)
// 已存在未确认告警时插入被忽略
const INSERT_OPEN_ALERT_SQL: &str = "
INSERT INTO dashboard_alerts
    (id, project_id, kpi_id, alert_type, message, value, threshold, acknowledged, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
ON CONFLICT DO NOTHING";

fn to_alert(m: dashboard_alert::Model) -> Result<Alert> {
    Ok(Alert {
        kpi_id: parse_column("kpi_id", &m.kpi_id)?,
        alert_type: parse_column("alert_type", &m.alert_type)?,
        id: m.id,
        project_id: m.project_id,
        message: m.message,
        value: m.value,
        threshold: m.threshold,
        acknowledged: m.acknowledged,
        acknowledged_by: m.acknowledged_by,
        acknowledged_at: m.acknowledged_at.map(|t| t.with_timezone(&Utc)),
        created_at: m.created_at.with_timezone(&Utc),
    })
}

#[async_trait]
impl AlertStore for KpiStore {
    async fn has_open_alert(&self, project_id: &str, kpi_id: KpiId) -> Result<bool> {
        let open = Entity::find()
            .filter(Column::ProjectId.eq(project_id))
            .filter(Column::KpiId.eq(kpi_id.as_str()))
            .filter(Column::Acknowledged.eq(false))
            .count(self.db())
            .await?;
        Ok(open > 0)
    }

    async fn insert_open_alerts(&self, alerts: &[NewAlert]) -> Result<usize> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let now = to_db_time(Utc::now());
        let txn = self.db().begin().await?;
        let mut created = 0usize;
        for alert in alerts {
            let values: Vec<Value> = vec![
                sitepulse_common::id::next_id().into(),
                alert.project_id.clone().into(),
                alert.kpi_id.as_str().into(),
                alert.alert_type.as_str().into(),
                alert.message.clone().into(),
                alert.value.into(),
                alert.threshold.into(),
                now.into(),
            ];
            let stmt = Statement::from_sql_and_values(
                DatabaseBackend::Sqlite,
                INSERT_OPEN_ALERT_SQL,
                values,
            );
            let res = txn.execute(stmt).await?;
            if res.rows_affected() == 0 {
                tracing::debug!(
                    project_id = %alert.project_id,
                    kpi_id = %alert.kpi_id,
                    "Concurrent check already opened this alert"
                );
            }
            created += res.rows_affected() as usize;
        }
        txn.commit().await?;
        Ok(created)
    }

    async fn get_alert(&self, alert_id: &str) -> Result<Option<Alert>> {
        let model = Entity::find_by_id(alert_id).one(self.db()).await?;
        model.map(to_alert).transpose()
    }

    async fn mark_acknowledged(
        &self,
        alert_id: &str,
        acknowledged_by: &str,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        // 条件更新：仅未确认的告警生效，重复确认保持首次记录
        let res = Entity::update_many()
            .col_expr(Column::Acknowledged, Expr::value(true))
            .col_expr(Column::AcknowledgedBy, Expr::value(acknowledged_by))
            .col_expr(Column::AcknowledgedAt, Expr::value(to_db_time(at)))
            .filter(Column::Id.eq(alert_id))
            .filter(Column::Acknowledged.eq(false))
            .exec(self.db())
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn list_alerts(&self, project_id: &str, acknowledged: Option<bool>) -> Result<Vec<Alert>> {
        let mut q = Entity::find().filter(Column::ProjectId.eq(project_id));
        if let Some(ack) = acknowledged {
            q = q.filter(Column::Acknowledged.eq(ack));
        }
        let rows = q
            .order_by(Column::CreatedAt, Order::Desc)
            .order_by(Column::Id, Order::Desc)
            .all(self.db())
            .await?;
        rows.into_iter().map(to_alert).collect()
    }
}
