use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};

use crate::entities::{document, document_analysis, project, rfi, transmittal};
use crate::error::StorageError;
use crate::store::{to_db_time, KpiStore};

pub const PROJECT_STATUS_ACTIVE: &str = "active";

/// 项目数据行（来自 projects 表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn to_row(m: project::Model) -> ProjectRow {
    ProjectRow {
        id: m.id,
        name: m.name,
        status: m.status,
        created_at: m.created_at.with_timezone(&Utc),
    }
}

/// 新文档（上传记录）
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub project_id: String,
    pub name: String,
    /// `completed` / `failed`
    pub upload_status: String,
    /// 审阅状态：`draft` / `review` / `approved` ...
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 新的 AI 分析结果
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub document_id: String,
    pub confidence_score: Option<f64>,
    /// 处理耗时（秒）
    pub processing_time: Option<f64>,
    pub analyzed_at: DateTime<Utc>,
}

/// 新 RFI
#[derive(Debug, Clone)]
pub struct NewRfi {
    pub project_id: String,
    pub title: String,
    /// `open` / `answered` / `closed`
    pub status: String,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// 新传送单
#[derive(Debug, Clone)]
pub struct NewTransmittal {
    pub project_id: String,
    /// `draft` / `submitted` / `approved` / `rejected` / `superseded`
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// 仪表盘汇总计数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub documents_total: u64,
    pub documents_analyzed: u64,
    pub rfis_total: u64,
    pub rfis_open: u64,
    pub rfis_overdue: u64,
    pub rfis_closed: u64,
    pub transmittals_total: u64,
    pub transmittals_pending: u64,
    pub transmittals_approved: u64,
}

impl KpiStore {
    pub async fn insert_project(&self, name: &str, status: &str) -> Result<ProjectRow> {
        let now = Utc::now().fixed_offset();
        let am = project::ActiveModel {
            id: Set(sitepulse_common::id::next_id()),
            name: Set(name.to_string()),
            status: Set(status.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let model = am.insert(self.db()).await?;
        Ok(to_row(model))
    }

    pub async fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        let model = project::Entity::find_by_id(id).one(self.db()).await?;
        Ok(model.map(to_row))
    }

    /// 返回项目，不存在时报 NotFound。
    pub async fn require_project(&self, id: &str) -> Result<ProjectRow> {
        self.get_project(id).await?.ok_or_else(|| {
            StorageError::NotFound {
                entity: "project",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// 调度器扇出使用：所有 `status = active` 的项目，按创建时间升序。
    pub async fn list_active_projects(&self) -> Result<Vec<ProjectRow>> {
        let rows = project::Entity::find()
            .filter(project::Column::Status.eq(PROJECT_STATUS_ACTIVE))
            .order_by(project::Column::CreatedAt, Order::Asc)
            .all(self.db())
            .await?;
        Ok(rows.into_iter().map(to_row).collect())
    }

    pub async fn set_project_status(&self, id: &str, status: &str) -> Result<Option<ProjectRow>> {
        let model = project::Entity::find_by_id(id).one(self.db()).await?;
        if let Some(m) = model {
            let mut am: project::ActiveModel = m.into();
            am.status = Set(status.to_string());
            am.updated_at = Set(Utc::now().fixed_offset());
            let updated = am.update(self.db()).await?;
            Ok(Some(to_row(updated)))
        } else {
            Ok(None)
        }
    }

    /// 删除项目；快照、历史与告警随外键级联删除。
    pub async fn delete_project(&self, id: &str) -> Result<bool> {
        let res = project::Entity::delete_by_id(id).exec(self.db()).await?;
        Ok(res.rows_affected > 0)
    }

    pub async fn insert_document(&self, doc: &NewDocument) -> Result<String> {
        let id = sitepulse_common::id::next_id();
        document::ActiveModel {
            id: Set(id.clone()),
            project_id: Set(doc.project_id.clone()),
            name: Set(doc.name.clone()),
            upload_status: Set(doc.upload_status.clone()),
            status: Set(doc.status.clone()),
            created_at: Set(to_db_time(doc.created_at)),
            deleted_at: Set(None),
        }
        .insert(self.db())
        .await?;
        Ok(id)
    }

    pub async fn insert_analysis(&self, analysis: &NewAnalysis) -> Result<String> {
        let id = sitepulse_common::id::next_id();
        document_analysis::ActiveModel {
            id: Set(id.clone()),
            document_id: Set(analysis.document_id.clone()),
            confidence_score: Set(analysis.confidence_score),
            processing_time: Set(analysis.processing_time),
            analyzed_at: Set(to_db_time(analysis.analyzed_at)),
        }
        .insert(self.db())
        .await?;
        Ok(id)
    }

    pub async fn insert_rfi(&self, r: &NewRfi) -> Result<String> {
        let id = sitepulse_common::id::next_id();
        rfi::ActiveModel {
            id: Set(id.clone()),
            project_id: Set(r.project_id.clone()),
            title: Set(r.title.clone()),
            status: Set(r.status.clone()),
            due_date: Set(r.due_date.map(to_db_time)),
            created_at: Set(to_db_time(r.created_at)),
            responded_at: Set(r.responded_at.map(to_db_time)),
            closed_at: Set(r.closed_at.map(to_db_time)),
        }
        .insert(self.db())
        .await?;
        Ok(id)
    }

    pub async fn insert_transmittal(&self, t: &NewTransmittal) -> Result<String> {
        let id = sitepulse_common::id::next_id();
        transmittal::ActiveModel {
            id: Set(id.clone()),
            project_id: Set(t.project_id.clone()),
            status: Set(t.status.clone()),
            created_at: Set(to_db_time(t.created_at)),
            submitted_at: Set(t.submitted_at.map(to_db_time)),
            approved_at: Set(t.approved_at.map(to_db_time)),
        }
        .insert(self.db())
        .await?;
        Ok(id)
    }

    /// 文档 / RFI / 传送单计数，供仪表盘汇总接口使用。
    pub async fn project_summary(&self, project_id: &str, now: DateTime<Utc>) -> Result<ProjectSummary> {
        let docs = || document::Entity::find().filter(document::Column::ProjectId.eq(project_id));
        let rfis = || rfi::Entity::find().filter(rfi::Column::ProjectId.eq(project_id));
        let transmittals =
            || transmittal::Entity::find().filter(transmittal::Column::ProjectId.eq(project_id));

        let overdue = Condition::all()
            .add(rfi::Column::DueDate.lt(to_db_time(now)))
            .add(rfi::Column::Status.ne("closed"));

        Ok(ProjectSummary {
            documents_total: docs().count(self.db()).await?,
            documents_analyzed: docs()
                .filter(document::Column::Status.is_in(["approved", "review"]))
                .count(self.db())
                .await?,
            rfis_total: rfis().count(self.db()).await?,
            rfis_open: rfis()
                .filter(rfi::Column::Status.is_in(["open", "answered"]))
                .count(self.db())
                .await?,
            rfis_overdue: rfis().filter(overdue).count(self.db()).await?,
            rfis_closed: rfis()
                .filter(rfi::Column::Status.eq("closed"))
                .count(self.db())
                .await?,
            transmittals_total: transmittals().count(self.db()).await?,
            transmittals_pending: transmittals()
                .filter(transmittal::Column::Status.is_in(["draft", "submitted"]))
                .count(self.db())
                .await?,
            transmittals_approved: transmittals()
                .filter(transmittal::Column::Status.eq("approved"))
                .count(self.db())
                .await?,
        })
    }
}
