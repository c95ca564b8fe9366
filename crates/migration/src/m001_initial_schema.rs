use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Source tables first, KPI tables reference projects.
        manager.get_connection().execute_unprepared(UP_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_projects_status ON projects(status);

CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    upload_status TEXT NOT NULL DEFAULT 'completed',
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL,
    deleted_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_documents_project_created ON documents(project_id, created_at);

CREATE TABLE IF NOT EXISTS document_analyses (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    confidence_score REAL,
    processing_time REAL,
    analyzed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_document_analyses_document ON document_analyses(document_id);
CREATE INDEX IF NOT EXISTS idx_document_analyses_analyzed_at ON document_analyses(analyzed_at);

CREATE TABLE IF NOT EXISTS rfis (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open',
    due_date TEXT,
    created_at TEXT NOT NULL,
    responded_at TEXT,
    closed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_rfis_project_status ON rfis(project_id, status);
CREATE INDEX IF NOT EXISTS idx_rfis_created_at ON rfis(created_at);

CREATE TABLE IF NOT EXISTS transmittals (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    status TEXT NOT NULL DEFAULT 'draft',
    created_at TEXT NOT NULL,
    submitted_at TEXT,
    approved_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_transmittals_project_status ON transmittals(project_id, status);

CREATE TABLE IF NOT EXISTS kpi_metrics (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    kpi_id TEXT NOT NULL,
    value REAL NOT NULL,
    target REAL NOT NULL,
    threshold_warning REAL NOT NULL,
    threshold_critical REAL NOT NULL,
    status TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'measured',
    period TEXT NOT NULL DEFAULT 'real-time',
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kpi_metrics_project_kpi ON kpi_metrics(project_id, kpi_id, recorded_at DESC);
CREATE INDEX IF NOT EXISTS idx_kpi_metrics_recorded_at ON kpi_metrics(recorded_at);

CREATE TABLE IF NOT EXISTS kpi_history (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    kpi_id TEXT NOT NULL,
    value REAL NOT NULL,
    target REAL NOT NULL,
    status TEXT NOT NULL,
    source TEXT NOT NULL DEFAULT 'measured',
    recorded_at TEXT NOT NULL,
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kpi_history_project_kpi ON kpi_history(project_id, kpi_id, recorded_at);
CREATE INDEX IF NOT EXISTS idx_kpi_history_recorded_at ON kpi_history(recorded_at);

CREATE TABLE IF NOT EXISTS dashboard_alerts (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    kpi_id TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    message TEXT NOT NULL,
    value REAL NOT NULL,
    threshold REAL NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    acknowledged_by TEXT,
    acknowledged_at TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_dashboard_alerts_project_created ON dashboard_alerts(project_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_dashboard_alerts_acknowledged ON dashboard_alerts(acknowledged);
CREATE UNIQUE INDEX IF NOT EXISTS idx_dashboard_alerts_open
    ON dashboard_alerts(project_id, kpi_id) WHERE acknowledged = 0;
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS dashboard_alerts;
DROP TABLE IF EXISTS kpi_history;
DROP TABLE IF EXISTS kpi_metrics;
DROP TABLE IF EXISTS transmittals;
DROP TABLE IF EXISTS rfis;
DROP TABLE IF EXISTS document_analyses;
DROP TABLE IF EXISTS documents;
DROP TABLE IF EXISTS projects;
";
