use anyhow::Result;
use chrono::{DateTime, FixedOffset, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::StorageError;

pub mod alert;
pub mod history;
pub mod project;
pub mod snapshot;
pub mod source;

pub use project::{NewAnalysis, NewDocument, NewRfi, NewTransmittal, ProjectRow, ProjectSummary};

/// SeaORM-backed store for project activity, KPI snapshots, history and
/// dashboard alerts.
///
/// Implements [`MetricSource`](sitepulse_kpi::MetricSource),
/// [`SnapshotStore`](sitepulse_kpi::SnapshotStore) and
/// [`AlertStore`](sitepulse_kpi::AlertStore) over one connection pool.
pub struct KpiStore {
    pub(crate) db: DatabaseConnection,
}

impl KpiStore {
    /// 连接并初始化数据库，自动运行 `sea-orm-migration` 迁移。
    ///
    /// - `db_url`：完整的数据库连接 URL，例如 `sqlite:///data/sitepulse.db?mode=rwc`
    /// - `data_dir`：本地数据目录，不存在时创建
    pub async fn new(db_url: &str, data_dir: &Path) -> Result<Self> {
        Self::open(db_url, data_dir, None).await
    }

    /// 与 [`KpiStore::new`] 相同，可限制连接池大小。
    pub async fn open(db_url: &str, data_dir: &Path, max_connections: Option<u32>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let mut options = ConnectOptions::new(db_url.to_string());
        options
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        if let Some(max) = max_connections {
            options.max_connections(max);
        }
        let db = Database::connect(options).await?;

        // WAL 模式仅对 SQLite 有效
        if db_url.starts_with("sqlite:") {
            db.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }

        Migrator::up(&db, None).await?;
        tracing::info!(db_url = %db_url, "Initialized KPI store (SeaORM)");

        Ok(Self { db })
    }

    /// 返回底层数据库连接引用（供子模块使用）。
    pub(crate) fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 检查数据库连接是否可用。
    pub async fn ping(&self) -> Result<()> {
        self.db.ping().await?;
        Ok(())
    }
}

pub(crate) fn to_db_time(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    ts.fixed_offset()
}

/// Parses a stored enum column, reporting the column on failure.
pub(crate) fn parse_column<T: FromStr>(column: &'static str, value: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        StorageError::Corrupt {
            column,
            value: value.to_string(),
        }
        .into()
    })
}
