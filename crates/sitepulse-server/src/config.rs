use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 完整连接 URL；为空时使用 `data_dir/sitepulse.db`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: default_data_dir(),
            max_connections: None,
        }
    }
}

impl DatabaseConfig {
    /// 最终使用的连接 URL。
    pub fn resolved_url(&self) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!(
                "sqlite://{}/sitepulse.db?mode=rwc",
                self.data_dir.trim_end_matches('/')
            ),
        }
    }
}

/// KPI 计算、阈值检查与历史清理的调度参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,
    /// KPI 计算周期（秒），默认 5 分钟
    #[serde(default = "default_calculation_interval_secs")]
    pub calculation_interval_secs: u64,
    /// 阈值检查周期（秒），默认 15 分钟
    #[serde(default = "default_threshold_interval_secs")]
    pub threshold_interval_secs: u64,
    /// 历史清理执行日（mon..sun），默认周日
    #[serde(default = "default_purge_weekday")]
    pub purge_weekday: String,
    /// 历史清理执行小时（UTC），默认 2 点
    #[serde(default = "default_purge_hour")]
    pub purge_hour: u32,
    /// 历史保留天数，默认 3 年
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// 单轮扇出的最大并发项目数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl SchedulerConfig {
    /// `purge_weekday` parsed into a chrono weekday.
    pub fn purge_day(&self) -> anyhow::Result<chrono::Weekday> {
        self.purge_weekday
            .parse()
            .map_err(|_| anyhow::anyhow!("scheduler.purge_weekday is not a weekday: {}", self.purge_weekday))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            calculation_interval_secs: default_calculation_interval_secs(),
            threshold_interval_secs: default_threshold_interval_secs(),
            purge_weekday: default_purge_weekday(),
            purge_hour: default_purge_hour(),
            retention_days: default_retention_days(),
            max_concurrent: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_calculation_interval_secs() -> u64 {
    300
}

fn default_threshold_interval_secs() -> u64 {
    900
}

fn default_purge_weekday() -> String {
    "sun".to_string()
}

fn default_purge_hour() -> u32 {
    2
}

fn default_retention_days() -> u32 {
    1095
}

fn default_max_concurrent() -> usize {
    8
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduler;
        if s.calculation_interval_secs == 0 || s.threshold_interval_secs == 0 {
            anyhow::bail!("scheduler intervals must be greater than zero");
        }
        if s.purge_hour > 23 {
            anyhow::bail!("scheduler.purge_hour must be 0-23, got {}", s.purge_hour);
        }
        s.purge_day()?;
        if s.max_concurrent == 0 || s.retry_attempts == 0 {
            anyhow::bail!("scheduler.max_concurrent and retry_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.scheduler.calculation_interval_secs, 300);
        assert_eq!(config.scheduler.threshold_interval_secs, 900);
        assert_eq!(config.scheduler.retention_days, 1095);
        assert_eq!(config.scheduler.purge_weekday, "sun");
        assert_eq!(config.database.resolved_url(), "sqlite://data/sitepulse.db?mode=rwc");
        config.validate().unwrap();
    }

    #[test]
    fn sections_override_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            http_port = 9000

            [database]
            url = "sqlite:///var/lib/sitepulse/kpi.db?mode=rwc"

            [scheduler]
            purge_weekday = "sat"
            purge_hour = 3
            retention_days = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(
            config.database.resolved_url(),
            "sqlite:///var/lib/sitepulse/kpi.db?mode=rwc"
        );
        assert_eq!(config.scheduler.purge_day().unwrap(), chrono::Weekday::Sat);
        assert_eq!(config.scheduler.purge_hour, 3);
        assert_eq!(config.scheduler.retention_days, 30);
        assert_eq!(config.scheduler.max_concurrent, 8);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_bad_purge_schedule() {
        let mut config = ServerConfig::default();
        config.scheduler.purge_hour = 24;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.scheduler.purge_weekday = "someday".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("someday"), "{err}");
    }
}
