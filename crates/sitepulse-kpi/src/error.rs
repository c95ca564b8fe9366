use sitepulse_common::error::{Classify, ErrorKind};

/// Errors raised by the KPI core itself, as opposed to the stores and
/// sources it drives (those surface through `anyhow`).
///
/// # Examples
///
/// ```
/// use sitepulse_kpi::KpiError;
///
/// let err = KpiError::NotFound { entity: "alert", id: "42".into() };
/// assert_eq!(err.to_string(), "KPI: alert not found (id=42)");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum KpiError {
    #[error("KPI: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    #[error("KPI: invalid input: {0}")]
    InvalidInput(String),
}

impl Classify for KpiError {
    fn kind(&self) -> ErrorKind {
        match self {
            KpiError::NotFound { .. } => ErrorKind::NotFound,
            KpiError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }
}
