/// Coarse failure classes shared by every layer of the pipeline.
///
/// The scheduler uses the class to decide whether a unit of work is retried,
/// and the HTTP layer maps it onto a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown project, alert or KPI reference.
    NotFound,
    /// Malformed identifier or out-of-range parameter.
    InvalidInput,
    /// Storage or connectivity hiccup, safe to retry.
    Transient,
    /// Anything else. Logged and surfaced without retry.
    Permanent,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

/// Implemented by error types that know their [`ErrorKind`].
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Returned when a string does not name a known enum variant.
///
/// # Examples
///
/// ```
/// use sitepulse_common::types::KpiId;
///
/// let err = "KPI-999".parse::<KpiId>().unwrap_err();
/// assert_eq!(err.to_string(), "unknown kpi id: KPI-999");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl Classify for ParseEnumError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}
