use sea_orm::DbErr;
use sitepulse_common::error::{Classify, ErrorKind};

/// Errors that can occur within the storage layer.
///
/// Store methods return `anyhow::Result` at the trait seams; these variants
/// and raw [`DbErr`]s sit at the root of the chain, so callers recover the
/// [`ErrorKind`] with [`StorageError::kind`] or [`db_error_kind`].
///
/// # Examples
///
/// ```rust
/// use sitepulse_common::error::{Classify, ErrorKind};
/// use sitepulse_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "project",
///     id: "p-99".to_string(),
/// };
/// assert!(err.to_string().contains("project"));
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The caller passed data the store refuses to write.
    #[error("Storage: invalid input: {0}")]
    InvalidInput(String),

    /// A stored column could not be mapped back to a domain value.
    #[error("Storage: unexpected value in column '{column}': {value}")]
    Corrupt { column: &'static str, value: String },
}

impl Classify for StorageError {
    fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::InvalidInput(_) => ErrorKind::InvalidInput,
            StorageError::Corrupt { .. } => ErrorKind::Permanent,
        }
    }
}

/// Connection loss and SQLite lock contention are worth retrying.
pub fn db_error_kind(err: &DbErr) -> ErrorKind {
    match err {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => ErrorKind::Transient,
        other => {
            let msg = other.to_string().to_lowercase();
            if msg.contains("database is locked") || msg.contains("busy") {
                ErrorKind::Transient
            } else {
                ErrorKind::Permanent
            }
        }
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
