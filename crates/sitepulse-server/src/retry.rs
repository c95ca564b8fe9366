use anyhow::Result;
use sitepulse_common::error::{Classify, ErrorKind, ParseEnumError};
use sitepulse_kpi::KpiError;
use sitepulse_storage::error::{db_error_kind, StorageError};
use std::future::Future;
use std::time::Duration;

/// Classifies an error by the first typed cause found in its chain.
/// Anything unrecognised is permanent.
pub fn error_kind(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<StorageError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<KpiError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<ParseEnumError>() {
            return e.kind();
        }
        if let Some(e) = cause.downcast_ref::<sea_orm::DbErr>() {
            return db_error_kind(e);
        }
    }
    ErrorKind::Permanent
}

/// Exponential backoff for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Delay before retry number `attempt + 1` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent.
///
/// Every attempt must be a complete unit of work: a failed attempt has to
/// leave no partial writes behind.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                let kind = error_kind(&e);
                if !kind.is_retryable() || attempt >= policy.max_attempts {
                    return Err(e);
                }
                tracing::warn!(
                    task = label,
                    attempt,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(policy.delay(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy::new(3, 1)
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(fast(), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal("gone".into())).into())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn transient_error_then_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(fast(), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal("blip".into())).into())
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = with_retry(fast(), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::NotFound {
                entity: "project",
                id: "p".into(),
            }
            .into())
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn classification_walks_context() {
        let err = anyhow::Error::from(KpiError::NotFound {
            entity: "alert",
            id: "1".into(),
        })
        .context("acknowledging");
        assert_eq!(error_kind(&err), ErrorKind::NotFound);
        assert_eq!(error_kind(&anyhow::anyhow!("boom")), ErrorKind::Permanent);
        let locked = anyhow::Error::from(sea_orm::DbErr::Custom("database is locked".into()));
        assert_eq!(error_kind(&locked), ErrorKind::Transient);
    }

    #[test]
    fn delay_doubles() {
        let policy = RetryPolicy::new(3, 100);
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(400));
    }
}
