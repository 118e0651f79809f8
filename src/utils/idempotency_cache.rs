use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use once_cell::sync::Lazy;

use crate::error::LifecycleError;
use crate::model::status_log::StatusLogEntry;

/// Idempotency-Key => audit entry already written for it.
static EVENT_CACHE: Lazy<Cache<String, StatusLogEntry>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

/// Runs `append` once per key; concurrent and later callers with the same key
/// get the first entry back.
pub async fn append_once<F>(key: &str, append: F) -> Result<StatusLogEntry, LifecycleError>
where
    F: Future<Output = Result<StatusLogEntry, LifecycleError>> + Send,
{
    EVENT_CACHE
        .try_get_with(key.to_string(), append)
        .await
        .map_err(|e: Arc<LifecycleError>| (*e).clone())
}

/// True if an entry is already remembered for `key`.
pub async fn contains(key: &str) -> bool {
    EVENT_CACHE.get(key).await.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(log_id: u64) -> StatusLogEntry {
        StatusLogEntry {
            log_id,
            request_id: 1,
            log_date: NaiveDate::from_ymd_opt(2024, 10, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            action: "Request has been rejected by the manager/director".into(),
            reason: None,
        }
    }

    #[actix_web::test]
    async fn second_append_with_same_key_is_replayed() {
        let calls = AtomicUsize::new(0);
        let key = "cache-test:replay";

        let first = append_once(key, async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(entry(1))
        })
        .await
        .unwrap();
        let second = append_once(key, async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(entry(2))
        })
        .await
        .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(contains(key).await);
    }

    #[actix_web::test]
    async fn failures_are_not_remembered() {
        let key = "cache-test:failure";

        let err = append_once(key, async { Err(LifecycleError::Persistence("down".into())) }).await;
        assert!(err.is_err());
        assert!(!contains(key).await);

        let ok = append_once(key, async { Ok(entry(3)) }).await.unwrap();
        assert_eq!(ok.log_id, 3);
    }
}
