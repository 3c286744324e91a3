//! Taxonomy freshness policy
//!
//! An occupation's taxonomy subgraph is refreshed when it was never ingested
//! or was ingested more than `threshold_days` ago. Anything that prevents a
//! definite answer counts as stale.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::store::SqliteGraphStore;

/// Default refresh threshold in days
pub const DEFAULT_STALENESS_DAYS: u32 = 30;

/// Decide staleness from the stored stamp alone
pub fn is_stale_at(
    last_ingested: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold_days: u32,
) -> bool {
    match last_ingested {
        None => true,
        Some(at) => at < now - Duration::days(i64::from(threshold_days)),
    }
}

#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    store: SqliteGraphStore,
    threshold_days: u32,
}

impl StalenessPolicy {
    pub fn new(store: SqliteGraphStore, threshold_days: u32) -> Self {
        Self {
            store,
            threshold_days,
        }
    }

    pub fn threshold_days(&self) -> u32 {
        self.threshold_days
    }

    /// Staleness with the configured threshold
    pub async fn is_stale(&self, code: &str) -> bool {
        self.is_stale_with_threshold(code, self.threshold_days).await
    }

    /// True when the occupation is missing, was never ingested, was ingested
    /// before `now - threshold_days`, or its stamp can't be read.
    pub async fn is_stale_with_threshold(&self, code: &str, threshold_days: u32) -> bool {
        match self.store.taxonomy_updated_at(code).await {
            Ok(last) => {
                let stale = is_stale_at(last, Utc::now(), threshold_days);
                debug!(code = %code, stale, last_ingested = ?last, "Checked taxonomy staleness");
                stale
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Could not read taxonomy stamp, treating as stale");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRef;
    use crate::storage::Database;
    use serde_json::json;

    async fn setup_policy() -> (SqliteGraphStore, StalenessPolicy) {
        let db = Database::in_memory().await.unwrap();
        let store = SqliteGraphStore::new(db.pool().clone());
        let policy = StalenessPolicy::new(store.clone(), DEFAULT_STALENESS_DAYS);
        (store, policy)
    }

    #[test]
    fn test_is_stale_at_rule() {
        let now = Utc::now();
        assert!(is_stale_at(None, now, 30));
        assert!(!is_stale_at(Some(now), now, 30));
        assert!(!is_stale_at(Some(now - Duration::days(29)), now, 30));
        assert!(is_stale_at(Some(now - Duration::days(31)), now, 30));
    }

    #[tokio::test]
    async fn test_never_seen_code_is_stale() {
        let (_store, policy) = setup_policy().await;
        assert!(policy.is_stale("99-9999.00").await);
    }

    #[tokio::test]
    async fn test_occupation_without_stamp_is_stale() {
        let (store, policy) = setup_policy().await;
        let mut tx = store.begin().await.unwrap();
        tx.merge_node(&NodeRef::occupation("15-1252.00"), &json!({"title": "Software Developers"}))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(policy.is_stale("15-1252.00").await);
    }

    #[tokio::test]
    async fn test_fresh_then_expired() {
        let (store, policy) = setup_policy().await;

        let mut tx = store.begin().await.unwrap();
        tx.merge_occupation_summary("15-1252.00", Some("Software Developers"), None)
            .await
            .unwrap();
        tx.stamp_taxonomy_updated_at("15-1252.00", Utc::now()).await.unwrap();
        tx.commit().await.unwrap();
        assert!(!policy.is_stale("15-1252.00").await);

        let mut tx = store.begin().await.unwrap();
        tx.stamp_taxonomy_updated_at("15-1252.00", Utc::now() - Duration::days(31))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(policy.is_stale("15-1252.00").await);
        assert!(!policy.is_stale_with_threshold("15-1252.00", 60).await);
    }

    #[tokio::test]
    async fn test_unreadable_stamp_is_stale() {
        let (store, policy) = setup_policy().await;
        let mut tx = store.begin().await.unwrap();
        tx.merge_node(
            &NodeRef::occupation("15-1252.00"),
            &json!({"taxonomy_updated_at": "last tuesday"}),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(policy.is_stale("15-1252.00").await);
    }
}
