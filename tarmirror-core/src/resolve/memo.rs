use crate::resolve::types::PackageKey;
use futures::lock::Mutex;
use std::collections::BTreeSet;

/// `(name, version)` pairs already resolved during one top-level run.
///
/// Lives only in memory and must be cleared before every new run, otherwise
/// entries from an earlier run would suppress packages that still need to be
/// resolved.
#[derive(Debug, Default)]
pub struct ResolutionMemo {
    keys: Mutex<BTreeSet<PackageKey>>,
}

impl ResolutionMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, name: &str, version: &str) {
        self.keys.lock().await.insert(PackageKey::new(name, version));
    }

    pub async fn has(&self, name: &str, version: &str) -> bool {
        self.keys
            .lock()
            .await
            .contains(&PackageKey::new(name, version))
    }

    /// Inserts the key and reports whether this caller was first.
    pub async fn claim(&self, name: &str, version: &str) -> bool {
        self.keys.lock().await.insert(PackageKey::new(name, version))
    }

    pub async fn clear(&self) {
        self.keys.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;

    #[tokio::test]
    async fn set_has_and_clear() {
        let memo = ResolutionMemo::new();
        assert!(!memo.has("a", "1.0.0").await);

        memo.set("a", "1.0.0").await;
        assert!(memo.has("a", "1.0.0").await);
        assert!(!memo.has("a", "2.0.0").await);

        memo.clear().await;
        assert!(memo.is_empty().await);
        assert!(!memo.has("a", "1.0.0").await);
    }

    #[tokio::test]
    async fn only_one_concurrent_claim_wins() {
        let memo = ResolutionMemo::new();
        let claims = join_all((0..16).map(|_| memo.claim("dup", "1.0.0"))).await;

        assert_eq!(claims.iter().filter(|won| **won).count(), 1);
        assert_eq!(memo.len().await, 1);
    }
}
