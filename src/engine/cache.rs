//! Decision cache - fingerprint-keyed memoization of guard decisions.
//!
//! The cache is a pure performance optimization, never a correctness
//! requirement: a hit only replays a previously valid decision for
//! identical content, bounded by TTL staleness. Every cache failure
//! degrades to a miss.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::{Content, Status};
use crate::error::{GuardError, GuardResult};

/// Deterministic digest of the content's canonical serialized form.
///
/// Identical content always produces the same fingerprint; metadata
/// maps are sorted, so field order cannot leak into the key.
pub fn fingerprint(content: &Content) -> GuardResult<String> {
    let bytes = serde_json::to_vec(content)
        .map_err(|e| GuardError::cache(format!("canonical serialization: {}", e)))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// The cached payload: a prior decision plus its evaluation details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDecision {
    pub status: Status,
    pub details: serde_json::Value,
}

/// Best-effort fingerprint -> decision store with time-based eviction.
///
/// Read failures are treated as misses and write failures are
/// swallowed at the call site; neither may affect the decision path.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> GuardResult<Option<CachedDecision>>;

    async fn set(
        &self,
        fingerprint: &str,
        decision: CachedDecision,
        ttl: Duration,
    ) -> GuardResult<()>;

    /// Whether the cache backend is currently usable.
    async fn healthy(&self) -> bool;
}

struct CacheEntry {
    decision: CachedDecision,
    #[allow(dead_code)]
    written_at: DateTime<Utc>,
    expires_at: Instant,
}

/// In-process decision cache.
///
/// Entries expire strictly by TTL; there is no explicit invalidation.
/// Expired entries are dropped lazily on read and pruned on write
/// once the map grows past `prune_threshold`.
pub struct InMemoryDecisionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    prune_threshold: usize,
}

impl InMemoryDecisionCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            prune_threshold: 4096,
        }
    }
}

impl Default for InMemoryDecisionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionCache for InMemoryDecisionCache {
    async fn get(&self, fingerprint: &str) -> GuardResult<Option<CachedDecision>> {
        let entries = self.entries.read().await;
        match entries.get(fingerprint) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.decision.clone())),
            _ => Ok(None),
        }
    }

    async fn set(
        &self,
        fingerprint: &str,
        decision: CachedDecision,
        ttl: Duration,
    ) -> GuardResult<()> {
        let mut entries = self.entries.write().await;

        if entries.len() >= self.prune_threshold {
            let now = Instant::now();
            entries.retain(|_, entry| entry.expires_at > now);
        }

        entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                decision,
                written_at: Utc::now(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn healthy(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Content::prompt("a red balloon drifting over rooftops");
        let b = Content::prompt("a red balloon drifting over rooftops");
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_differs_for_different_content() {
        let a = Content::prompt("a red balloon");
        let b = Content::prompt("a blue balloon");
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_distinguishes_prompt_from_artifact() {
        let prompt = Content::prompt("clip.mp4");
        let artifact = Content::artifact("clip.mp4", "video/mp4");
        assert_ne!(
            fingerprint(&prompt).unwrap(),
            fingerprint(&artifact).unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_then_get_within_ttl() {
        let cache = InMemoryDecisionCache::new();
        let decision = CachedDecision {
            status: Status::Pass,
            details: serde_json::json!({}),
        };

        cache
            .set("fp1", decision, Duration::from_secs(60))
            .await
            .unwrap();
        let hit = cache.get("fp1").await.unwrap();
        assert_eq!(hit.unwrap().status, Status::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = InMemoryDecisionCache::new();
        let decision = CachedDecision {
            status: Status::Fail,
            details: serde_json::json!({}),
        };

        cache
            .set("fp1", decision, Duration::from_secs(10))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;

        assert!(cache.get("fp1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_is_a_miss() {
        let cache = InMemoryDecisionCache::new();
        assert!(cache.get("missing").await.unwrap().is_none());
    }
}
