//! Revocation store for issued tokens
//!
//! Two kinds of entries live here, both self-expiring:
//! - blacklist records: `jti` of a signed-out access token, kept for the
//!   token's remaining validity window
//! - active-refresh records: per-subject pointer to the single refresh
//!   token `jti` currently accepted for that subject
//!
//! The store never needs cleanup; a later write to the active-refresh key
//! is the only thing that removes an entry before its TTL does.

use async_trait::async_trait;
use pacta_core::{PactaError, Result};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Key-value revocation store.
///
/// All operations are atomic per key with the usual `SETEX`/`GET`/`DEL`
/// semantics; callers rely on that for correctness under concurrent
/// requests and take no locks of their own. Infrastructure failures
/// surface as [`PactaError::CacheUnavailable`] - never as a silent
/// "not revoked".
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Record an access token as revoked for `ttl_seconds`.
    ///
    /// A zero TTL is a no-op: the token is already expired and needs no
    /// protection window.
    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> Result<()>;

    /// Whether an access token has been revoked.
    async fn is_blacklisted(&self, jti: &str) -> Result<bool>;

    /// Register `jti` as the single accepted refresh token for a subject,
    /// overwriting any previous registration.
    async fn set_active_refresh(&self, subject: &str, jti: &str, ttl_seconds: u64) -> Result<()>;

    /// The currently accepted refresh token id for a subject, if any.
    async fn get_active_refresh(&self, subject: &str) -> Result<Option<String>>;

    /// Drop the active-refresh registration for a subject.
    /// Clearing an absent entry succeeds.
    async fn clear_active_refresh(&self, subject: &str) -> Result<()>;
}

// ============================================================================
// Redis implementation
// ============================================================================

/// Redis-backed revocation store.
///
/// The multi-instance deployment target: every API instance shares one
/// blacklist and one active-refresh registry.
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisRevocationStore {
    /// Connect to Redis and verify the connection with a ping.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| connection_error("connect", &e))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| connection_error("connect", &e))?;

        let _: () = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| connection_error("ping", &e))?;

        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    fn blacklist_key(&self, jti: &str) -> String {
        format!("{}blacklist:{jti}", self.prefix)
    }

    fn refresh_key(&self, subject: &str) -> String {
        format!("{}refresh:{subject}", self.prefix)
    }
}

fn connection_error(operation: &str, err: &redis::RedisError) -> PactaError {
    tracing::error!(operation, error = %err, "revocation store unreachable");
    PactaError::cache_unavailable(operation)
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.blacklist_key(jti), "1", ttl_seconds)
            .await
            .map_err(|e| connection_error("blacklist", &e))?;
        tracing::debug!(jti, ttl_seconds, "access token blacklisted");
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(self.blacklist_key(jti))
            .await
            .map_err(|e| connection_error("is_blacklisted", &e))
    }

    async fn set_active_refresh(&self, subject: &str, jti: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.refresh_key(subject), jti, ttl_seconds)
            .await
            .map_err(|e| connection_error("set_active_refresh", &e))?;
        tracing::debug!(subject, "active refresh token registered");
        Ok(())
    }

    async fn get_active_refresh(&self, subject: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(self.refresh_key(subject))
            .await
            .map_err(|e| connection_error("get_active_refresh", &e))
    }

    async fn clear_active_refresh(&self, subject: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.refresh_key(subject))
            .await
            .map_err(|e| connection_error("clear_active_refresh", &e))
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// In-process revocation store for single-instance deployments.
///
/// Entries carry a deadline and are dropped lazily on access; semantics
/// match the Redis store. State dies with the process, which is exactly
/// as durable as the tokens it tracks need.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, ExpiringEntry>>,
}

struct ExpiringEntry {
    value: String,
    deadline: Instant,
}

impl ExpiringEntry {
    fn live(&self) -> bool {
        Instant::now() < self.deadline
    }
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get_live(&self, key: &str) -> Option<String> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.live() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // Expired: drop it so the map doesn't accumulate dead entries.
        self.entries.write().await.remove(key);
        None
    }

    async fn set(&self, key: String, value: String, ttl_seconds: u64) {
        let entry = ExpiringEntry {
            value,
            deadline: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.entries.write().await.insert(key, entry);
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> Result<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }
        self.set(format!("blacklist:{jti}"), "1".to_string(), ttl_seconds)
            .await;
        Ok(())
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        Ok(self.get_live(&format!("blacklist:{jti}")).await.is_some())
    }

    async fn set_active_refresh(&self, subject: &str, jti: &str, ttl_seconds: u64) -> Result<()> {
        self.set(format!("refresh:{subject}"), jti.to_string(), ttl_seconds)
            .await;
        Ok(())
    }

    async fn get_active_refresh(&self, subject: &str) -> Result<Option<String>> {
        Ok(self.get_live(&format!("refresh:{subject}")).await)
    }

    async fn clear_active_refresh(&self, subject: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(&format!("refresh:{subject}"));
        Ok(())
    }
}

// ============================================================================
// Test double
// ============================================================================

/// Revocation store that can be switched into a failing state, for
/// exercising the fail-closed paths.
#[cfg(any(test, feature = "test-utils"))]
pub struct FlakyRevocationStore {
    inner: MemoryRevocationStore,
    failing: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl FlakyRevocationStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRevocationStore::new(),
            failing: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            Err(PactaError::cache_unavailable(operation))
        } else {
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for FlakyRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RevocationStore for FlakyRevocationStore {
    async fn blacklist(&self, jti: &str, ttl_seconds: u64) -> Result<()> {
        self.check("blacklist")?;
        self.inner.blacklist(jti, ttl_seconds).await
    }

    async fn is_blacklisted(&self, jti: &str) -> Result<bool> {
        self.check("is_blacklisted")?;
        self.inner.is_blacklisted(jti).await
    }

    async fn set_active_refresh(&self, subject: &str, jti: &str, ttl_seconds: u64) -> Result<()> {
        self.check("set_active_refresh")?;
        self.inner.set_active_refresh(subject, jti, ttl_seconds).await
    }

    async fn get_active_refresh(&self, subject: &str) -> Result<Option<String>> {
        self.check("get_active_refresh")?;
        self.inner.get_active_refresh(subject).await
    }

    async fn clear_active_refresh(&self, subject: &str) -> Result<()> {
        self.check("clear_active_refresh")?;
        self.inner.clear_active_refresh(subject).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blacklist_and_check() {
        let store = MemoryRevocationStore::new();

        assert!(!store.is_blacklisted("jti-1").await.unwrap());
        store.blacklist("jti-1", 60).await.unwrap();
        assert!(store.is_blacklisted("jti-1").await.unwrap());
        assert!(!store.is_blacklisted("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_blacklist_is_noop() {
        let store = MemoryRevocationStore::new();

        store.blacklist("jti-1", 0).await.unwrap();
        assert!(!store.is_blacklisted("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_blacklist_twice_is_safe() {
        let store = MemoryRevocationStore::new();

        store.blacklist("jti-1", 60).await.unwrap();
        store.blacklist("jti-1", 60).await.unwrap();
        assert!(store.is_blacklisted("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_active_refresh_overwrite() {
        let store = MemoryRevocationStore::new();

        store.set_active_refresh("user-1", "jti-a", 60).await.unwrap();
        assert_eq!(
            store.get_active_refresh("user-1").await.unwrap(),
            Some("jti-a".to_string())
        );

        // A later registration supersedes the earlier one entirely.
        store.set_active_refresh("user-1", "jti-b", 60).await.unwrap();
        assert_eq!(
            store.get_active_refresh("user-1").await.unwrap(),
            Some("jti-b".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_active_refresh() {
        let store = MemoryRevocationStore::new();

        store.set_active_refresh("user-1", "jti-a", 60).await.unwrap();
        store.clear_active_refresh("user-1").await.unwrap();
        assert_eq!(store.get_active_refresh("user-1").await.unwrap(), None);

        // Clearing an absent entry is not an error.
        store.clear_active_refresh("user-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = MemoryRevocationStore::new();

        // A zero-duration deadline is in the past immediately.
        store
            .set("blacklist:jti-1".to_string(), "1".to_string(), 0)
            .await;
        assert!(!store.is_blacklisted("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_subjects_are_independent() {
        let store = MemoryRevocationStore::new();

        store.set_active_refresh("user-1", "jti-a", 60).await.unwrap();
        store.set_active_refresh("user-2", "jti-b", 60).await.unwrap();
        store.clear_active_refresh("user-1").await.unwrap();

        assert_eq!(store.get_active_refresh("user-1").await.unwrap(), None);
        assert_eq!(
            store.get_active_refresh("user-2").await.unwrap(),
            Some("jti-b".to_string())
        );
    }

    #[tokio::test]
    async fn test_flaky_store_surfaces_cache_errors() {
        let store = FlakyRevocationStore::new();
        store.blacklist("jti-1", 60).await.unwrap();

        store.set_failing(true);
        let result = store.is_blacklisted("jti-1").await;
        assert!(matches!(
            result,
            Err(PactaError::CacheUnavailable { .. })
        ));

        store.set_failing(false);
        assert!(store.is_blacklisted("jti-1").await.unwrap());
    }
}
