//! Bounded TTL session memory.
//!
//! Keeps one conversation transcript per user id, capped at a fixed
//! number of sessions and expiring after a period of inactivity.
//! Everything lives in process memory; a restart loses all sessions
//! by design.
//!
//! Concurrency contract: requests for the same user are serialized via
//! `lock_user`, so a user's transcript never interleaves two requests.
//! Requests for different users proceed independently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;
use visagent_core::message::Conversation;

struct SessionEntry {
    conversation: Conversation,
    last_used: Instant,
}

/// An in-memory session store with LRU eviction and TTL expiry.
pub struct SessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    capacity: usize,
    ttl: Duration,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions, each expiring
    /// `ttl` after its last write.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: std::sync::Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Fetch the user's conversation, or a fresh one if none exists.
    ///
    /// Expired sessions are treated as absent (lazy expiry): the caller
    /// gets a fresh conversation and the stale entry is dropped.
    pub async fn get_or_create(&self, user_id: &str) -> Conversation {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(user_id) {
                if entry.last_used.elapsed() < self.ttl {
                    return entry.conversation.clone();
                }
            } else {
                return Conversation::new();
            }
        }
        // Entry exists but expired; remove it under the write lock.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(user_id) {
            if entry.last_used.elapsed() < self.ttl {
                return entry.conversation.clone();
            }
            debug!(user_id, "Session expired, starting fresh");
            entries.remove(user_id);
        }
        Conversation::new()
    }

    /// Store the user's conversation, refreshing its TTL.
    ///
    /// Sweeps expired entries, then evicts the least recently used
    /// sessions while over capacity.
    pub async fn put(&self, user_id: &str, conversation: Conversation) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id.to_string(),
            SessionEntry {
                conversation,
                last_used: Instant::now(),
            },
        );

        entries.retain(|_, e| e.last_used.elapsed() < self.ttl);

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(key) => {
                    debug!(user_id = %key, "Evicting least recently used session");
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drop all sessions.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Number of live (non-expired) sessions.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries
            .values()
            .filter(|e| e.last_used.elapsed() < self.ttl)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Acquire the per-user request lock.
    ///
    /// Hold the returned guard for the duration of a request so two
    /// requests for the same user never interleave transcript updates.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());

            // Opportunistic cleanup: once the map outgrows the session
            // capacity, drop lock entries nobody holds or waits on
            // (strong_count 1 means the map owns the only reference).
            if locks.len() > self.capacity.saturating_mul(2) {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }

            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visagent_core::message::Message;

    fn conversation_with(text: &str) -> Conversation {
        let mut conv = Conversation::new();
        conv.push(Message::user(text));
        conv
    }

    #[tokio::test]
    async fn sessions_are_isolated_per_user() {
        let store = SessionStore::new(100, Duration::from_secs(1800));
        store.put("alice", conversation_with("alice question")).await;
        store.put("bob", conversation_with("bob question")).await;

        let alice = store.get_or_create("alice").await;
        let bob = store.get_or_create("bob").await;
        assert_eq!(alice.messages[0].content, "alice question");
        assert_eq!(bob.messages[0].content, "bob question");
    }

    #[tokio::test]
    async fn missing_user_gets_fresh_conversation() {
        let store = SessionStore::new(100, Duration::from_secs(1800));
        let conv = store.get_or_create("nobody").await;
        assert!(conv.messages.is_empty());
        // A read never creates an entry.
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn expired_session_reads_as_fresh() {
        let store = SessionStore::new(100, Duration::from_millis(20));
        store.put("alice", conversation_with("old question")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;

        let conv = store.get_or_create("alice").await;
        assert!(conv.messages.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn eviction_removes_least_recently_used() {
        let store = SessionStore::new(2, Duration::from_secs(1800));
        store.put("first", conversation_with("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.put("second", conversation_with("b")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.put("third", conversation_with("c")).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get_or_create("first").await.messages.is_empty());
        assert!(!store.get_or_create("second").await.messages.is_empty());
        assert!(!store.get_or_create("third").await.messages.is_empty());
    }

    #[tokio::test]
    async fn put_refreshes_recency() {
        let store = SessionStore::new(2, Duration::from_secs(1800));
        store.put("first", conversation_with("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.put("second", conversation_with("b")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Touch "first" so "second" becomes the eviction candidate.
        store.put("first", conversation_with("a2")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.put("third", conversation_with("c")).await;

        assert!(!store.get_or_create("first").await.messages.is_empty());
        assert!(store.get_or_create("second").await.messages.is_empty());
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let store = SessionStore::new(100, Duration::from_secs(1800));
        store.put("alice", conversation_with("a")).await;
        store.put("bob", conversation_with("b")).await;
        store.clear().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn same_user_requests_serialize() {
        let store = Arc::new(SessionStore::new(100, Duration::from_secs(1800)));

        let guard = store.lock_user("alice").await;
        let store2 = store.clone();
        let contender = tokio::spawn(async move {
            let _guard = store2.lock_user("alice").await;
        });

        // The second locker cannot finish while we hold the guard.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn lock_map_stays_bounded_across_many_users() {
        let store = SessionStore::new(2, Duration::from_secs(1800));
        for i in 0..500 {
            let _guard = store.lock_user(&format!("user-{i}")).await;
        }

        let locks = store.locks.lock().unwrap();
        // Cleanup triggers above 2 * capacity; unheld locks are dropped.
        assert!(locks.len() <= 2 * 2 + 1, "lock map grew to {}", locks.len());
    }

    #[tokio::test]
    async fn held_locks_survive_cleanup() {
        let store = SessionStore::new(2, Duration::from_secs(1800));
        let guard = store.lock_user("pinned").await;
        for i in 0..100 {
            let _guard = store.lock_user(&format!("user-{i}")).await;
        }

        {
            let locks = store.locks.lock().unwrap();
            assert!(locks.contains_key("pinned"));
        }
        drop(guard);
    }

    #[tokio::test]
    async fn different_users_do_not_block_each_other() {
        let store = SessionStore::new(100, Duration::from_secs(1800));
        let _alice = store.lock_user("alice").await;
        // Must not deadlock.
        let _bob = store.lock_user("bob").await;
    }
}
