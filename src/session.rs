use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct SessionEntry {
    id: String,
    last_seen: Instant,
}

/// Maps a sender id to its NLU conversation session id.
///
/// A session is created on the first event from a sender and refreshed on
/// every lookup. Entries idle longer than the TTL are evicted, so a user
/// returning after a long break starts a fresh NLU conversation.
pub struct SessionStore {
    ttl: Duration,
    inner: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Session id for a sender, creating one if missing or expired.
    pub fn session_id(&self, sender: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner.retain(|_, entry| now.duration_since(entry.last_seen) < self.ttl);

        let entry = inner
            .entry(sender.to_string())
            .or_insert_with(|| SessionEntry {
                id: uuid::Uuid::new_v4().to_string(),
                last_seen: now,
            });
        entry.last_seen = now;
        entry.id.clone()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_per_sender() {
        let store = SessionStore::new(Duration::from_secs(60));
        let first = store.session_id("100");
        let again = store.session_id("100");
        assert_eq!(first, again);
        assert_ne!(first, store.session_id("200"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_expired_sessions_evicted() {
        let store = SessionStore::new(Duration::from_millis(10));
        let first = store.session_id("100");
        std::thread::sleep(Duration::from_millis(20));
        let second = store.session_id("100");
        assert_ne!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookup_refreshes_ttl() {
        let store = SessionStore::new(Duration::from_millis(50));
        let first = store.session_id("100");
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(20));
            assert_eq!(store.session_id("100"), first);
        }
    }
}
