//! In-memory permission cache with TTL-based expiration.
//!
//! The cache is a performance optimization only: entries are refreshed from
//! the most recently validated token on every successful authentication, and
//! a miss makes the gate fall back to the request-scoped claims. It can never
//! grant a permission absent from the token.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Default entry TTL: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    permissions: Vec<String>,
    expires_at: Instant,
}

/// Process-wide permission cache keyed by subject ID.
///
/// Shared across request workers via `Arc`; the internal read-write lock lets
/// concurrent reads proceed while serializing writes. Constructed once per
/// process and passed to the gate, never looked up ambiently.
#[derive(Debug)]
pub struct PermissionCache {
    entries: RwLock<HashMap<Uuid, CacheEntry>>,
    ttl: Duration,
}

impl PermissionCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert or overwrite the entry for a subject, resetting its expiry.
    pub fn set(&self, subject: Uuid, permissions: Vec<String>) {
        let entry = CacheEntry {
            permissions,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject, entry);
    }

    /// Look up a subject's cached permissions.
    ///
    /// Returns `None` for absent and expired entries alike; expired entries
    /// are evicted on the way out.
    pub fn get(&self, subject: Uuid) -> Option<Vec<String>> {
        let expired = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&subject) {
                None => return None,
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Some(entry.permissions.clone());
                }
                Some(_) => true,
            }
        };
        if expired {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&subject)
                && entry.expires_at <= Instant::now()
            {
                entries.remove(&subject);
            }
        }
        None
    }

    /// Drop all expired entries. Called periodically to bound memory; skipping
    /// the sweep only affects memory growth, never correctness.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, entry| entry.expires_at > now);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn get_returns_none_for_unknown_subject() {
        let cache = PermissionCache::new();
        assert!(cache.get(Uuid::new_v4()).is_none());
    }

    #[test]
    fn set_then_get_roundtrip() {
        let cache = PermissionCache::new();
        let subject = Uuid::new_v4();
        cache.set(subject, perms(&["view_all"]));
        assert_eq!(cache.get(subject), Some(perms(&["view_all"])));
    }

    #[test]
    fn set_overwrites_previous_entry() {
        let cache = PermissionCache::new();
        let subject = Uuid::new_v4();
        cache.set(subject, perms(&["view_all"]));
        cache.set(subject, perms(&["create_achievement"]));
        assert_eq!(cache.get(subject), Some(perms(&["create_achievement"])));
    }

    #[test]
    fn expired_entry_is_a_miss_and_is_evicted() {
        let cache = PermissionCache::with_ttl(Duration::ZERO);
        let subject = Uuid::new_v4();
        cache.set(subject, perms(&["view_all"]));
        assert!(cache.get(subject).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let cache = PermissionCache::with_ttl(Duration::from_secs(60));
        let live = Uuid::new_v4();
        cache.set(live, perms(&["view_all"]));

        let short = PermissionCache::with_ttl(Duration::ZERO);
        let dead = Uuid::new_v4();
        short.set(dead, perms(&["view_all"]));

        cache.sweep();
        short.sweep();
        assert_eq!(cache.len(), 1);
        assert_eq!(short.len(), 0);
    }
}
