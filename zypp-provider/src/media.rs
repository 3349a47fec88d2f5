//! Attached-media cache: coalesces Attach requests that resolve to an
//! already-mounted medium and reaps idle media via a refcount + timer
//! (spec §4.3.5, §3.3.6).

use std::collections::BTreeSet;
use std::time::Duration;

use zypp_core::Timestamp;

/// Key identifying an attach request: the sorted set of candidate URLs
/// plus an optional medium content-id (spec §4.3.5).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaKey {
    pub urls: BTreeSet<String>,
    pub content_id: Option<String>,
}

impl MediaKey {
    pub fn new(urls: impl IntoIterator<Item = String>, content_id: Option<String>) -> Self {
        Self {
            urls: urls.into_iter().collect(),
            content_id,
        }
    }
}

/// A medium currently attached by some worker (spec §3.2).
#[derive(Clone, Debug)]
pub struct AttachedMediaInfo {
    pub attach_id: String,
    pub worker_id: u32,
    pub local_mountpoint: Option<String>,
    /// Handles held by user operations, on top of the scheduler's own
    /// reference. The scheduler's reference is implicit: the entry
    /// existing in the cache counts as one (spec invariant §3.3.6).
    refs: u32,
    idle_since: Option<Timestamp>,
}

impl AttachedMediaInfo {
    pub fn new(attach_id: String, worker_id: u32, local_mountpoint: Option<String>) -> Self {
        Self {
            attach_id,
            worker_id,
            local_mountpoint,
            refs: 0,
            idle_since: None,
        }
    }

    pub fn acquire(&mut self) {
        self.refs += 1;
        self.idle_since = None;
    }

    /// Release a user handle. Returns `true` if this was the last
    /// non-scheduler reference, starting the idle timer.
    pub fn release(&mut self, now: Timestamp) -> bool {
        self.refs = self.refs.saturating_sub(1);
        if self.refs == 0 {
            self.idle_since = Some(now);
            true
        } else {
            false
        }
    }

    pub fn is_idle_expired(&self, now: Timestamp, ttl: Duration) -> bool {
        match self.idle_since {
            Some(since) => now.saturating_sub(since) >= ttl.as_millis() as Timestamp,
            None => false,
        }
    }
}

/// Cache of attached media, keyed by [`MediaKey`] (spec §4.3.5).
#[derive(Debug, Default)]
pub struct MediaCache {
    entries: std::collections::HashMap<MediaKey, AttachedMediaInfo>,
}

impl MediaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing attach, issuing a new handle if found (spec
    /// §4.3.5: "a new handle is issued without re-contacting the
    /// worker").
    pub fn acquire(&mut self, key: &MediaKey) -> Option<&AttachedMediaInfo> {
        let entry = self.entries.get_mut(key)?;
        entry.acquire();
        Some(entry)
    }

    pub fn insert(&mut self, key: MediaKey, info: AttachedMediaInfo) {
        self.entries.insert(key, info);
    }

    pub fn release(&mut self, key: &MediaKey, now: Timestamp) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => entry.release(now),
            None => false,
        }
    }

    /// Media whose idle timer has expired: the scheduler should send a
    /// Detach to the owning worker and remove the entry (spec §4.3.2 step
    /// 3).
    pub fn expired(&self, now: Timestamp, ttl: Duration) -> Vec<MediaKey> {
        self.entries
            .iter()
            .filter(|(_, info)| info.is_idle_expired(now, ttl))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn remove(&mut self, key: &MediaKey) -> Option<AttachedMediaInfo> {
        self.entries.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(url: &str) -> MediaKey {
        MediaKey::new([url.to_string()], None)
    }

    #[test]
    fn second_acquire_on_the_same_key_reuses_the_entry() {
        let mut cache = MediaCache::new();
        cache.insert(key("dvd:///"), AttachedMediaInfo::new("a1".into(), 1, None));
        assert!(cache.acquire(&key("dvd:///")).is_some());
        assert!(cache.acquire(&key("dvd:///")).is_some());
    }

    #[test]
    fn idle_timer_starts_only_after_last_release() {
        let mut info = AttachedMediaInfo::new("a1".into(), 1, None);
        info.acquire();
        info.acquire();
        assert!(!info.release(1_000)); // one handle remains
        assert!(info.release(1_000)); // last handle released
        assert!(info.is_idle_expired(61_001, Duration::from_secs(60)));
        assert!(!info.is_idle_expired(1_500, Duration::from_secs(60)));
    }
}
