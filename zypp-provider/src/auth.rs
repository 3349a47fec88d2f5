//! Authentication coalescing: a 700 (Auth required) is keyed by
//! `(effective-url, username-hint)`; concurrent requests for the same key
//! share one credential prompt (spec §4.3.4).

use std::collections::HashMap;

use zypp_core::Timestamp;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AuthKey {
    pub effective_url: String,
    pub username_hint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CachedAuth {
    pub username: String,
    pub password: String,
    pub obtained_at: Timestamp,
}

/// Outcome of asking the coalescer to handle a 700.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthDecision {
    /// No prompt in flight and no usable cache entry: the caller must
    /// prompt the credential manager and call [`AuthCoalescer::resolve`].
    PromptRequired,
    /// A prompt for this key is already in flight; the caller should wait
    /// and will be notified via [`AuthCoalescer::resolve`]'s callers.
    WaitForInFlight,
    /// A cached answer is still fresh relative to the timestamp the
    /// worker reported already trying.
    Cached(CachedAuth),
}

/// Coalesces concurrent 700s for the same key into a single prompt (spec
/// §4.3.4).
#[derive(Debug, Default)]
pub struct AuthCoalescer {
    cache: HashMap<AuthKey, CachedAuth>,
    in_flight: HashMap<AuthKey, Vec<u32>>,
}

impl AuthCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker reported a 700, optionally with the timestamp of
    /// credentials it already tried (and found stale). `request_id`
    /// identifies the waiting request so it can be woken when the prompt
    /// resolves.
    pub fn request(
        &mut self,
        key: AuthKey,
        request_id: u32,
        already_tried_at: Option<Timestamp>,
    ) -> AuthDecision {
        if let Some(cached) = self.cache.get(&key) {
            let stale = already_tried_at.is_some_and(|tried| tried >= cached.obtained_at);
            if !stale {
                return AuthDecision::Cached(cached.clone());
            }
            self.cache.remove(&key);
        }

        let waiters = self.in_flight.entry(key).or_default();
        let already_waiting = !waiters.is_empty();
        waiters.push(request_id);

        if already_waiting {
            AuthDecision::WaitForInFlight
        } else {
            AuthDecision::PromptRequired
        }
    }

    /// The credential manager answered for `key`: cache the answer and
    /// return every request-id that was waiting on it.
    pub fn resolve(&mut self, key: AuthKey, answer: CachedAuth) -> Vec<u32> {
        let waiters = self.in_flight.remove(&key).unwrap_or_default();
        self.cache.insert(key, answer);
        waiters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AuthKey {
        AuthKey {
            effective_url: "http://example.org".into(),
            username_hint: None,
        }
    }

    #[test]
    fn first_request_prompts_later_ones_wait() {
        let mut auth = AuthCoalescer::new();
        assert_eq!(auth.request(key(), 1, None), AuthDecision::PromptRequired);
        assert_eq!(auth.request(key(), 2, None), AuthDecision::WaitForInFlight);
    }

    #[test]
    fn resolving_wakes_every_waiter_and_populates_the_cache() {
        let mut auth = AuthCoalescer::new();
        auth.request(key(), 1, None);
        auth.request(key(), 2, None);
        let answer = CachedAuth {
            username: "u".into(),
            password: "p".into(),
            obtained_at: 1_000,
        };
        let waiters = auth.resolve(key(), answer);
        assert_eq!(waiters, vec![1, 2]);

        match auth.request(key(), 3, None) {
            AuthDecision::Cached(c) => assert_eq!(c.username, "u"),
            other => panic!("expected a cache hit, got {other:?}"),
        }
    }

    #[test]
    fn a_worker_reporting_a_newer_already_tried_timestamp_invalidates_the_cache() {
        let mut auth = AuthCoalescer::new();
        auth.resolve(
            key(),
            CachedAuth {
                username: "u".into(),
                password: "p".into(),
                obtained_at: 1_000,
            },
        );
        assert_eq!(
            auth.request(key(), 1, Some(2_000)),
            AuthDecision::PromptRequired
        );
    }
}
