//! `ProvideRequest` / `ProvideItem`: the unit of work routed through the
//! scheduler and the user-visible handle tracking its progress (spec
//! §3.2).

use std::sync::atomic::{AtomicU32, Ordering};

use zypp_core::{MirroredOrigin, Url};
use zypp_wire::{AttachRequest, ProvideRequestMsg, WorkerMessage};

/// Process-wide, monotonically increasing source of request IDs (spec
/// invariant §3.3.7: never reused within the scheduler's lifetime).
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    next: AtomicU32,
}

impl RequestIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn next(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A single in-flight request to a worker, tracking the mirror fail-over
/// state that spans retries (spec §3.2, §4.3.3).
#[derive(Clone, Debug)]
pub struct ProvideRequest {
    pub request_id: u32,
    pub message: WorkerMessage,
    pub origin: MirroredOrigin,
    /// URLs already tried and abandoned for this request, in order;
    /// checked to detect redirect loops (spec §4.3.3).
    pub past_redirects: Vec<Url>,
    /// The URL currently being attempted.
    pub active_url: Url,
}

impl ProvideRequest {
    pub fn new(request_id: u32, message: WorkerMessage, origin: MirroredOrigin) -> Self {
        let active_url = origin.authority().clone();
        Self {
            request_id,
            message,
            origin,
            past_redirects: Vec::new(),
            active_url,
        }
    }

    /// Advance to the next URL in the origin's mirror list, recording the
    /// current one as a past redirect. Returns `false` once every mirror
    /// has been tried (spec §4.3.3: "if the list is exhausted...").
    pub fn advance_mirror(&mut self) -> bool {
        let tried = self.active_url.clone();
        self.past_redirects.push(tried);
        let next = self
            .origin
            .iter()
            .find(|u| !self.past_redirects.contains(u));
        match next {
            Some(url) => {
                self.active_url = url.clone();
                true
            }
            None => false,
        }
    }

    /// Replace the active URL following a 300 redirect, recording the
    /// prior URL. Returns `false` if `target` was already tried (a
    /// redirect loop, spec §4.3.3).
    pub fn redirect_to(&mut self, target: Url) -> bool {
        if self.past_redirects.contains(&target) || self.active_url == target {
            return false;
        }
        self.past_redirects.push(self.active_url.clone());
        self.active_url = target;
        true
    }

    /// Replace the mirror list wholesale following a 301 (spec §4.3.3).
    pub fn replace_origin(&mut self, origin: MirroredOrigin) {
        self.active_url = origin.authority().clone();
        self.origin = origin;
    }

    /// The message to actually dispatch for the current `active_url`
    /// attempt, with the url field patched to match it. Mirror fail-over
    /// (spec §4.3.3) advances `active_url` without touching `message`, so
    /// every (re)dispatch must go through this rather than `message`
    /// directly or a retry would just re-hit the URL that just failed.
    pub fn message_for_active_url(&self) -> WorkerMessage {
        let url = self.active_url.as_str().to_string();
        match &self.message {
            WorkerMessage::Provide(req) => WorkerMessage::Provide(ProvideRequestMsg {
                url,
                ..req.clone()
            }),
            WorkerMessage::Attach(req) => WorkerMessage::Attach(AttachRequest {
                url,
                ..req.clone()
            }),
            WorkerMessage::Detach { .. } => WorkerMessage::Detach { url },
            other => other.clone(),
        }
    }
}

/// Lifecycle state of a [`ProvideItem`] (spec §3.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemState {
    Uninit,
    Pending,
    Running,
    Finalizing,
    Finished,
}

/// Aggregated transfer statistics for a [`ProvideItem`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ItemStats {
    pub bytes_transferred: u64,
    pub attempts: u32,
}

/// The user-visible unit of work: one logical provide/attach/detach
/// operation, which may span several [`ProvideRequest`] attempts across
/// mirrors (spec §3.2).
#[derive(Debug)]
pub struct ProvideItem {
    pub state: ItemState,
    pub stats: ItemStats,
    pub request: Option<ProvideRequest>,
}

impl ProvideItem {
    pub fn new() -> Self {
        Self {
            state: ItemState::Uninit,
            stats: ItemStats::default(),
            request: None,
        }
    }

    pub fn enqueue(&mut self, request: ProvideRequest) {
        self.state = ItemState::Pending;
        self.request = Some(request);
    }

    pub fn start(&mut self) {
        self.state = ItemState::Running;
        self.stats.attempts += 1;
    }

    pub fn finish(&mut self) {
        self.state = ItemState::Finished;
    }
}

impl Default for ProvideItem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(urls: &[&str]) -> MirroredOrigin {
        let urls: Vec<_> = urls.iter().map(|u| Url::parse(u).unwrap()).collect();
        MirroredOrigin::try_from_vec(urls).unwrap()
    }

    #[test]
    fn request_ids_are_monotonic_and_never_reused() {
        let gen = RequestIdGenerator::new();
        let ids: Vec<_> = (0..5).map(|_| gen.next()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn mirror_advance_visits_every_url_then_exhausts() {
        let o = origin(&["http://a/repo", "http://b/repo", "http://c/repo"]);
        let msg = WorkerMessage::Cancel;
        let mut req = ProvideRequest::new(1, msg, o);
        assert_eq!(req.active_url.as_str(), "http://a/repo");
        assert!(req.advance_mirror());
        assert_eq!(req.active_url.as_str(), "http://b/repo");
        assert!(req.advance_mirror());
        assert_eq!(req.active_url.as_str(), "http://c/repo");
        assert!(!req.advance_mirror());
    }

    #[test]
    fn redirect_to_a_previously_tried_url_is_rejected() {
        let o = origin(&["http://a/repo"]);
        let mut req = ProvideRequest::new(1, WorkerMessage::Cancel, o);
        let b = Url::parse("http://b/repo").unwrap();
        assert!(req.redirect_to(b.clone()));
        assert!(!req.redirect_to(Url::parse("http://a/repo").unwrap()));
        assert!(!req.redirect_to(b));
    }

    #[test]
    fn message_for_active_url_tracks_mirror_advance() {
        let o = origin(&["http://a/repo", "http://b/repo"]);
        let msg = WorkerMessage::Provide(ProvideRequestMsg {
            url: "http://a/repo".into(),
            filename: None,
            delta_file: None,
            expected_filesize: None,
            check_existence_only: false,
            metalink_enabled: false,
        });
        let mut req = ProvideRequest::new(1, msg, o);
        req.advance_mirror();
        match req.message_for_active_url() {
            WorkerMessage::Provide(patched) => assert_eq!(patched.url, "http://b/repo"),
            other => panic!("expected Provide, got {other:?}"),
        }
    }
}
