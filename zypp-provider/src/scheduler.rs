//! The provider scheduler: admission, dispatch, retry/fail-over,
//! cancellation and media/auth coalescing (spec §4.3). A pool of
//! long-running workers fed from a channel, combined with an
//! effect-queue reactor pattern, generalized from a git-fetch worker
//! pool to a multi-scheme provider pool.

use std::collections::HashMap;

use log::{debug, trace, warn};

use zypp_core::config::Defaults;
use zypp_core::{History, MirroredOrigin, Timestamp, Url};
use zypp_wire::{code, Capabilities, ErrorReport, WorkerMessage, WorkerType};

use crate::auth::{AuthCoalescer, AuthDecision, AuthKey, CachedAuth};
use crate::io::{Event, Io, IoQueue};
use crate::media::{AttachedMediaInfo, MediaCache, MediaKey};
use crate::queue::{HostBusyCounters, Queue, QueueLimits};
use crate::request::{ProvideRequest, RequestIdGenerator};
use crate::scheme::EffectiveSchemeMap;
use crate::worker::WorkerId;

/// Codes that always authorize mirror fail-over, independent of the
/// per-report `transient` flag (spec §4.3.3).
const ALWAYS_FAILOVER_CODES: [u32; 4] = [
    code::CONNECTION_FAILED,
    code::TIMEOUT,
    code::MOUNT_FAILED,
    code::MEDIUM_NOT_DESIRED,
];

fn authorizes_failover(report: &ErrorReport) -> bool {
    report.transient || ALWAYS_FAILOVER_CODES.contains(&report.code)
}

/// A 300 redirect is accepted only between two downloading schemes, and
/// only to a URL not already in `past_redirects` (spec §4.3.3). Loop
/// detection and the actual origin swap happen on the owning
/// `ProvideRequest`, which the scheduler holds only a weak reference to
/// (spec §3.4); this is the admissibility check the scheduler itself is
/// responsible for.
pub fn redirect_is_admissible(request: &ProvideRequest, target: &zypp_core::Url) -> bool {
    request.active_url.classify().is_downloading()
        && target.classify().is_downloading()
        && !request.past_redirects.contains(target)
}

/// Tracks a cancellation in progress: when the grace period lapses
/// without a matching 408, the owning worker is killed (spec §4.3.6).
#[derive(Debug)]
struct PendingCancel {
    worker: WorkerId,
    deadline: Timestamp,
}

/// A request currently assigned to a worker. Retained in full (not just
/// the `(scheme, worker)` pair) so that a terminal response can drive
/// mirror fail-over (spec §4.3.3) and redirect handling, both of which
/// need the request's origin and `past_redirects`.
struct InFlight {
    scheme: String,
    worker: WorkerId,
    request: ProvideRequest,
}

pub struct Scheduler {
    schemes: EffectiveSchemeMap,
    queues: HashMap<String, Queue>,
    host_busy: HostBusyCounters,
    media: MediaCache,
    auth: AuthCoalescer,
    ids: RequestIdGenerator,
    in_flight: HashMap<u32, InFlight>,
    /// Accumulated mirror-fail-over history per request, preserving the
    /// first exception and appending the rest (spec §4.3.3, §7). Lives
    /// across re-enqueues of the same `request_id` and is cleared once
    /// the item finishes or every mirror is exhausted.
    retry_history: HashMap<u32, History<String>>,
    cancelling: HashMap<u32, PendingCancel>,
    io: IoQueue,
    next_worker_id: WorkerId,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schemes: EffectiveSchemeMap::default(),
            queues: HashMap::new(),
            host_busy: HostBusyCounters::new(),
            media: MediaCache::new(),
            auth: AuthCoalescer::new(),
            ids: RequestIdGenerator::new(),
            in_flight: HashMap::new(),
            retry_history: HashMap::new(),
            cancelling: HashMap::new(),
            io: IoQueue::new(),
            next_worker_id: 1,
        }
    }

    pub fn register_scheme(&mut self, scheme: impl Into<String>, worker_type: WorkerType) {
        let scheme = scheme.into();
        self.queues
            .entry(scheme.clone())
            .or_insert_with(|| Queue::new(scheme, worker_type, QueueLimits::default()));
    }

    /// Enqueue a new request, routed by its active URL's effective
    /// scheme (spec §4.3.1).
    pub fn submit(&mut self, message: WorkerMessage, origin: MirroredOrigin) -> u32 {
        let request_id = self.ids.next();
        let request = ProvideRequest::new(request_id, message, origin);
        self.enqueue_request(request);
        request_id
    }

    /// Route `request` to the queue for its active URL's effective
    /// scheme, creating the queue on first use. Shared by `submit` and
    /// every retry/redirect path that re-dispatches an existing request.
    fn enqueue_request(&mut self, request: ProvideRequest) {
        let scheme = request.active_url.scheme().to_string();
        let effective = self.schemes.effective(&scheme).to_string();
        let queue = self
            .queues
            .entry(effective.clone())
            .or_insert_with(|| Queue::new(effective, WorkerType::Downloading, QueueLimits::default()));
        queue.enqueue(request);
    }

    /// Run one scheduling cycle (spec §4.3.2): dispatch as much pending
    /// work as admission allows, then reap idle workers and media.
    /// Drain the returned effects and call the `on_*` methods as their
    /// results arrive.
    pub fn cycle(&mut self, now: Timestamp) -> &mut IoQueue {
        let schemes: Vec<String> = self.queues.keys().cloned().collect();
        for scheme in schemes {
            self.dispatch_scheme(&scheme);
        }
        self.reap_idle_workers(now);
        self.reap_idle_media(now);
        self.check_cancellation_deadlines(now);
        self.io.push(Io::Wakeup(Defaults::PULSE));
        &mut self.io
    }

    fn dispatch_scheme(&mut self, scheme: &str) {
        loop {
            let Some(queue) = self.queues.get_mut(scheme) else {
                return;
            };
            if queue.is_empty() {
                return;
            }
            if queue.has_single_instance_worker() && queue.workers.len() >= 1 {
                // A SingleInstance worker exists: only dispatch to it, never
                // spawn a sibling (spec §4.3.1).
                if let Some(worker_id) = queue.pick_worker() {
                    self.dispatch_to(scheme, worker_id);
                    continue;
                }
                return;
            }
            if let Some(worker_id) = queue.pick_worker() {
                self.dispatch_to(scheme, worker_id);
                continue;
            }

            let host = queue
                .peek_front()
                .map(|r| r.active_url.host().to_string())
                .unwrap_or_default();
            let busy = self.host_busy.busy(scheme, &host);
            let queue = self.queues.get(scheme).expect("scheme queue exists");
            if !queue.may_spawn(busy) {
                return;
            }
            let worker_id = self.next_worker_id;
            self.next_worker_id += 1;
            self.io.push(Io::SpawnWorker {
                scheme: scheme.to_string(),
                worker: worker_id,
            });
            let worker_type = queue.worker_type;
            self.queues
                .get_mut(scheme)
                .expect("scheme queue exists")
                .workers
                .push(crate::worker::WorkerHandle::new(
                    worker_id,
                    worker_type,
                    Capabilities::empty(),
                ));
        }
    }

    fn dispatch_to(&mut self, scheme: &str, worker_id: WorkerId) {
        let queue = self.queues.get_mut(scheme).expect("scheme queue exists");
        let Some(request) = queue.pop_front() else {
            return;
        };
        let host = request.active_url.host().to_string();
        let request_id = request.request_id;
        let message = request.message_for_active_url();

        if let Some(worker) = queue.worker_mut(worker_id) {
            worker.dispatch(request_id);
        }
        self.host_busy.increment(scheme, &host);
        self.in_flight.insert(
            request_id,
            InFlight {
                scheme: scheme.to_string(),
                worker: worker_id,
                request,
            },
        );
        self.io.push(Io::Send {
            worker: worker_id,
            message,
            request_id,
        });
        trace!(target: "provider", "dispatched request {request_id} to worker {worker_id} on {scheme}");
    }

    /// A worker reported a terminal error for `request_id`. Apply
    /// fail-over (spec §4.3.3): try the next mirror, or fail the item
    /// with the first exception, plus every subsequent one, once mirrors
    /// are exhausted.
    pub fn on_error(&mut self, request_id: u32, report: ErrorReport) {
        let Some(InFlight { scheme, worker, mut request }) = self.in_flight.remove(&request_id) else {
            warn!(target: "provider", "error for unknown request {request_id}");
            return;
        };
        self.release_worker(&scheme, worker, &request, request_id);

        if !authorizes_failover(&report) {
            self.retry_history.remove(&request_id);
            self.io.push(Io::Event(Event::ItemFailed {
                request_id,
                reason: report.reason,
            }));
            return;
        }

        match self.retry_history.get_mut(&request_id) {
            Some(history) => history.push(&report.reason),
            None => {
                self.retry_history.insert(request_id, History::new(report.reason.clone()));
            }
        }

        if request.advance_mirror() {
            debug!(
                target: "provider",
                "request {request_id} failed transiently ({}), advancing to mirror {}",
                report.reason, request.active_url
            );
            self.enqueue_request(request);
            return;
        }

        let history = self
            .retry_history
            .remove(&request_id)
            .expect("just inserted above");
        warn!(target: "provider", "request {request_id} exhausted every mirror: {history}");
        self.io.push(Io::Event(Event::ItemFailed {
            request_id,
            reason: history.to_string(),
        }));
    }

    /// A 300: the worker wants to retry against a single alternate URL
    /// (spec §4.3.3). Rejects redirect loops and cross-class redirects.
    pub fn on_redirect(&mut self, request_id: u32, new_url: Url) {
        let Some(InFlight { scheme, worker, mut request }) = self.in_flight.remove(&request_id) else {
            warn!(target: "provider", "redirect for unknown request {request_id}");
            return;
        };
        self.release_worker(&scheme, worker, &request, request_id);

        if !redirect_is_admissible(&request, &new_url) {
            warn!(target: "provider", "request {request_id} rejected inadmissible redirect to {new_url}");
            self.io.push(Io::Event(Event::ItemFailed {
                request_id,
                reason: format!("redirect to {new_url} rejected (loop or scheme-class mismatch)"),
            }));
            return;
        }

        request.redirect_to(new_url);
        self.enqueue_request(request);
    }

    /// A 301: the worker supplied a replacement mirror list (spec
    /// §4.3.3). More than one URL hands the item off to the multi-range
    /// fetch engine instead of a single-connection retry.
    pub fn on_metalink(&mut self, request_id: u32, urls: Vec<Url>) {
        let Some(InFlight { scheme, worker, mut request }) = self.in_flight.remove(&request_id) else {
            warn!(target: "provider", "metalink redirect for unknown request {request_id}");
            return;
        };
        self.release_worker(&scheme, worker, &request, request_id);

        let Ok(origin) = MirroredOrigin::try_from_vec(urls) else {
            self.io.push(Io::Event(Event::ItemFailed {
                request_id,
                reason: "metalink redirect carried no usable urls".into(),
            }));
            return;
        };

        request.replace_origin(origin.clone());
        if origin.len() > 1 {
            self.io.push(Io::Event(Event::MultiRangeReady { request_id, origin }));
            return;
        }
        self.enqueue_request(request);
    }

    /// A 700: the worker needs credentials for `effective_url` (spec
    /// §4.3.4). Coalesces concurrent prompts for the same key; the worker
    /// stays parked on its in-flight entry until [`Scheduler::resolve_auth`]
    /// answers it.
    pub fn on_auth_required(
        &mut self,
        request_id: u32,
        effective_url: String,
        username_hint: Option<String>,
        already_tried_at: Option<Timestamp>,
    ) {
        let Some(in_flight) = self.in_flight.get(&request_id) else {
            warn!(target: "provider", "auth required for unknown request {request_id}");
            return;
        };
        let worker = in_flight.worker;
        let key = AuthKey {
            effective_url,
            username_hint,
        };

        match self.auth.request(key.clone(), request_id, already_tried_at) {
            AuthDecision::PromptRequired => {
                self.io.push(Io::Event(Event::AuthPromptRequired { request_id, key }));
            }
            AuthDecision::WaitForInFlight => {}
            AuthDecision::Cached(cached) => {
                self.send_auth_info(worker, request_id, &cached);
            }
        }
    }

    /// The credential manager answered a prompt raised via
    /// [`Event::AuthPromptRequired`]: wake every request waiting on that
    /// key.
    pub fn resolve_auth(&mut self, key: AuthKey, answer: CachedAuth) {
        let waiters = self.auth.resolve(key, answer.clone());
        for request_id in waiters {
            if let Some(in_flight) = self.in_flight.get(&request_id) {
                let worker = in_flight.worker;
                self.send_auth_info(worker, request_id, &answer);
            }
        }
    }

    fn send_auth_info(&mut self, worker: WorkerId, request_id: u32, auth: &CachedAuth) {
        self.io.push(Io::Send {
            worker,
            message: WorkerMessage::AuthInfo {
                username: auth.username.clone(),
                password: auth.password.clone(),
                auth_timestamp: auth.obtained_at,
                auth_type: None,
            },
            request_id,
        });
    }

    /// A 201: an Attach finished, caching the medium so later Attach
    /// requests for the same key avoid re-contacting the worker (spec
    /// §4.3.5).
    pub fn on_attach_finished(&mut self, request_id: u32, local_mountpoint: Option<String>) {
        let Some(InFlight { scheme, worker, request }) = self.in_flight.remove(&request_id) else {
            warn!(target: "provider", "attach finished for unknown request {request_id}");
            return;
        };
        self.release_worker(&scheme, worker, &request, request_id);

        if let WorkerMessage::Attach(attach) = &request.message {
            let urls = request.origin.iter().map(|u| u.as_str().to_string());
            let content_id = attach
                .verify
                .as_ref()
                .map(|v| v.verify_data.clone());
            let key = MediaKey::new(urls, content_id);
            self.media.insert(
                key,
                AttachedMediaInfo::new(attach.attach_id.clone(), worker, local_mountpoint),
            );
        }

        self.io.push(Io::Event(Event::ItemFinished { request_id }));
    }

    pub fn on_finished(&mut self, request_id: u32) {
        if let Some(InFlight { scheme, worker, request }) = self.in_flight.remove(&request_id) {
            self.release_worker(&scheme, worker, &request, request_id);
        }
        self.retry_history.remove(&request_id);
        self.io.push(Io::Event(Event::ItemFinished { request_id }));
    }

    fn release_worker(&mut self, scheme: &str, worker_id: WorkerId, request: &ProvideRequest, request_id: u32) {
        let now = zypp_core::now();
        if let Some(queue) = self.queues.get_mut(scheme) {
            if let Some(worker) = queue.worker_mut(worker_id) {
                worker.complete(request_id, now);
            }
        }
        self.host_busy.decrement(scheme, request.active_url.host());
    }

    /// Begin cooperative cancellation (spec §4.3.6): send a 601 and start
    /// the grace-period clock.
    pub fn cancel(&mut self, request_id: u32, now: Timestamp) {
        let Some(worker_id) = self.in_flight.get(&request_id).map(|f| f.worker) else {
            return;
        };
        self.io.push(Io::Send {
            worker: worker_id,
            message: WorkerMessage::Cancel,
            request_id,
        });
        self.cancelling.insert(
            request_id,
            PendingCancel {
                worker: worker_id,
                deadline: now + Defaults::CANCEL_GRACE.as_millis() as Timestamp,
            },
        );
    }

    /// A worker responded to a cancel with a 408: the cancellation is
    /// complete, no kill needed.
    pub fn on_cancelled(&mut self, request_id: u32) {
        self.cancelling.remove(&request_id);
        self.on_finished(request_id);
    }

    fn check_cancellation_deadlines(&mut self, now: Timestamp) {
        let expired: Vec<u32> = self
            .cancelling
            .iter()
            .filter(|(_, pending)| now >= pending.deadline)
            .map(|(id, _)| *id)
            .collect();
        for request_id in expired {
            if let Some(pending) = self.cancelling.remove(&request_id) {
                warn!(target: "provider", "worker {} did not ack cancel of {request_id} in time, killing", pending.worker);
                self.io.push(Io::Kill { worker: pending.worker });
            }
        }
    }

    fn reap_idle_workers(&mut self, now: Timestamp) {
        for queue in self.queues.values_mut() {
            let expired: Vec<WorkerId> = queue
                .workers
                .iter()
                .filter(|w| w.is_idle_expired(now, Defaults::WORKER_IDLE_TTL))
                .map(|w| w.id)
                .collect();
            for worker_id in expired {
                queue.workers.retain(|w| w.id != worker_id);
            }
        }
    }

    fn reap_idle_media(&mut self, now: Timestamp) {
        let expired = self.media.expired(now, Defaults::MEDIA_IDLE_TTL);
        for key in expired {
            if let Some(info) = self.media.remove(&key) {
                self.io.push(Io::Send {
                    worker: info.worker_id,
                    message: WorkerMessage::Detach {
                        url: String::new(),
                    },
                    request_id: 0,
                });
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
