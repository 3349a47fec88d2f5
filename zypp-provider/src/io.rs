//! Scheduler-driven effects, expressed as a queue of [`Io`] values rather
//! than performed in place, so the scheduling cycle is testable without
//! real worker processes.

use std::collections::VecDeque;
use std::time::Duration;

use zypp_core::MirroredOrigin;
use zypp_wire::WorkerMessage;

use crate::auth::AuthKey;
use crate::worker::WorkerId;

/// Effect requested by the scheduler. The event loop owner is
/// responsible for actually spawning processes, writing frames, etc.,
/// and feeding results back in via [`crate::scheduler::Scheduler`]'s
/// `on_*` methods.
#[derive(Debug)]
pub enum Io {
    /// Spawn a new worker process for the given effective scheme.
    SpawnWorker { scheme: String, worker: WorkerId },
    /// Send a message to a specific worker.
    Send { worker: WorkerId, message: WorkerMessage, request_id: u32 },
    /// Forcefully terminate a worker (cancellation grace period elapsed,
    /// or idle reaping).
    Kill { worker: WorkerId },
    /// Ask for a wakeup after the given delay (the 100ms pulse timer, or
    /// a cancellation grace deadline).
    Wakeup(Duration),
    /// Emit a user-visible event (item finished, item failed, ...).
    Event(Event),
}

/// User-visible scheduler events.
#[derive(Debug)]
pub enum Event {
    ItemFinished { request_id: u32 },
    ItemFailed { request_id: u32, reason: String },
    /// No prompt is in flight for this auth key yet: the event loop owner
    /// must prompt the credential manager and report the answer back via
    /// `Scheduler::resolve_auth` (spec §4.3.4).
    AuthPromptRequired { request_id: u32, key: AuthKey },
    /// A 301 produced more than one usable mirror URL: the caller should
    /// hand the origin to the multi-range fetch engine instead of
    /// expecting a single-connection `ItemFinished` (spec §4.4, §4.3.3).
    MultiRangeReady { request_id: u32, origin: MirroredOrigin },
}

/// FIFO effect queue, drained by the event loop. Mirrors `Reactor`'s
/// `VecDeque<Io>` + `Iterator` pattern.
#[derive(Debug, Default)]
pub struct IoQueue {
    queue: VecDeque<Io>,
}

impl IoQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, io: Io) {
        self.queue.push_back(io);
    }
}

impl Iterator for IoQueue {
    type Item = Io;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop_front()
    }
}

/// Abstracts a worker's stdin/stdout pipe so the scheduler can be
/// exercised against a fake in tests, generic over separate reader/writer
/// streams instead of a concrete socket type.
pub trait WorkerTransport {
    fn send(&mut self, message: &WorkerMessage, request_id: u32) -> std::io::Result<()>;
    fn try_recv(&mut self) -> std::io::Result<Option<(u32, WorkerMessage)>>;
}
