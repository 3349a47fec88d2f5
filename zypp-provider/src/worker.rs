//! A worker process handle as seen by the scheduler: its capabilities,
//! how many requests it can hold in flight, and idle-reap bookkeeping
//! (spec §4.3.1, §4.3.2).

use zypp_core::Timestamp;
use zypp_wire::{Capabilities, WorkerType};

pub type WorkerId = u32;

/// A worker process slot owned by a [`crate::queue::Queue`].
#[derive(Clone, Debug)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub worker_type: WorkerType,
    pub capabilities: Capabilities,
    in_flight: Vec<u32>,
    idle_since: Option<Timestamp>,
}

impl WorkerHandle {
    pub fn new(id: WorkerId, worker_type: WorkerType, capabilities: Capabilities) -> Self {
        Self {
            id,
            worker_type,
            capabilities,
            in_flight: Vec::new(),
            idle_since: None,
        }
    }

    pub fn is_pipeline(&self) -> bool {
        self.capabilities.contains(Capabilities::PIPELINE)
    }

    pub fn is_single_instance(&self) -> bool {
        self.capabilities.contains(Capabilities::SINGLE_INSTANCE)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Whether this worker can accept one more request right now (spec
    /// §4.3.1: non-pipeline workers accept only one at a time; pipeline
    /// workers accept any number).
    pub fn can_accept(&self) -> bool {
        self.is_pipeline() || self.is_idle()
    }

    pub fn dispatch(&mut self, request_id: u32) {
        self.in_flight.push(request_id);
        self.idle_since = None;
    }

    pub fn complete(&mut self, request_id: u32, now: Timestamp) {
        self.in_flight.retain(|&id| id != request_id);
        if self.in_flight.is_empty() {
            self.idle_since = Some(now);
        }
    }

    pub fn is_idle_expired(&self, now: Timestamp, ttl: std::time::Duration) -> bool {
        match self.idle_since {
            Some(since) => now.saturating_sub(since) >= ttl.as_millis() as Timestamp,
            None => false,
        }
    }
}
