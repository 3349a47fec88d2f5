//! Per-effective-scheme FIFO queue and admission control (spec §4.3.1).

use std::collections::{HashMap, VecDeque};

use zypp_core::config::Defaults;
use zypp_wire::WorkerType;

use crate::request::ProvideRequest;
use crate::worker::{WorkerHandle, WorkerId};

/// Per-scheme concurrency limits, defaulting to spec §4.3.1's values but
/// overridable per effective scheme.
#[derive(Clone, Copy, Debug)]
pub struct QueueLimits {
    pub max_instances: usize,
    pub max_instances_per_host: usize,
}

impl Default for QueueLimits {
    fn default() -> Self {
        Self {
            max_instances: Defaults::MAX_INSTANCES,
            max_instances_per_host: Defaults::MAX_INSTANCES_PER_HOST,
        }
    }
}

/// One effective scheme's pending FIFO and worker pool.
#[derive(Debug)]
pub struct Queue {
    pub scheme: String,
    pub worker_type: WorkerType,
    pub limits: QueueLimits,
    pending: VecDeque<ProvideRequest>,
    pub workers: Vec<WorkerHandle>,
}

impl Queue {
    pub fn new(scheme: impl Into<String>, worker_type: WorkerType, limits: QueueLimits) -> Self {
        Self {
            scheme: scheme.into(),
            worker_type,
            limits,
            pending: VecDeque::new(),
            workers: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, request: ProvideRequest) {
        self.pending.push_back(request);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a new worker may be spawned to serve a host, respecting
    /// the process-wide and per-host caps (spec §4.3.1).
    pub fn may_spawn(&self, per_host_busy: usize) -> bool {
        if self.workers.len() >= self.limits.max_instances {
            return false;
        }
        if self.worker_type == WorkerType::Downloading
            && per_host_busy >= self.limits.max_instances_per_host
        {
            return false;
        }
        true
    }

    /// Pick an existing worker able to accept a new request right now, or
    /// `None` if one must be spawned (or admission denies it).
    pub fn pick_worker(&mut self) -> Option<WorkerId> {
        // A SingleInstance worker is only ever started once; further
        // requests queue behind it rather than spawning a sibling.
        self.workers
            .iter()
            .find(|w| w.can_accept())
            .map(|w| w.id)
    }

    pub fn worker_mut(&mut self, id: WorkerId) -> Option<&mut WorkerHandle> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    pub fn has_single_instance_worker(&self) -> bool {
        self.workers.iter().any(|w| w.is_single_instance())
    }

    pub fn pop_front(&mut self) -> Option<ProvideRequest> {
        self.pending.pop_front()
    }

    pub fn peek_front(&self) -> Option<&ProvideRequest> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Tracks, per effective scheme, how many downloading-worker instances
/// are currently busy with each host (spec §4.3.1 per-host cap).
#[derive(Debug, Default)]
pub struct HostBusyCounters {
    counts: HashMap<(String, String), usize>,
}

impl HostBusyCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy(&self, scheme: &str, host: &str) -> usize {
        self.counts
            .get(&(scheme.to_string(), host.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn increment(&mut self, scheme: &str, host: &str) {
        *self
            .counts
            .entry((scheme.to_string(), host.to_string()))
            .or_insert(0) += 1;
    }

    pub fn decrement(&mut self, scheme: &str, host: &str) {
        if let Some(count) = self.counts.get_mut(&(scheme.to_string(), host.to_string())) {
            *count = count.saturating_sub(1);
        }
    }
}
