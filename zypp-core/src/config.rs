use std::time::Duration;

/// Timeouts and concurrency defaults shared across the provider, fetch and
/// refresh layers (spec §5). Each layer embeds or overrides these in its
/// own config struct rather than reading a process-wide singleton (spec
/// §9 "Global configuration").
#[derive(Clone, Copy, Debug)]
pub struct Defaults;

impl Defaults {
    /// `ZConfig.download_transfer_timeout` equivalent: per-request timeout.
    pub const DOWNLOAD_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60 * 10);
    /// Worker idle time before reaping (§4.3.2 step 2).
    pub const WORKER_IDLE_TTL: Duration = Duration::from_secs(30);
    /// Attached medium idle time before detach (§4.3.2 step 3).
    pub const MEDIA_IDLE_TTL: Duration = Duration::from_secs(60);
    /// Grace period between a Cancel (601) and a forceful kill (§4.3.6).
    pub const CANCEL_GRACE: Duration = Duration::from_secs(5);
    /// Scheduling cycle pulse (§4.3.2).
    pub const PULSE: Duration = Duration::from_millis(100);
    /// Max worker instances per effective scheme, process-wide (§4.3.1).
    pub const MAX_INSTANCES: usize = 10;
    /// Max worker instances per effective scheme, per host (§4.3.1).
    pub const MAX_INSTANCES_PER_HOST: usize = 5;
    /// DNS pre-check / connect timeout (§4.4.3).
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    /// MF idle-progress timeout (§4.4.7 `request_timeout`).
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    /// Minimum synthesized/planned block size (§4.4.1).
    pub const MIN_BLOCK_SIZE: u64 = 4 * 1024;
    /// Minimum per-worker rate-control floor (§4.4.6).
    pub const MIN_WORKER_RATE: u64 = 1024;

    pub fn cpu_bound_workers(logical_cpus: usize) -> usize {
        logical_cpus.min(4).max(1)
    }
}
