//! Per-mirror fetch worker state machine, the best-candidate stealing
//! rule, and rate control (spec §4.4.2, §4.4.4, §4.4.6).

use zypp_core::{config::Defaults, Url};

pub type WorkerId = u32;

/// A fetch worker's lifecycle state (spec §4.4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchWorkerState {
    Starting,
    Lookup,
    Fetch,
    Discard,
    Done,
    Sleep,
    Broken,
}

/// One worker bound to a single mirror URL (spec §4.4.2).
#[derive(Clone, Debug)]
pub struct FetchWorker {
    pub id: WorkerId,
    pub url: Url,
    pub state: FetchWorkerState,
    pub stripe_index: Option<usize>,
    /// Stripe generation used by the stealing rule; `-1` excludes this
    /// worker from being stolen from or stealing.
    pub pass: i64,
    pub bytes_transferred: u64,
    pub avg_speed: f64,
}

impl FetchWorker {
    pub fn new(id: WorkerId, url: Url) -> Self {
        Self {
            id,
            url,
            state: FetchWorkerState::Starting,
            stripe_index: None,
            pass: 0,
            bytes_transferred: 0,
            avg_speed: 0.0,
        }
    }

    /// Remaining bytes in the worker's current stripe assignment, used
    /// by the stealing rule's "faster writer" tie-break (spec §4.4.4).
    pub fn remaining_bytes(&self, stripe_total_bytes: u64) -> u64 {
        stripe_total_bytes.saturating_sub(self.bytes_transferred)
    }

    /// Estimated time to finish the current assignment; lower is faster.
    pub fn eta(&self, stripe_total_bytes: u64) -> f64 {
        let remaining = self.remaining_bytes(stripe_total_bytes) as f64;
        if self.avg_speed <= 0.0 {
            f64::INFINITY
        } else {
            remaining / self.avg_speed
        }
    }

    fn is_stealable(&self) -> bool {
        !matches!(
            self.state,
            FetchWorkerState::Discard
                | FetchWorkerState::Done
                | FetchWorkerState::Sleep
                | FetchWorkerState::Broken
        ) && self.pass != -1
    }
}

/// The best-candidate rule from spec §4.4.4: among workers eligible for
/// stealing, find the one this worker should compete with. `stripe_bytes`
/// gives each candidate's assigned stripe's total byte size, needed for
/// the same-stripe/same-pass speed tie-break.
pub fn best_candidate<'a>(
    workers: &'a [FetchWorker],
    stripe_bytes: impl Fn(usize) -> u64,
) -> Option<&'a FetchWorker> {
    let mut best: Option<&FetchWorker> = None;
    for w in workers.iter().filter(|w| w.is_stealable()) {
        best = Some(match best {
            None => w,
            Some(b) if b.pass > w.pass => w,
            Some(b) if b.pass < w.pass => b,
            Some(b) if b.stripe_index == w.stripe_index => {
                // Same pass, same stripe: keep the faster one.
                let stripe = b
                    .stripe_index
                    .map(&stripe_bytes)
                    .unwrap_or(0);
                if w.eta(stripe) < b.eta(stripe) {
                    w
                } else {
                    b
                }
            }
            // Same pass, different stripe: keep the slower one, so the
            // faster worker moves on to help elsewhere.
            Some(b) => {
                let b_stripe = b.stripe_index.map(&stripe_bytes).unwrap_or(0);
                let w_stripe = w.stripe_index.map(&stripe_bytes).unwrap_or(0);
                if w.eta(w_stripe) > b.eta(b_stripe) {
                    w
                } else {
                    b
                }
            }
        });
    }
    best
}

/// Rate control: each worker's byte-rate cap given the overall target
/// and the current global average (spec §4.4.6).
pub fn worker_rate_cap(max_speed: u64, worker_max: u64, global_avg: u64, max_conns: usize) -> u64 {
    if global_avg == 0 {
        return max_speed;
    }
    let scaled = (max_speed as f64 * worker_max as f64 / global_avg as f64) as u64;
    let floor = (max_speed / max_conns.max(1) as u64)
        .max(Defaults::MIN_WORKER_RATE)
        .min(max_speed);
    scaled.clamp(floor, max_speed)
}

/// Backoff duration for a worker trailing the fastest peer by ratio `r`
/// (spec §4.4.6: "sleeps r² seconds, cap 1s").
pub fn backoff_seconds(r: f64) -> f64 {
    (r * r).min(1.0)
}
