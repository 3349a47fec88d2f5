//! The multi-range engine's outer loop: dispatch, stealing, rate
//! control, fail-over and whole-file verification (spec §4.4.4, §4.4.7,
//! §4.4.8). The socket-readiness polling curl itself would drive is
//! replaced here by an explicit `tick`/`on_progress` pair the caller
//! drives from whatever readiness primitive its runtime offers; the
//! state transitions are identical either way.

use zypp_core::{config::Defaults, Checksum, Timestamp, Url};

use crate::block::{BlockState, ClaimOutcome};
use crate::stripe::Stripe;
use crate::worker::{best_candidate, FetchWorker, FetchWorkerState, WorkerId};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no mirror worker produced a usable result: {0}")]
    AllBroken(String),
    #[error("no progress for longer than the request timeout")]
    Timeout,
    #[error("whole-file checksum did not match after assembly")]
    InvalidChecksum,
}

/// Owns the stripe/worker state for one multi-range fetch (spec §4.4).
pub struct Engine {
    stripes: Vec<Stripe>,
    workers: Vec<FetchWorker>,
    /// Mirror URLs not yet assigned to a worker.
    pending_mirrors: Vec<Url>,
    next_worker_id: WorkerId,
    next_unclaimed: usize,
    last_progress: Timestamp,
    broken_reasons: Vec<(WorkerId, String)>,
}

impl Engine {
    pub fn new(stripes: Vec<Stripe>, mirrors: Vec<Url>, now: Timestamp) -> Self {
        let mut pending_mirrors = mirrors;
        let first = pending_mirrors.pop();
        let mut workers = Vec::new();
        let mut next_worker_id = 1;
        if let Some(url) = first {
            workers.push(FetchWorker::new(next_worker_id, url));
            next_worker_id += 1;
        }
        Self {
            stripes,
            workers,
            pending_mirrors,
            next_worker_id,
            next_unclaimed: 0,
            last_progress: now,
            broken_reasons: Vec::new(),
        }
    }

    pub fn workers(&self) -> &[FetchWorker] {
        &self.workers
    }

    fn stripe_total_bytes(&self, index: usize) -> u64 {
        self.stripes
            .get(index)
            .map(|s| s.blocks.len() as u64 * Defaults::MIN_BLOCK_SIZE)
            .unwrap_or(0)
    }

    /// A worker's `nextjob()` (spec §4.4.4): claim the next unclaimed
    /// stripe, or enter stealing mode against the best candidate.
    pub fn next_job(&mut self, worker_id: WorkerId) -> Option<usize> {
        if self.next_unclaimed < self.stripes.len() {
            let index = self.next_unclaimed;
            self.next_unclaimed += 1;
            if let Some(w) = self.workers.iter_mut().find(|w| w.id == worker_id) {
                w.stripe_index = Some(index);
                w.state = FetchWorkerState::Fetch;
            }
            return Some(index);
        }

        let others: Vec<FetchWorker> = self
            .workers
            .iter()
            .filter(|w| w.id != worker_id)
            .cloned()
            .collect();
        let target = best_candidate(&others, |i| self.stripe_total_bytes(i)).cloned();

        match target {
            Some(victim) => {
                let stripe_index = victim.stripe_index;
                let pass = victim.pass + 1;
                if let Some(w) = self.workers.iter_mut().find(|w| w.id == worker_id) {
                    w.stripe_index = stripe_index;
                    w.pass = pass;
                    w.state = FetchWorkerState::Fetch;
                }
                stripe_index
            }
            None => {
                if let Some(w) = self.workers.iter_mut().find(|w| w.id == worker_id) {
                    w.state = FetchWorkerState::Done;
                }
                None
            }
        }
    }

    /// A worker about to write a block (spec §4.4.5).
    pub fn claim_block(&mut self, stripe_index: usize, block_slot: usize) -> ClaimOutcome {
        let Some(stripe) = self.stripes.get_mut(stripe_index) else {
            return ClaimOutcome::Discard;
        };
        let Some(state) = stripe.states.get_mut(block_slot) else {
            return ClaimOutcome::Discard;
        };
        let outcome = state.on_claim();
        if let ClaimOutcome::Proceed(next) = outcome {
            *state = next;
        }
        outcome
    }

    /// The write completed; apply the checksum verdict (spec §4.4.5).
    pub fn complete_block(&mut self, stripe_index: usize, block_slot: usize, checksum_ok: bool) {
        if let Some(stripe) = self.stripes.get_mut(stripe_index) {
            if let Some(state) = stripe.states.get_mut(block_slot) {
                if let Ok(next) = state.on_complete(checksum_ok) {
                    *state = next;
                }
            }
        }
    }

    /// A worker reported a terminal error (spec §4.4.7): mark it
    /// `Broken` but keep it so its unclaimed assignment can be stolen,
    /// and bring in the next pending mirror if one remains.
    pub fn on_worker_error(&mut self, worker_id: WorkerId, reason: String) {
        if let Some(w) = self.workers.iter_mut().find(|w| w.id == worker_id) {
            w.state = FetchWorkerState::Broken;
        }
        self.broken_reasons.push((worker_id, reason));

        if let Some(url) = self.pending_mirrors.pop() {
            let id = self.next_worker_id;
            self.next_worker_id += 1;
            self.workers.push(FetchWorker::new(id, url));
        }
    }

    pub fn record_progress(&mut self, now: Timestamp) {
        self.last_progress = now;
    }

    pub fn is_stalled(&self, now: Timestamp, request_timeout: std::time::Duration) -> bool {
        now.saturating_sub(self.last_progress) >= request_timeout.as_millis() as Timestamp
    }

    fn all_finalized(&self) -> bool {
        self.stripes.iter().all(Stripe::is_fully_finalized)
    }

    fn all_terminal(&self) -> bool {
        self.workers
            .iter()
            .all(|w| matches!(w.state, FetchWorkerState::Broken | FetchWorkerState::Done))
    }

    /// Check whether the engine has reached a terminal outcome (spec
    /// §4.4.7 tail): success if every block is finalized, failure with
    /// the first broken worker's reason if every worker is terminal and
    /// blocks remain outstanding.
    pub fn outcome(&self) -> Option<Result<(), EngineError>> {
        if self.all_finalized() {
            return Some(Ok(()));
        }
        if self.all_terminal() {
            let reason = self
                .broken_reasons
                .first()
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| "worker pool exhausted".to_string());
            return Some(Err(EngineError::AllBroken(reason)));
        }
        None
    }

    /// Whole-file digest verification (spec §4.4.8): recompute over
    /// `read_file` and compare against `expected`.
    pub fn verify_whole_file(
        expected: &Checksum,
        read_file: impl FnOnce() -> std::io::Result<Vec<u8>>,
    ) -> Result<(), EngineError> {
        let bytes = read_file().map_err(|_| EngineError::InvalidChecksum)?;
        if expected.matches(&bytes) {
            Ok(())
        } else {
            Err(EngineError::InvalidChecksum)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes_of(n: usize) -> Vec<Stripe> {
        (0..n)
            .map(|_| Stripe {
                blocks: vec![0],
                states: vec![BlockState::Pending],
            })
            .collect()
    }

    fn engine(n_stripes: usize) -> Engine {
        Engine::new(
            stripes_of(n_stripes),
            vec![Url::parse("http://mirror/file").unwrap()],
            0,
        )
    }

    #[test]
    fn first_worker_claims_stripes_in_order() {
        let mut e = engine(3);
        let w = e.workers()[0].id;
        assert_eq!(e.next_job(w), Some(0));
        assert_eq!(e.next_job(w), Some(1));
        assert_eq!(e.next_job(w), Some(2));
    }

    #[test]
    fn exhausting_stripes_enters_stealing_mode() {
        let mut e = engine(1);
        let w1 = e.workers()[0].id;
        assert_eq!(e.next_job(w1), Some(0));
        // Add a second worker manually to exercise stealing.
        e.workers.push(FetchWorker::new(2, Url::parse("http://mirror2/file").unwrap()));
        let stolen = e.next_job(2);
        assert_eq!(stolen, Some(0));
        let w2 = e.workers.iter().find(|w| w.id == 2).unwrap();
        assert_eq!(w2.pass, 1);
    }

    #[test]
    fn a_worker_error_retains_it_as_broken_and_pulls_in_the_next_mirror() {
        let mut e = Engine::new(
            stripes_of(1),
            vec![
                Url::parse("http://a/file").unwrap(),
                Url::parse("http://b/file").unwrap(),
            ],
            0,
        );
        assert_eq!(e.workers().len(), 1);
        let id = e.workers()[0].id;
        e.on_worker_error(id, "connection refused".into());
        assert_eq!(e.workers().len(), 2);
        assert_eq!(
            e.workers().iter().find(|w| w.id == id).unwrap().state,
            FetchWorkerState::Broken
        );
    }

    #[test]
    fn outcome_is_success_once_every_block_is_finalized() {
        let mut e = engine(1);
        assert!(e.outcome().is_none());
        e.stripes[0].states[0] = BlockState::Finalized;
        assert!(matches!(e.outcome(), Some(Ok(()))));
    }

    #[test]
    fn outcome_raises_the_first_broken_workers_error_once_all_terminal() {
        let mut e = engine(1);
        let id = e.workers()[0].id;
        e.pending_mirrors.clear();
        e.on_worker_error(id, "timed out".into());
        match e.outcome() {
            Some(Err(EngineError::AllBroken(reason))) => assert_eq!(reason, "timed out"),
            other => panic!("expected AllBroken, got {other:?}"),
        }
    }
}
