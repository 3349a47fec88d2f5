//! Multi-range fetch engine: activated when a downloading worker returns
//! a metalink or zsync file for a request (spec §4.4).

pub mod block;
pub mod dns;
pub mod engine;
pub mod stripe;
pub mod transport;
pub mod worker;

pub use block::{Block, BlockState, ClaimOutcome, MediaBlockList};
pub use dns::{PrecheckHandle, PrecheckResult};
pub use engine::{Engine, EngineError};
pub use stripe::{plan_stripes, synthesize_blocks, PlanError, Stripe};
pub use transport::{MirrorTransport, TransferError, TransferOutcome};
pub use worker::{backoff_seconds, best_candidate, worker_rate_cap, FetchWorker, FetchWorkerState, WorkerId};
