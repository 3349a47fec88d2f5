//! Provider scheduler: accepts provide/attach/detach operations, manages
//! worker processes, and implements retry/fail-over, auth coalescing and
//! media attach caching (spec §4.3).

pub mod auth;
pub mod io;
pub mod media;
pub mod queue;
pub mod request;
pub mod scheduler;
pub mod scheme;
pub mod worker;

pub use auth::{AuthCoalescer, AuthDecision, AuthKey, CachedAuth};
pub use io::{Event, Io, IoQueue, WorkerTransport};
pub use media::{AttachedMediaInfo, MediaCache, MediaKey};
pub use queue::{HostBusyCounters, Queue, QueueLimits};
pub use request::{ItemState, ItemStats, ProvideItem, ProvideRequest, RequestIdGenerator};
pub use scheduler::{redirect_is_admissible, Scheduler};
pub use scheme::EffectiveSchemeMap;
pub use worker::{WorkerHandle, WorkerId};
