//! Shared data model for the zypp repository-management and provisioning
//! core: identifiers, checksums, repository status, and the error-history
//! combinator used by every higher layer.

pub mod alias;
pub mod checksum;
pub mod config;
pub mod edition;
pub mod error;
pub mod origin;
pub mod repo;
pub mod service;
pub mod status;
pub mod url;

pub use alias::Alias;
pub use checksum::{Checksum, ChecksumAlgorithm};
pub use edition::Edition;
pub use error::{ErrorKind, History};
pub use origin::MirroredOrigin;
pub use repo::{GpgCheck, RepoInfo, RepoType};
pub use service::{ServiceInfo, ServiceType};
pub use status::RepoStatus;
pub use url::{Scheme, Url};

/// Milliseconds since the Unix epoch, matching the convention of
/// `localtime::LocalTime::now().as_millis()`.
pub type Timestamp = u64;

/// Produce the current time as a [`Timestamp`].
pub fn now() -> Timestamp {
    localtime::LocalTime::now().as_millis()
}
