//! Repository-type probing against a medium (spec §4.5 "Probe").

use zypp_core::{RepoType, Scheme, Url};

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("medium error while probing {path:?}: {reason}")]
    Medium { path: String, reason: String },
}

/// Abstracts the actual filesystem/network access a probe needs to
/// perform, so the probe's decision logic is testable without touching
/// real media (spec §1: metadata transports are external collaborators).
pub trait MediumProbe {
    /// Whether `relative` exists under the medium's root.
    fn path_exists(&self, relative: &str) -> Result<bool, ProbeError>;
    /// Whether the medium's root itself is a local, already-mounted
    /// directory (true for `dir`/mounted schemes once attached).
    fn is_local_dir(&self) -> bool;
}

/// Probe a medium for its repository kind (§4.5 "Probe").
///
/// `dir` schemes whose local path is not (yet) a directory short-circuit
/// to `None` without any I/O.
pub fn probe(url: &Url, medium: &dyn MediumProbe) -> Result<RepoType, ProbeError> {
    if url.scheme() == "dir" && !medium.is_local_dir() {
        return Ok(RepoType::None);
    }

    if medium.path_exists("repodata/repomd.xml")? {
        return Ok(RepoType::Rpmmd);
    }
    if medium.path_exists("content")? {
        return Ok(RepoType::Yast2);
    }

    let scheme = url.classify();
    let plaindir_candidate =
        !matches!(scheme, Scheme::Downloading | Scheme::Plugin) && medium.is_local_dir();
    if plaindir_candidate {
        return Ok(RepoType::Plaindir);
    }

    Ok(RepoType::None)
}
