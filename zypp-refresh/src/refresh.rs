//! Metadata refresh workflow: `checkIfToRefresh` decision logic plus the
//! mirror-iterating download workflow around it (spec §4.5).

use std::fs;
use std::path::Path;

use log::warn;

use zypp_core::{History, RepoStatus, RepoType, Scheme, Timestamp, Url};

use crate::context::RefreshContext;
use crate::cookie;
use crate::policy::{RefreshDecision, RefreshPolicy};
use crate::probe::ProbeError;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Terminal: no further mirror is tried (spec §4.5 "mirror strategy").
    #[error("no permission to write raw cache: {0}")]
    NoPermission(String),
    #[error("probing the medium failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("downloading metadata failed: {0}")]
    Download(String),
}

impl FetchError {
    fn is_terminal(&self) -> bool {
        matches!(self, FetchError::NoPermission(_))
    }
}

/// Everything about an origin's remote side that the refresh workflow
/// needs but cannot compute locally: probing its type, reading its
/// current status and downloading its metadata into a directory. The XML
/// parsers and transport that implement this for real schemes are
/// external collaborators (spec §1).
pub trait MetadataSource {
    fn probe(&self, url: &Url) -> Result<RepoType, FetchError>;
    fn status(&self, url: &Url, repo_type: RepoType) -> Result<RepoStatus, FetchError>;
    fn download(&self, url: &Url, repo_type: RepoType, dest: &Path) -> Result<(), FetchError>;
}

/// The local-only portion of `checkIfToRefresh` (spec §4.5 step 3, up to
/// but not including the remote status comparison). Returns `None` when a
/// remote probe/status check is still required to decide.
#[allow(clippy::too_many_arguments)]
pub fn check_if_to_refresh_local(
    old_status: &RepoStatus,
    policy: RefreshPolicy,
    scheme: Scheme,
    now: Timestamp,
    refresh_delay_minutes: u32,
    raw_cache_status: &RepoStatus,
    solv_cache_status: &RepoStatus,
) -> Option<RefreshDecision> {
    if old_status.is_empty() {
        return Some(RefreshDecision::RefreshNeeded);
    }
    if scheme.is_volatile_mountable() {
        return Some(RefreshDecision::RepoUpToDate);
    }
    if policy == RefreshPolicy::Forced {
        return Some(RefreshDecision::RefreshNeeded);
    }

    let effective_policy = if scheme.is_mountable() {
        RefreshPolicy::IfNeededIgnoreDelay
    } else {
        policy
    };

    if effective_policy != RefreshPolicy::IfNeededIgnoreDelay {
        if now < old_status.mtime() {
            warn!(target: "refresh", "raw cache cookie mtime is in the future");
        }
        let elapsed_minutes = now.saturating_sub(old_status.mtime()) / 60_000;
        if elapsed_minutes < refresh_delay_minutes as Timestamp {
            if raw_cache_status == solv_cache_status {
                return Some(RefreshDecision::RepoCheckDelayed);
            }
            return None;
        }
    }

    None
}

/// The remainder of `checkIfToRefresh`: compare a freshly probed remote
/// status against the old one (spec §4.5 step 3, final bullet).
pub fn check_remote_status(old_status: &RepoStatus, remote_status: &RepoStatus) -> RefreshDecision {
    if old_status == remote_status {
        RefreshDecision::RepoUpToDate
    } else {
        RefreshDecision::RefreshNeeded
    }
}

/// Decide whether `url` needs a refresh and, if so, perform it by
/// downloading into a temporary directory and atomically replacing the
/// raw cache (spec §4.5 steps 3–4). One origin URL; the caller drives
/// mirror fail-over via [`refresh`].
fn refresh_one(
    ctx: &RefreshContext,
    source: &dyn MetadataSource,
    url: &Url,
    policy: RefreshPolicy,
    now: Timestamp,
) -> Result<RefreshDecision, FetchError> {
    let old_status = cookie::read(&ctx.cookie_path()).unwrap_or_else(|_| RepoStatus::empty());
    let raw_status = old_status.clone();
    let solv_status = old_status.clone();

    let local = check_if_to_refresh_local(
        &old_status,
        policy,
        url.classify(),
        now,
        ctx.repo().refresh_delay_minutes,
        &raw_status,
        &solv_status,
    );

    let decision = match local {
        Some(d) => d,
        None => {
            let repo_type = if ctx.repo().repo_type() == RepoType::None {
                source.probe(url)?
            } else {
                ctx.repo().repo_type()
            };
            let remote_status = source.status(url, repo_type)?;
            check_remote_status(&old_status, &remote_status)
        }
    };

    if decision == RefreshDecision::RefreshNeeded {
        download_and_replace(ctx, source, url, now)?;
    } else if decision == RefreshDecision::RepoUpToDate && !old_status.is_empty() {
        // Nothing to download, but the cookie's mtime must still advance
        // so `metadataStatus().mtime` stays monotonic across repeated
        // up-to-date checks (spec §4.5).
        let touched = RepoStatus::new(old_status.fingerprint(), now);
        if let Err(e) = cookie::write(&ctx.cookie_path(), &touched) {
            warn!(target: "refresh", "failed to touch raw cache cookie: {e}");
        }
    }

    Ok(decision)
}

fn download_and_replace(
    ctx: &RefreshContext,
    source: &dyn MetadataSource,
    url: &Url,
    now: Timestamp,
) -> Result<(), FetchError> {
    verify_write_permission(ctx.raw_cache_root())?;

    let repo_type = source.probe(url)?;
    let tmp = tempfile::tempdir_in(ctx.raw_cache_root())
        .map_err(|e| FetchError::Download(e.to_string()))?;
    source.download(url, repo_type, tmp.path())?;

    let fingerprint = source.status(url, repo_type)?;
    cookie::write(&tmp.path().join("cookie"), &RepoStatus::new(fingerprint.fingerprint(), now))
        .map_err(|e| FetchError::Download(e.to_string()))?;

    let dest = ctx.raw_cache_dir();
    if dest.exists() {
        fs::remove_dir_all(&dest).map_err(|e| FetchError::Download(e.to_string()))?;
    }
    let tmp_path = tmp.into_path();
    fs::rename(&tmp_path, &dest).map_err(|e| FetchError::Download(e.to_string()))?;
    Ok(())
}

fn verify_write_permission(raw_cache_root: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(raw_cache_root)
        .map_err(|e| FetchError::NoPermission(e.to_string()))?;
    let probe = raw_cache_root.join(".zypp-refresh-write-check");
    fs::write(&probe, b"").map_err(|e| FetchError::NoPermission(e.to_string()))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}

/// Run the refresh workflow across every mirror of `repo`'s first origin,
/// preserving the first exception and appending subsequent ones to its
/// history, stopping early on a [`FetchError::NoPermission`] (spec §4.5
/// "mirror strategy").
pub fn refresh(
    ctx: &RefreshContext,
    source: &dyn MetadataSource,
    policy: RefreshPolicy,
    now: Timestamp,
) -> Result<RefreshDecision, History<FetchError>> {
    let origin = match ctx.repo().origins().first() {
        Some(o) => o,
        None => {
            return Err(History::new(FetchError::Download(
                "repository has no origin".to_string(),
            )))
        }
    };

    let mut history: Option<History<FetchError>> = None;
    for url in origin.iter() {
        match refresh_one(ctx, source, url, policy, now) {
            Ok(decision) => return Ok(decision),
            Err(e) if e.is_terminal() => return Err(History::new(e)),
            Err(e) => match &mut history {
                Some(h) => h.push(&e),
                None => history = Some(History::new(e)),
            },
        }
    }

    Err(history.unwrap_or_else(|| History::new(FetchError::Download("no mirrors tried".to_string()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use zypp_core::{Alias, MirroredOrigin};

    struct FakeSource {
        statuses: RefCell<HashMap<String, RepoStatus>>,
        fail_urls: Vec<String>,
    }

    impl MetadataSource for FakeSource {
        fn probe(&self, url: &Url) -> Result<RepoType, FetchError> {
            if self.fail_urls.contains(&url.as_str().to_string()) {
                return Err(FetchError::Download("unreachable".to_string()));
            }
            Ok(RepoType::Rpmmd)
        }

        fn status(&self, url: &Url, _repo_type: RepoType) -> Result<RepoStatus, FetchError> {
            Ok(self
                .statuses
                .borrow()
                .get(url.as_str())
                .cloned()
                .unwrap_or_else(|| RepoStatus::new("remote-fingerprint", 1)))
        }

        fn download(&self, _url: &Url, _repo_type: RepoType, dest: &Path) -> Result<(), FetchError> {
            fs::write(dest.join("repomd.xml"), b"<repomd/>").map_err(|e| FetchError::Download(e.to_string()))
        }
    }

    fn ctx(raw_root: &Path) -> RefreshContext {
        let repo = RepoInfoBuilder::new();
        RefreshContext::new(repo, raw_root, raw_root.join("solv"))
    }

    struct RepoInfoBuilder;
    impl RepoInfoBuilder {
        fn new() -> zypp_core::RepoInfo {
            zypp_core::RepoInfo::new(
                Alias::new("factory"),
                vec![MirroredOrigin::new(
                    Url::parse("http://example.org/repo").unwrap(),
                    [],
                )],
            )
        }
    }

    #[test]
    fn empty_cookie_always_needs_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let source = FakeSource {
            statuses: RefCell::new(HashMap::new()),
            fail_urls: Vec::new(),
        };
        let decision = refresh(&c, &source, RefreshPolicy::IfNeeded, 10_000).unwrap();
        assert_eq!(decision, RefreshDecision::RefreshNeeded);
        assert!(c.cookie_path().exists());
    }

    #[test]
    fn matching_remote_status_reports_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        fs::create_dir_all(c.raw_cache_dir()).unwrap();
        cookie::write(&c.cookie_path(), &RepoStatus::new("same", 1)).unwrap();

        let mut statuses = HashMap::new();
        statuses.insert("http://example.org/repo".to_string(), RepoStatus::new("same", 1));
        let source = FakeSource {
            statuses: RefCell::new(statuses),
            fail_urls: Vec::new(),
        };

        let now = 1 + 3 * 60 * 60_000; // well past the delay, local mountable forces none
        let decision = refresh(&c, &source, RefreshPolicy::IfNeeded, now).unwrap();
        assert_eq!(decision, RefreshDecision::RepoUpToDate);
    }

    #[test]
    fn up_to_date_refreshes_advance_the_cookie_mtime_monotonically() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        fs::create_dir_all(c.raw_cache_dir()).unwrap();
        cookie::write(&c.cookie_path(), &RepoStatus::new("same", 1)).unwrap();

        let mut statuses = HashMap::new();
        statuses.insert("http://example.org/repo".to_string(), RepoStatus::new("same", 1));
        let source = FakeSource {
            statuses: RefCell::new(statuses),
            fail_urls: Vec::new(),
        };

        let past_delay = 3 * 60 * 60_000;
        let first_now = 1 + past_delay;
        let decision = refresh(&c, &source, RefreshPolicy::IfNeeded, first_now).unwrap();
        assert_eq!(decision, RefreshDecision::RepoUpToDate);
        let after_first = cookie::read(&c.cookie_path()).unwrap();
        assert_eq!(after_first.mtime(), first_now);

        let second_now = first_now + past_delay;
        let decision = refresh(&c, &source, RefreshPolicy::IfNeeded, second_now).unwrap();
        assert_eq!(decision, RefreshDecision::RepoUpToDate);
        let after_second = cookie::read(&c.cookie_path()).unwrap();
        assert_eq!(after_second.mtime(), second_now);
        assert!(after_second.mtime() >= after_first.mtime());
    }

    #[test]
    fn forced_policy_skips_the_delay_check() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        fs::create_dir_all(c.raw_cache_dir()).unwrap();
        cookie::write(&c.cookie_path(), &RepoStatus::new("same", 1)).unwrap();

        let source = FakeSource {
            statuses: RefCell::new(HashMap::new()),
            fail_urls: Vec::new(),
        };
        let decision = refresh(&c, &source, RefreshPolicy::Forced, 2).unwrap();
        assert_eq!(decision, RefreshDecision::RefreshNeeded);
    }

    #[test]
    fn recent_cookie_within_delay_reports_check_delayed() {
        let old = RepoStatus::new("same", 1_000);
        let decision = check_if_to_refresh_local(
            &old,
            RefreshPolicy::IfNeeded,
            Scheme::Downloading,
            1_000 + 1_000, // 1 second later, well within a 90 minute delay
            90,
            &old,
            &old,
        );
        assert_eq!(decision, Some(RefreshDecision::RepoCheckDelayed));
    }

    #[test]
    fn volatile_mounted_scheme_is_always_up_to_date() {
        let old = RepoStatus::new("same", 1);
        let decision = check_if_to_refresh_local(
            &old,
            RefreshPolicy::IfNeeded,
            Scheme::VolatileMountable,
            999_999,
            90,
            &old,
            &old,
        );
        assert_eq!(decision, Some(RefreshDecision::RepoUpToDate));
    }
}
