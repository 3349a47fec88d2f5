//! Refresh and cache-build policies (spec §4.5, §4.6).

/// When to re-download metadata, passed by the caller into a refresh
/// (spec §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
    IfNeeded,
    IfNeededIgnoreDelay,
    Forced,
}

/// Whether a solver-cache build may skip rebuilding when the cookie
/// already matches (spec §4.6 step 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBuildPolicy {
    BuildIfNeeded,
    BuildForced,
}

/// Outcome of [`crate::refresh::check_if_to_refresh`] (spec §4.5 step 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshDecision {
    RefreshNeeded,
    RepoUpToDate,
    RepoCheckDelayed,
}
