//! Where a repository's cached metadata lives on disk (spec §4.5/§4.6).

use std::path::{Path, PathBuf};

use zypp_core::{Alias, RepoInfo};

/// The cache-root paths a refresh or cache build operates under, plus the
/// repo being refreshed (spec §4.5 "a `RefreshContext` holding the
/// RepoInfo, the RepoManagerOptions").
#[derive(Clone, Debug)]
pub struct RefreshContext {
    repo: RepoInfo,
    raw_cache_root: PathBuf,
    solv_cache_root: PathBuf,
}

impl RefreshContext {
    pub fn new(repo: RepoInfo, raw_cache_root: impl Into<PathBuf>, solv_cache_root: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            raw_cache_root: raw_cache_root.into(),
            solv_cache_root: solv_cache_root.into(),
        }
    }

    pub fn repo(&self) -> &RepoInfo {
        &self.repo
    }

    fn alias_dir(root: &Path, alias: &Alias) -> PathBuf {
        root.join(alias.to_string())
    }

    /// Directory holding the repository's raw (un-indexed) metadata.
    pub fn raw_cache_dir(&self) -> PathBuf {
        Self::alias_dir(&self.raw_cache_root, self.repo.alias())
    }

    /// Directory holding the repository's compiled solv cache.
    pub fn solv_cache_dir(&self) -> PathBuf {
        Self::alias_dir(&self.solv_cache_root, self.repo.alias())
    }

    /// The raw-cache cookie file (spec §6.1), one per repository.
    pub fn cookie_path(&self) -> PathBuf {
        self.raw_cache_dir().join("cookie")
    }

    /// The solv cache's own cookie, used by [`crate::cache::build_cache`]'s
    /// `cacheStatus == raw_status` short-circuit (spec §4.6 step 3).
    pub fn solv_cookie_path(&self) -> PathBuf {
        self.solv_cache_dir().join("cookie")
    }

    pub fn solv_file_path(&self) -> PathBuf {
        self.solv_cache_dir().join("solv")
    }

    pub fn solv_idx_path(&self) -> PathBuf {
        self.solv_cache_dir().join("solv.idx")
    }

    pub fn raw_cache_root(&self) -> &Path {
        &self.raw_cache_root
    }
}
