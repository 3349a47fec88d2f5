//! Solver cache build: turns a raw metadata cache into a solv file via the
//! external `repo2solv` converter (spec §4.6).

use std::fs;
use std::path::{Path, PathBuf};

use zypp_core::{History, RepoStatus, RepoType};

use crate::context::RefreshContext;
use crate::cookie;
use crate::policy::CacheBuildPolicy;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("could not create cache root {path:?}: {source}")]
    CacheRootUnavailable { path: PathBuf, source: std::io::Error },
    #[error("repository kind is not one repo2solv understands")]
    UnknownType,
    #[error("repo2solv exited with status {status}: {stderr}")]
    ConverterFailed {
        status: i32,
        stderr: String,
        /// Prior attempts against other raw-cache probes, oldest first.
        history: Vec<String>,
    },
    #[error("could not touch solv.idx: {0}")]
    Index(#[source] std::io::Error),
}

/// Builds the `repo2solv` argument vector (spec §4.6 step 5). `-o
/// <solvfile>` must come first; `-X` always follows; the source is either
/// `-R <mountpoint>/<repo-path>` for a plaindir repo or the bare raw-cache
/// product directory otherwise.
#[derive(Clone, Debug)]
pub struct ConverterInvocation {
    solvfile: PathBuf,
    source_dir: PathBuf,
    plaindir_mountpoint: Option<PathBuf>,
}

impl ConverterInvocation {
    pub fn new(solvfile: PathBuf, source_dir: PathBuf) -> Self {
        Self {
            solvfile,
            source_dir,
            plaindir_mountpoint: None,
        }
    }

    pub fn plaindir(mut self, mountpoint: PathBuf) -> Self {
        self.plaindir_mountpoint = Some(mountpoint);
        self
    }

    /// The full `repo2solv` argument vector, in order.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            self.solvfile.display().to_string(),
            "-X".to_string(),
        ];
        match &self.plaindir_mountpoint {
            Some(mountpoint) => {
                args.push("-R".to_string());
                let repo_path = self.source_dir.to_string_lossy();
                let repo_path = repo_path.trim_start_matches('/');
                args.push(format!("{}/{repo_path}", mountpoint.display()));
            }
            None => args.push(self.source_dir.display().to_string()),
        }
        args
    }
}

/// Runs an already-built [`ConverterInvocation`] and reports its exit
/// status and stderr. A real build invokes the external `repo2solv`
/// binary; tests substitute a fake.
pub trait Converter {
    fn run(&self, invocation: &ConverterInvocation) -> ConverterOutcome;
}

pub struct ConverterOutcome {
    pub status: i32,
    pub stderr: String,
}

/// Recompute and persist the solv content-digest index alongside a solv
/// file. The concrete digest algorithm and on-disk layout are the
/// converter's own format, external to this crate (spec §1); callers pass
/// in whatever produces that format.
pub trait SolvIndexer {
    fn regenerate(&self, solvfile: &Path, idx_path: &Path) -> std::io::Result<()>;
}

fn ensure_cache_root(dir: &Path) -> Result<(), CacheError> {
    fs::create_dir_all(dir).map_err(|source| CacheError::CacheRootUnavailable {
        path: dir.to_path_buf(),
        source,
    })
}

/// Build (or skip rebuilding) the solv cache for one repository (spec
/// §4.6 steps 1–6). `raw_status` is the already-computed raw-cache status
/// (callers run [`crate::refresh::refresh`] first if it is empty, per
/// step 2's "recurse into refresh").
pub fn build_cache(
    ctx: &RefreshContext,
    raw_status: &RepoStatus,
    repo_type: RepoType,
    policy: CacheBuildPolicy,
    converter: &dyn Converter,
    indexer: &dyn SolvIndexer,
) -> Result<(), History<CacheError>> {
    ensure_cache_root(&ctx.solv_cache_dir()).map_err(History::new)?;

    let cache_status = cookie::read(&ctx.solv_cookie_path())
        .unwrap_or_else(|_| RepoStatus::empty());

    if policy == CacheBuildPolicy::BuildIfNeeded && &cache_status == raw_status {
        if !ctx.solv_idx_path().exists() {
            indexer
                .regenerate(&ctx.solv_file_path(), &ctx.solv_idx_path())
                .map_err(CacheError::Index)
                .map_err(History::new)?;
        }
        return Ok(());
    }

    if repo_type == RepoType::None {
        return Err(History::new(CacheError::UnknownType));
    }

    let invocation = match repo_type {
        RepoType::Plaindir => ConverterInvocation::new(ctx.solv_file_path(), ctx.repo().path().into())
            .plaindir(ctx.raw_cache_dir()),
        RepoType::Rpmmd | RepoType::Yast2 => {
            ConverterInvocation::new(ctx.solv_file_path(), ctx.raw_cache_dir())
        }
        RepoType::None => unreachable!(),
    };

    let outcome = converter.run(&invocation);
    if outcome.status != 0 {
        let _ = fs::remove_file(ctx.solv_file_path());
        return Err(History::new(CacheError::ConverterFailed {
            status: outcome.status,
            stderr: outcome.stderr,
            history: invocation.args(),
        }));
    }

    indexer
        .regenerate(&ctx.solv_file_path(), &ctx.solv_idx_path())
        .map_err(CacheError::Index)
        .map_err(History::new)?;
    cookie::write(&ctx.solv_cookie_path(), raw_status).map_err(CacheError::Index).map_err(History::new)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zypp_core::{Alias, MirroredOrigin, Url};

    fn ctx(root: &Path) -> RefreshContext {
        let repo = zypp_core::RepoInfo::new(
            Alias::new("factory"),
            vec![MirroredOrigin::new(Url::parse("http://example.org/repo").unwrap(), [])],
        );
        RefreshContext::new(repo, root.join("raw"), root.join("solv"))
    }

    struct FakeConverter {
        status: i32,
        stderr: &'static str,
    }
    impl Converter for FakeConverter {
        fn run(&self, _invocation: &ConverterInvocation) -> ConverterOutcome {
            ConverterOutcome {
                status: self.status,
                stderr: self.stderr.to_string(),
            }
        }
    }

    struct FakeIndexer;
    impl SolvIndexer for FakeIndexer {
        fn regenerate(&self, solvfile: &Path, idx_path: &Path) -> std::io::Result<()> {
            fs::write(solvfile, b"solv")?;
            fs::write(idx_path, b"idx")
        }
    }

    #[test]
    fn converter_args_put_o_first_and_x_second() {
        let invocation = ConverterInvocation::new(PathBuf::from("/cache/factory/solv"), PathBuf::from("/raw/factory"));
        assert_eq!(
            invocation.args(),
            vec!["-o", "/cache/factory/solv", "-X", "/raw/factory"]
        );
    }

    #[test]
    fn plaindir_invocation_uses_r_with_mountpoint_and_repo_path() {
        let invocation = ConverterInvocation::new(PathBuf::from("/cache/factory/solv"), PathBuf::from("repo/sub"))
            .plaindir(PathBuf::from("/media/mnt"));
        assert_eq!(
            invocation.args(),
            vec!["-o", "/cache/factory/solv", "-X", "-R", "/media/mnt/repo/sub"]
        );
    }

    #[test]
    fn successful_build_writes_solv_cookie_matching_raw_status() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let raw_status = RepoStatus::new("abc", 1);
        let converter = FakeConverter { status: 0, stderr: "" };
        build_cache(&c, &raw_status, RepoType::Rpmmd, CacheBuildPolicy::BuildIfNeeded, &converter, &FakeIndexer).unwrap();
        let saved = cookie::read(&c.solv_cookie_path()).unwrap();
        assert_eq!(saved, raw_status);
        assert!(c.solv_idx_path().exists());
    }

    #[test]
    fn matching_cookie_skips_rebuild_under_build_if_needed() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let raw_status = RepoStatus::new("abc", 1);
        fs::create_dir_all(c.solv_cache_dir()).unwrap();
        cookie::write(&c.solv_cookie_path(), &raw_status).unwrap();
        fs::write(c.solv_idx_path(), b"idx").unwrap();

        struct PanicsOnRun;
        impl Converter for PanicsOnRun {
            fn run(&self, _: &ConverterInvocation) -> ConverterOutcome {
                panic!("should not rebuild when the cookie matches");
            }
        }
        build_cache(&c, &raw_status, RepoType::Rpmmd, CacheBuildPolicy::BuildIfNeeded, &PanicsOnRun, &FakeIndexer).unwrap();
    }

    #[test]
    fn nonzero_exit_deletes_partial_solv_and_raises_with_command_line_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        fs::create_dir_all(c.solv_cache_dir()).unwrap();
        fs::write(c.solv_file_path(), b"partial").unwrap();

        let converter = FakeConverter {
            status: 1,
            stderr: "bad metadata",
        };
        let err = build_cache(
            &c,
            &RepoStatus::new("abc", 1),
            RepoType::Rpmmd,
            CacheBuildPolicy::BuildForced,
            &converter,
            &FakeIndexer,
        )
        .unwrap_err();
        assert!(!c.solv_file_path().exists());
        match err.cause() {
            CacheError::ConverterFailed { status, stderr, .. } => {
                assert_eq!(*status, 1);
                assert_eq!(stderr, "bad metadata");
            }
            other => panic!("expected ConverterFailed, got {other:?}"),
        }
    }

    #[test]
    fn unknown_repo_type_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let c = ctx(dir.path());
        let converter = FakeConverter { status: 0, stderr: "" };
        let err = build_cache(
            &c,
            &RepoStatus::new("abc", 1),
            RepoType::None,
            CacheBuildPolicy::BuildForced,
            &converter,
            &FakeIndexer,
        )
        .unwrap_err();
        assert!(matches!(err.cause(), CacheError::UnknownType));
    }
}
