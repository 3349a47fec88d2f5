//! Raw-cache cookie file: a two-line `fingerprint\nmtime` status fingerprint
//! used to decide whether cached metadata is still valid (spec §6.1,
//! invariant 3.3.3).

use std::fs;
use std::io;
use std::path::Path;

use zypp_core::{RepoStatus, Timestamp};

#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("cookie file is malformed: {0:?}")]
    Malformed(String),
    #[error("cookie mtime is not a valid timestamp: {0:?}")]
    BadTimestamp(String),
}

/// Read a cookie file, returning [`RepoStatus::empty`] if it does not
/// exist (spec §4.5 step 2: an absent raw cache has `oldStatus.empty()`).
pub fn read(path: &Path) -> io::Result<RepoStatus> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RepoStatus::empty()),
        Err(e) => return Err(e),
    };
    parse(&contents)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

fn parse(contents: &str) -> Result<RepoStatus, CookieError> {
    let mut lines = contents.lines();
    let fingerprint = lines
        .next()
        .ok_or_else(|| CookieError::Malformed(contents.to_string()))?;
    if fingerprint.is_empty() {
        return Ok(RepoStatus::empty());
    }
    let mtime_line = lines
        .next()
        .ok_or_else(|| CookieError::Malformed(contents.to_string()))?;
    let mtime: Timestamp = mtime_line
        .trim()
        .parse()
        .map_err(|_| CookieError::BadTimestamp(mtime_line.to_string()))?;
    Ok(RepoStatus::new(fingerprint, mtime))
}

/// Write a cookie file, creating its parent directory if needed. Callers
/// writing into a raw cache that's about to be atomically replaced should
/// write the cookie inside the temporary directory before the rename, so
/// the replace stays a single atomic step.
pub fn write(path: &Path, status: &RepoStatus) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = format!("{}\n{}\n", status.fingerprint(), status.mtime());
    fs::write(path, body)
}
