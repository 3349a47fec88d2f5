//! Abstracts the actual byte transport (the curl-equivalent) behind a
//! trait, generic over a reader/writer pair rather than a concrete socket
//! type. Real HTTP client wiring is infrastructure, not part of the
//! scheduling algorithm under test here (spec §1's "external
//! collaborator" principle, extended to the transport layer).

use zypp_core::Url;

/// One completed (or failed) write to the destination file.
#[derive(Debug)]
pub struct TransferOutcome {
    pub bytes_written: u64,
    pub checksum_ok: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    #[error("transfer timed out")]
    Timeout,
}

/// A single mirror connection capable of fetching byte ranges.
pub trait MirrorTransport {
    /// Fetch `[offset, offset+len)` from `url` and write it at `offset`
    /// in the destination file, returning whether the per-block checksum
    /// (if any) matched.
    fn fetch_range(&mut self, url: &Url, offset: u64, len: u64) -> Result<TransferOutcome, TransferError>;
}
