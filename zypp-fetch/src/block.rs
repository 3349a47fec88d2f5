//! The parsed block list driving a multi-range fetch, and the per-block
//! state machine (spec §3.2, §4.4.5).

use zypp_core::Checksum;

/// One addressable byte range of the destination file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub offset: u64,
    pub size: u64,
    pub checksum: Option<Checksum>,
    /// Length, in bytes from the block start, the checksum actually
    /// covers — metalink/zsync allow a "relative digest" shorter than the
    /// full block.
    pub digest_len: Option<u64>,
    /// Trailing pad bytes not covered by the digest.
    pub pad: Option<u64>,
}

impl Block {
    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            offset,
            size,
            checksum: None,
            digest_len: None,
            pad: None,
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    /// The byte range actually covered by the digest, honoring a
    /// relative digest length shorter than the block.
    pub fn digest_range(&self) -> (u64, u64) {
        let len = self.digest_len.unwrap_or(self.size);
        (self.offset, len)
    }
}

/// Parsed block list for one multi-range fetch (spec §3.2 `MediaBlockList`).
#[derive(Clone, Debug, Default)]
pub struct MediaBlockList {
    pub file_size: Option<u64>,
    pub blocks: Vec<Block>,
    pub full_file_checksum: Option<Checksum>,
}

impl MediaBlockList {
    pub fn new(file_size: Option<u64>) -> Self {
        Self {
            file_size,
            blocks: Vec::new(),
            full_file_checksum: None,
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn total_needed(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

/// State of one block within a [`crate::stripe::Stripe`] (spec §3.2,
/// §4.4.5). Invariant 3.3.4: transitions only along
/// `Pending→Fetch→{Finalized,Refetch}`, `Pending→Competing→{Finalized,Refetch}`,
/// `Refetch→Fetch→…`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    Pending,
    Fetch,
    Competing,
    Finalized,
    Refetch,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("illegal block state transition {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: BlockState,
    pub to: BlockState,
}

/// What a worker about to write to a block should do, per spec §4.4.5.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Write bytes; the block moves to this new state.
    Proceed(BlockState),
    /// The block is already finalized: write nothing and self-discard.
    Discard,
}

impl BlockState {
    /// Apply a worker claiming this block to write to it (spec §4.4.5:
    /// "a worker about to write to a block").
    pub fn on_claim(self) -> ClaimOutcome {
        match self {
            BlockState::Finalized => ClaimOutcome::Discard,
            BlockState::Pending => ClaimOutcome::Proceed(BlockState::Fetch),
            BlockState::Fetch | BlockState::Competing => ClaimOutcome::Proceed(BlockState::Competing),
            BlockState::Refetch => ClaimOutcome::Proceed(BlockState::Fetch),
        }
    }

    /// Apply a completed write with the given checksum verdict.
    pub fn on_complete(self, checksum_ok: bool) -> Result<Self, IllegalTransition> {
        match self {
            BlockState::Fetch | BlockState::Competing => {
                Ok(if checksum_ok {
                    BlockState::Finalized
                } else {
                    BlockState::Refetch
                })
            }
            other => Err(IllegalTransition {
                from: other,
                to: if checksum_ok {
                    BlockState::Finalized
                } else {
                    BlockState::Refetch
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proceed(outcome: ClaimOutcome) -> BlockState {
        match outcome {
            ClaimOutcome::Proceed(s) => s,
            ClaimOutcome::Discard => panic!("expected Proceed"),
        }
    }

    #[test]
    fn pending_claim_goes_to_fetch_then_finalized_on_success() {
        let s = proceed(BlockState::Pending.on_claim());
        assert_eq!(s, BlockState::Fetch);
        let s = s.on_complete(true).unwrap();
        assert_eq!(s, BlockState::Finalized);
    }

    #[test]
    fn a_second_claim_on_an_in_flight_block_becomes_competing() {
        let s = proceed(BlockState::Pending.on_claim());
        assert_eq!(s, BlockState::Fetch);
        let s = proceed(s.on_claim());
        assert_eq!(s, BlockState::Competing);
    }

    #[test]
    fn checksum_failure_sends_the_block_to_refetch_and_reclaim_goes_to_fetch() {
        let s = proceed(BlockState::Pending.on_claim());
        let s = s.on_complete(false).unwrap();
        assert_eq!(s, BlockState::Refetch);
        let s = proceed(s.on_claim());
        assert_eq!(s, BlockState::Fetch);
    }

    #[test]
    fn completing_a_pending_block_is_illegal() {
        assert!(BlockState::Pending.on_complete(true).is_err());
    }

    #[test]
    fn claiming_a_finalized_block_discards_instead_of_writing() {
        assert_eq!(BlockState::Finalized.on_claim(), ClaimOutcome::Discard);
    }
}
