//! Stripe planning: groups a block list's indices into stripes of
//! roughly `default_blksize` bytes and synthesizes a block list when none
//! was supplied (spec §4.4.1).

use zypp_core::config::Defaults;

use crate::block::{Block, BlockState, MediaBlockList};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("no block list and no known file size: cannot plan a multi-range fetch")]
    Unplannable,
}

/// One stripe: a contiguous run of block indices sharing one state
/// vector slot each (spec §3.2).
#[derive(Clone, Debug)]
pub struct Stripe {
    pub blocks: Vec<usize>,
    pub states: Vec<BlockState>,
}

impl Stripe {
    fn new(blocks: Vec<usize>) -> Self {
        let states = vec![BlockState::Pending; blocks.len()];
        Self { blocks, states }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_fully_finalized(&self) -> bool {
        self.states.iter().all(|s| *s == BlockState::Finalized)
    }
}

/// Synthesize an evenly-sized block list when the worker returned a
/// filesize but no explicit block list (spec §4.4.1 step 1).
pub fn synthesize_blocks(file_size: u64, max_conns: usize) -> MediaBlockList {
    let block_size = default_block_size(file_size, max_conns);
    let mut list = MediaBlockList::new(Some(file_size));
    let mut offset = 0;
    while offset < file_size {
        let size = block_size.min(file_size - offset);
        list.push(Block::new(offset, size));
        offset += size;
    }
    list
}

fn default_block_size(total: u64, max_conns: usize) -> u64 {
    let divisor = max_conns.min(10).max(1) as u64;
    (total / divisor).max(Defaults::MIN_BLOCK_SIZE)
}

/// Group a block list's indices into stripes of approximately
/// `default_blksize` bytes each (spec §4.4.1 step 3).
pub fn plan_stripes(list: &MediaBlockList, max_conns: usize) -> Result<Vec<Stripe>, PlanError> {
    if list.blocks.is_empty() {
        return Err(PlanError::Unplannable);
    }
    let total_needed = list.total_needed();
    let target = default_block_size(total_needed, max_conns);

    let mut stripes = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0u64;
    for (index, block) in list.blocks.iter().enumerate() {
        current.push(index);
        current_size += block.size;
        if current_size >= target {
            stripes.push(Stripe::new(std::mem::take(&mut current)));
            current_size = 0;
        }
    }
    if !current.is_empty() {
        stripes.push(Stripe::new(current));
    }
    Ok(stripes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesizing_without_a_block_list_respects_the_minimum_block_size() {
        let list = synthesize_blocks(1_000, 10);
        assert!(list.blocks.iter().all(|b| b.size >= Defaults::MIN_BLOCK_SIZE || b.size == 1_000));
        let total: u64 = list.blocks.iter().map(|b| b.size).sum();
        assert_eq!(total, 1_000);
    }

    #[test]
    fn synthesizing_a_large_file_caps_block_count_near_max_conns() {
        let list = synthesize_blocks(100 * 1024 * 1024, 8);
        // default_blksize = max(100MiB/8, 4KiB) so ~8 blocks expected.
        assert!(list.blocks.len() <= 9);
    }

    #[test]
    fn planning_without_any_blocks_is_an_error() {
        let list = MediaBlockList::new(None);
        assert_eq!(plan_stripes(&list, 4), Err(PlanError::Unplannable));
    }

    #[test]
    fn stripes_cover_every_block_index_exactly_once() {
        let list = synthesize_blocks(10 * 1024 * 1024, 4);
        let stripes = plan_stripes(&list, 4).unwrap();
        let mut seen: Vec<usize> = stripes.iter().flat_map(|s| s.blocks.clone()).collect();
        seen.sort_unstable();
        let expected: Vec<usize> = (0..list.blocks.len()).collect();
        assert_eq!(seen, expected);
    }
}
