//! Occupancy statistics for an arena.
//!
//! [`ArenaStats`] is a point-in-time summary computed by walking the block
//! chain. It is intended for diagnostics and tests, not the hot path.

use crate::block::Block;

/// Snapshot of how an arena's capacity is currently divided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total capacity in bytes, tags included.
    pub capacity: usize,
    /// Number of blocks in the chain.
    pub block_count: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Number of in-use blocks.
    pub used_blocks: usize,
    /// Sum of free payload bytes.
    pub free_bytes: usize,
    /// Sum of in-use payload bytes, slack included.
    pub used_bytes: usize,
    /// Largest single free payload; the biggest request that can succeed.
    pub largest_free: usize,
}

impl ArenaStats {
    /// Accumulate statistics over a block sequence.
    pub(crate) fn collect(capacity: usize, blocks: impl Iterator<Item = Block>) -> Self {
        let mut stats = Self {
            capacity,
            ..Self::default()
        };
        for block in blocks {
            stats.block_count += 1;
            if block.is_free() {
                stats.free_blocks += 1;
                stats.free_bytes += block.payload;
                stats.largest_free = stats.largest_free.max(block.payload);
            } else {
                stats.used_blocks += 1;
                stats.used_bytes += block.payload;
            }
        }
        stats
    }

    /// Bytes spent on boundary tags.
    pub fn tag_overhead(&self) -> usize {
        self.block_count * 2 * crate::raw::TAG_SIZE
    }

    /// Free bytes outside the largest free block, as a fraction of all free
    /// bytes. `0.0` when nothing is free or the free space is one block.
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free as f64 / self.free_bytes as f64
    }

    /// Returns a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} blocks ({} free, {} used), {}/{} bytes free, largest free {}",
            self.block_count,
            self.free_blocks,
            self.used_blocks,
            self.free_bytes,
            self.capacity,
            self.largest_free,
        )
    }
}
