//! Block views derived from the tag sequence.
//!
//! Blocks are not stored anywhere: a block is whatever the header tag at
//! its offset says it is. [`Blocks`] walks the chain from offset 0, and the
//! crate-internal `walk` validates it.

use crate::error::ArenaError;
use crate::raw::{footer_of, payload_of, read_tag, TAG_SIZE};

/// Whether a block's payload is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    /// Non-negative tag: available for allocation.
    Free,
    /// Negative tag: reserved by a caller.
    Used,
}

/// A read-only view of one block in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
    /// Byte offset of the header tag.
    pub header: usize,
    /// Payload size in bytes, excluding both tags.
    pub payload: usize,
    /// Free or in use.
    pub state: BlockState,
}

impl Block {
    /// Total footprint, tags included.
    pub fn len(&self) -> usize {
        self.payload + 2 * TAG_SIZE
    }

    /// Never true for a block in a well-formed arena; provided for symmetry
    /// with [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of the footer tag.
    pub fn footer(&self) -> usize {
        footer_of(self.header, self.payload)
    }

    /// Byte offset just past the footer: the next block's header.
    pub fn end(&self) -> usize {
        self.header + self.len()
    }

    /// Offset of the first payload byte.
    pub fn payload_start(&self) -> usize {
        self.header + TAG_SIZE
    }

    /// Whether the block is free.
    pub fn is_free(&self) -> bool {
        self.state == BlockState::Free
    }
}

/// Iterator over the blocks of an arena, in ascending offset order.
///
/// Stops early at the first block whose tags are malformed (footer out of
/// range or not matching the header).
pub struct Blocks<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Blocks<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }
}

impl Iterator for Blocks<'_> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        if self.cursor >= self.buf.len() {
            return None;
        }
        let block = decode(self.buf, self.cursor).ok()?;
        self.cursor = block.end();
        Some(block)
    }
}

/// Decode the block whose header sits at `header`, checking its footer.
fn decode(buf: &[u8], header: usize) -> Result<Block, ArenaError> {
    let corrupted = |reason| ArenaError::Corrupted {
        offset: header,
        reason,
    };
    let tag = read_tag(buf, header).ok_or(corrupted("header tag runs past end of arena"))?;
    let payload = payload_of(tag);
    let footer = header
        .checked_add(TAG_SIZE + payload)
        .ok_or(corrupted("block size overflows"))?;
    match read_tag(buf, footer) {
        None => Err(corrupted("footer tag runs past end of arena")),
        Some(f) if f != tag => Err(corrupted("header/footer mismatch")),
        Some(_) => Ok(Block {
            header,
            payload,
            state: if tag >= 0 {
                BlockState::Free
            } else {
                BlockState::Used
            },
        }),
    }
}

/// Validate the whole tag chain.
///
/// Checks tiling and header/footer pairing. With `require_coalesced`, two
/// adjacent free blocks are also reported.
pub(crate) fn walk(buf: &[u8], require_coalesced: bool) -> Result<(), ArenaError> {
    let mut cursor = 0;
    let mut prev_free = false;
    while cursor < buf.len() {
        let block = decode(buf, cursor)?;
        if require_coalesced && prev_free && block.is_free() {
            return Err(ArenaError::Corrupted {
                offset: cursor,
                reason: "adjacent free blocks",
            });
        }
        prev_free = block.is_free();
        cursor = block.end();
    }
    // A well-formed footer always ends at or before the buffer end.
    if cursor != buf.len() {
        return Err(ArenaError::Corrupted {
            offset: cursor,
            reason: "blocks overshoot end of arena",
        });
    }
    Ok(())
}
