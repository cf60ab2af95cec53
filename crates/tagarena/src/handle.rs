//! Payload offsets handed out by the arena.
//!
//! An [`ArenaOffset`] names the first payload byte of an in-use block. It
//! is a plain position inside the arena's buffer, never a raw address;
//! callers turn it into a byte slice through
//! [`TagArena::payload_mut`](crate::TagArena::payload_mut) when they are
//! ready to construct a value there.

use std::fmt;

use crate::raw::TAG_SIZE;

/// Position of an allocation's payload within its arena.
///
/// Offsets carry no reference to the arena that issued them. Passing an
/// offset to a different arena, or one that was already deallocated, is
/// detected and rejected with `ArenaError::InvalidPointer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct ArenaOffset(usize);

impl ArenaOffset {
    /// Create an offset from a header position.
    pub(crate) fn from_header(header: usize) -> Self {
        Self(header + TAG_SIZE)
    }

    /// Rebuild an offset from a raw byte position, e.g. one a caller stored
    /// with [`get`](Self::get).
    pub fn from_raw(offset: usize) -> Self {
        Self(offset)
    }

    /// Byte position of the first payload byte.
    pub fn get(self) -> usize {
        self.0
    }

    /// Byte position of the block's header tag, if the offset could have
    /// one in front of it.
    pub(crate) fn header(self) -> Option<usize> {
        self.0.checked_sub(TAG_SIZE)
    }
}

impl fmt::Display for ArenaOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ArenaOffset({})", self.0)
    }
}
