//! Arena-specific error types.

use std::error::Error;
use std::fmt;

/// Errors that can occur during arena operations.
///
/// Every failing call leaves the arena's tag sequence exactly as it was
/// before the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The capacity cannot host even one minimal block
    /// (`unit_size + 2 * TAG_SIZE` bytes).
    InsufficientCapacity {
        /// Requested capacity in bytes.
        capacity: usize,
        /// Smallest block the arena's unit size allows, in bytes.
        min_block: usize,
    },
    /// The capacity is larger than a boundary tag can describe.
    CapacityOverflow {
        /// Requested capacity in bytes.
        capacity: usize,
    },
    /// The arena was configured with a zero-byte unit.
    ZeroUnitSize,
    /// `allocate` was called with a zero unit or byte count.
    InvalidRequest {
        /// The rejected request.
        requested: usize,
    },
    /// No free block is large enough to satisfy the request.
    OutOfMemory {
        /// Number of payload bytes requested.
        requested: usize,
        /// Largest free payload currently available, in bytes.
        largest_free: usize,
    },
    /// The offset does not name the payload of a block currently in use
    /// (double free, foreign offset, or size mismatch).
    InvalidPointer {
        /// The rejected payload offset.
        offset: usize,
    },
    /// The tag sequence is malformed. Only reported by `TagArena::check`.
    Corrupted {
        /// Byte offset of the block header where the defect was found.
        offset: usize,
        /// What is wrong at that offset.
        reason: &'static str,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCapacity {
                capacity,
                min_block,
            } => {
                write!(
                    f,
                    "insufficient capacity: {capacity} bytes cannot hold a minimal block of {min_block} bytes"
                )
            }
            Self::CapacityOverflow { capacity } => {
                write!(
                    f,
                    "capacity {capacity} bytes exceeds the largest size a boundary tag can encode ({})",
                    i32::MAX
                )
            }
            Self::ZeroUnitSize => write!(f, "unit size must be at least one byte"),
            Self::InvalidRequest { requested } => {
                write!(f, "invalid allocation request: {requested}")
            }
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::InvalidPointer { offset } => {
                write!(f, "offset {offset} is not an in-use block")
            }
            Self::Corrupted { offset, reason } => {
                write!(f, "arena corrupted at offset {offset}: {reason}")
            }
        }
    }
}

impl Error for ArenaError {}
