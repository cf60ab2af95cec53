//! Arena configuration parameters.

use crate::error::ArenaError;
use crate::raw::{Tag, TAG_SIZE};

/// Configuration for a [`TagArena`](crate::TagArena).
///
/// Fixes the byte capacity of the backing buffer and the size of the
/// logical element the arena hands out. Validated at construction; the
/// arena never changes either value afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Total size of the backing buffer in bytes, tags included.
    pub capacity: usize,

    /// Size in bytes of one element.
    ///
    /// `allocate(count)` reserves `count * unit_size` bytes, and the smallest
    /// block a split may leave behind is `unit_size + 2 * TAG_SIZE`.
    pub unit_size: usize,
}

impl ArenaConfig {
    /// Default unit size: one 4-byte integer.
    pub const DEFAULT_UNIT_SIZE: usize = 4;

    /// Default capacity in bytes.
    pub const DEFAULT_CAPACITY: usize = 100;

    /// Create a config for `capacity` bytes of `unit_size`-byte elements.
    pub fn new(capacity: usize, unit_size: usize) -> Self {
        Self {
            capacity,
            unit_size,
        }
    }

    /// Create a config whose unit is one `T`.
    pub fn for_type<T>(capacity: usize) -> Self {
        Self::new(capacity, std::mem::size_of::<T>())
    }

    /// Smallest block that can exist on its own: one unit of payload plus
    /// its header and footer tags.
    pub fn min_block(&self) -> usize {
        self.unit_size.saturating_add(2 * TAG_SIZE)
    }

    /// Payload of the single free block a fresh arena starts with.
    pub fn initial_payload(&self) -> usize {
        self.capacity.saturating_sub(2 * TAG_SIZE)
    }

    /// Check that an arena can be built from this config.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.unit_size == 0 {
            return Err(ArenaError::ZeroUnitSize);
        }
        if self.capacity > Tag::MAX as usize {
            return Err(ArenaError::CapacityOverflow {
                capacity: self.capacity,
            });
        }
        if self.capacity < self.min_block() {
            return Err(ArenaError::InsufficientCapacity {
                capacity: self.capacity,
                min_block: self.min_block(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY, Self::DEFAULT_UNIT_SIZE)
    }
}
