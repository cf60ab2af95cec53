//! The boundary-tag arena.
//!
//! [`TagArena`] owns one fixed byte buffer that is tiled, at every
//! observable point, by a chain of blocks. Each block carries its payload
//! size twice, as a header tag before the payload and a footer tag after
//! it. The sign of the tag is the block's state:
//!
//! ```text
//! allocate(10) on a fresh 100-byte arena of 4-byte units:
//!
//!   0     4              44    48    52             96   100
//!   ┌─────┬──────────────┬─────┬─────┬──────────────┬─────┐
//!   │ -40 │ 40 B in use  │ -40 │ +44 │ 44 B free    │ +44 │
//!   └─────┴──────────────┴─────┴─────┴──────────────┴─────┘
//!          ▲ returned offset
//! ```
//!
//! Allocation is first-fit from offset 0. A free block is split only when
//! the leftover could host a block of its own (`unit_size + 2 * TAG_SIZE`
//! bytes); otherwise the caller receives the whole block. Deallocation
//! coalesces with free neighbours on both sides, so no two free blocks are
//! ever adjacent once it returns.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::block::{walk, Block, Blocks};
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::handle::ArenaOffset;
use crate::raw::{encode, payload_of, read_tag, write_boundary, Tag, TAG_SIZE};
use crate::stats::ArenaStats;

/// Fixed-capacity first-fit allocator with in-band boundary tags.
///
/// # Example
///
/// ```
/// use tagarena::TagArena;
///
/// let mut arena = TagArena::new(100, 4).unwrap();
/// let a = arena.allocate(10).unwrap();
/// assert_eq!(a.get(), 4);
/// assert_eq!(arena.tag_at(0), Some(-40));
///
/// arena.deallocate(a).unwrap();
/// assert_eq!(arena.tag_at(0), Some(92));
/// assert!(arena.is_consistent());
/// ```
#[derive(Clone)]
pub struct TagArena {
    /// Backing storage, tags and payloads interleaved. Never resized.
    buffer: Box<[u8]>,
    config: ArenaConfig,
}

impl TagArena {
    /// Create an arena of `capacity` bytes for `unit_size`-byte elements.
    pub fn new(capacity: usize, unit_size: usize) -> Result<Self, ArenaError> {
        Self::with_config(ArenaConfig::new(capacity, unit_size))
    }

    /// Create an arena of `capacity` bytes whose unit is one `T`.
    pub fn for_type<T>(capacity: usize) -> Result<Self, ArenaError> {
        Self::with_config(ArenaConfig::for_type::<T>(capacity))
    }

    /// Create an arena from a config.
    ///
    /// Fails with `InsufficientCapacity` if the capacity cannot hold one
    /// minimal block; no buffer is allocated in that case.
    pub fn with_config(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let mut arena = Self {
            buffer: vec![0u8; config.capacity].into_boxed_slice(),
            config,
        };
        arena.reset();
        debug!(
            capacity = config.capacity,
            unit_size = config.unit_size,
            min_block = config.min_block(),
            "created arena"
        );
        Ok(arena)
    }

    /// Return the arena to a single free block spanning the whole buffer.
    ///
    /// Every outstanding offset becomes invalid. Payload bytes are left as
    /// they are.
    pub fn reset(&mut self) {
        let tag = encode(self.config.initial_payload(), false);
        write_boundary(&mut self.buffer, 0, tag);
        debug_assert!(self.is_consistent());
    }

    /// Reserve room for `count` units and return the payload offset.
    ///
    /// The block granted may be larger than `count * unit_size` when the
    /// leftover would be too small to stand alone.
    pub fn allocate(&mut self, count: usize) -> Result<ArenaOffset, ArenaError> {
        if count == 0 {
            return Err(ArenaError::InvalidRequest { requested: 0 });
        }
        match count.checked_mul(self.config.unit_size) {
            Some(bytes) => self.allocate_bytes(bytes),
            None => Err(ArenaError::OutOfMemory {
                requested: usize::MAX,
                largest_free: self.largest_free(),
            }),
        }
    }

    /// Reserve at least `bytes` bytes of payload and return its offset.
    pub fn allocate_bytes(&mut self, bytes: usize) -> Result<ArenaOffset, ArenaError> {
        if bytes == 0 {
            return Err(ArenaError::InvalidRequest { requested: 0 });
        }

        let Some(block) = self.blocks().find(|b| b.is_free() && b.payload >= bytes) else {
            let largest_free = self.largest_free();
            trace!(bytes, largest_free, "no free block fits");
            return Err(ArenaError::OutOfMemory {
                requested: bytes,
                largest_free,
            });
        };

        let remainder = block.payload - bytes;
        if remainder < self.config.min_block() {
            write_boundary(&mut self.buffer, block.header, encode(block.payload, true));
            trace!(
                offset = block.payload_start(),
                bytes,
                granted = block.payload,
                "allocated whole block"
            );
        } else {
            let rest_header = block.header + 2 * TAG_SIZE + bytes;
            let rest_payload = remainder - 2 * TAG_SIZE;
            write_boundary(&mut self.buffer, block.header, encode(bytes, true));
            write_boundary(&mut self.buffer, rest_header, encode(rest_payload, false));
            trace!(
                offset = block.payload_start(),
                bytes,
                rest_header,
                rest_payload,
                "split block"
            );
        }

        debug_assert!(self.is_consistent());
        Ok(ArenaOffset::from_header(block.header))
    }

    /// Release the block at `offset`, merging it with free neighbours.
    ///
    /// Fails with `InvalidPointer`, leaving the arena untouched, if `offset`
    /// is not the payload start of a block currently in use.
    pub fn deallocate(&mut self, offset: ArenaOffset) -> Result<(), ArenaError> {
        let block = self.used_block(offset)?;
        let buf: &mut [u8] = &mut self.buffer;

        let mut header = block.header;
        let mut payload = block.payload;
        write_boundary(buf, header, encode(payload, false));

        let mut merged_left = false;
        if header > 0 {
            if let Some(left) = read_tag(buf, header - TAG_SIZE).filter(|&t| t > 0) {
                let left_payload = payload_of(left);
                header -= left_payload + 2 * TAG_SIZE;
                payload += left_payload + 2 * TAG_SIZE;
                write_boundary(buf, header, encode(payload, false));
                merged_left = true;
            }
        }

        let mut merged_right = false;
        let end = header + payload + 2 * TAG_SIZE;
        if end < buf.len() {
            if let Some(right) = read_tag(buf, end).filter(|&t| t > 0) {
                payload += payload_of(right) + 2 * TAG_SIZE;
                write_boundary(buf, header, encode(payload, false));
                merged_right = true;
            }
        }

        trace!(
            offset = offset.get(),
            freed = block.payload,
            header,
            payload,
            merged_left,
            merged_right,
            "deallocated block"
        );
        debug_assert_eq!(walk(&self.buffer, true), Ok(()));
        Ok(())
    }

    /// Release the block at `offset`, which was allocated for `count` units.
    ///
    /// The tags already carry the block size, so `count` is only checked:
    /// a count larger than the block's payload is rejected as
    /// `InvalidPointer`.
    pub fn deallocate_sized(
        &mut self,
        offset: ArenaOffset,
        count: usize,
    ) -> Result<(), ArenaError> {
        let block = self.used_block(offset)?;
        let fits = count
            .checked_mul(self.config.unit_size)
            .is_some_and(|bytes| bytes <= block.payload);
        if !fits {
            warn!(
                offset = offset.get(),
                count,
                payload = block.payload,
                "deallocation count exceeds block"
            );
            return Err(ArenaError::InvalidPointer {
                offset: offset.get(),
            });
        }
        self.deallocate(offset)
    }

    /// Whether the tag chain tiles the buffer with matching header/footer
    /// pairs.
    pub fn is_consistent(&self) -> bool {
        walk(&self.buffer, false).is_ok()
    }

    /// Validate the tag chain, reporting the first defect.
    ///
    /// Stricter than [`is_consistent`](Self::is_consistent): adjacent free
    /// blocks are reported too.
    pub fn check(&self) -> Result<(), ArenaError> {
        walk(&self.buffer, true).inspect_err(|err| warn!(%err, "arena check failed"))
    }

    /// The payload bytes of the in-use block at `offset`, slack included.
    pub fn payload(&self, offset: ArenaOffset) -> Result<&[u8], ArenaError> {
        let block = self.used_block(offset)?;
        Ok(&self.buffer[block.payload_start()..block.footer()])
    }

    /// Mutable payload bytes of the in-use block at `offset`.
    ///
    /// This is where a caller turns an offset into storage for a value.
    pub fn payload_mut(&mut self, offset: ArenaOffset) -> Result<&mut [u8], ArenaError> {
        let block = self.used_block(offset)?;
        Ok(&mut self.buffer[block.payload_start()..block.footer()])
    }

    /// The tag value stored at byte `index`, or `None` past the end.
    ///
    /// Meaningful only at block boundaries; elsewhere it reads payload
    /// bytes as a tag.
    pub fn tag_at(&self, index: usize) -> Option<Tag> {
        read_tag(&self.buffer, index)
    }

    /// Iterate the block chain in ascending offset order.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(&self.buffer)
    }

    /// Occupancy summary.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats::collect(self.capacity(), self.blocks())
    }

    /// Largest free payload in bytes; `0` if the arena is full.
    pub fn largest_free(&self) -> usize {
        self.blocks()
            .filter(Block::is_free)
            .map(|b| b.payload)
            .max()
            .unwrap_or(0)
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Size of one unit in bytes.
    pub fn unit_size(&self) -> usize {
        self.config.unit_size
    }

    /// Smallest block a split may leave behind.
    pub fn min_block(&self) -> usize {
        self.config.min_block()
    }

    /// The config this arena was built from.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Locate the in-use block whose payload starts at `offset`.
    ///
    /// Walks the chain rather than trusting the bytes in front of `offset`,
    /// so offsets into the middle of a payload are rejected too.
    fn used_block(&self, offset: ArenaOffset) -> Result<Block, ArenaError> {
        let found = offset.header().and_then(|header| {
            self.blocks()
                .take_while(|b| b.header <= header)
                .find(|b| b.header == header)
        });
        match found {
            Some(block) if !block.is_free() => Ok(block),
            _ => {
                warn!(offset = offset.get(), "offset is not an in-use block");
                Err(ArenaError::InvalidPointer {
                    offset: offset.get(),
                })
            }
        }
    }
}

impl fmt::Debug for TagArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("TagArena")
            .field("capacity", &self.config.capacity)
            .field("unit_size", &self.config.unit_size)
            .field("blocks", &stats.block_count)
            .field("free_bytes", &stats.free_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockState;

    fn arena_100() -> TagArena {
        TagArena::new(100, 4).unwrap()
    }

    fn layout(arena: &TagArena) -> Vec<Block> {
        arena.blocks().collect()
    }

    #[test]
    fn new_is_one_free_block() {
        let arena = arena_100();
        assert_eq!(arena.tag_at(0), Some(92));
        assert_eq!(arena.tag_at(96), Some(92));
        assert_eq!(arena.blocks().count(), 1);
        assert!(arena.is_consistent());
    }

    #[test]
    fn new_rejects_capacity_below_min_block() {
        assert_eq!(
            TagArena::new(11, 4).unwrap_err(),
            ArenaError::InsufficientCapacity {
                capacity: 11,
                min_block: 12
            }
        );
    }

    #[test]
    fn new_rejects_zero_unit_size() {
        assert_eq!(TagArena::new(100, 0).unwrap_err(), ArenaError::ZeroUnitSize);
    }

    #[test]
    fn accessors_reflect_config() {
        let arena = TagArena::for_type::<u16>(64).unwrap();
        assert_eq!(arena.unit_size(), 2);
        assert_eq!(arena.capacity(), 64);
        assert_eq!(arena.min_block(), 10);
        assert_eq!(arena.config(), &ArenaConfig::new(64, 2));
    }

    #[test]
    fn zero_tag_header_is_rejected_as_free() {
        let mut arena = arena_100();
        // Zero-payload block at 0, in-use block filling the rest.
        write_boundary(&mut arena.buffer, 0, 0);
        write_boundary(&mut arena.buffer, 8, -84);
        assert!(arena.is_consistent());
        assert_eq!(
            arena.deallocate(ArenaOffset::from_raw(4)),
            Err(ArenaError::InvalidPointer { offset: 4 })
        );
        assert_eq!(
            arena.payload(ArenaOffset::from_raw(4)),
            Err(ArenaError::InvalidPointer { offset: 4 })
        );
        assert_eq!(arena.payload(ArenaOffset::from_raw(12)).unwrap().len(), 84);
        assert_eq!(arena.tag_at(0), Some(0));
    }

    #[test]
    fn zero_count_is_invalid_request() {
        let mut arena = arena_100();
        assert_eq!(
            arena.allocate(0),
            Err(ArenaError::InvalidRequest { requested: 0 })
        );
        assert_eq!(
            arena.allocate_bytes(0),
            Err(ArenaError::InvalidRequest { requested: 0 })
        );
        assert_eq!(arena.tag_at(0), Some(92));
    }

    #[test]
    fn unit_overflow_is_out_of_memory() {
        let mut arena = arena_100();
        assert!(matches!(
            arena.allocate(usize::MAX),
            Err(ArenaError::OutOfMemory {
                largest_free: 92,
                ..
            })
        ));
        assert!(arena.is_consistent());
    }

    #[test]
    fn allocate_bytes_ignores_unit_multiple() {
        let mut arena = arena_100();
        let off = arena.allocate_bytes(7).unwrap();
        assert_eq!(off.get(), 4);
        assert_eq!(arena.tag_at(0), Some(-7));
        assert_eq!(arena.tag_at(11), Some(-7));
        assert_eq!(arena.tag_at(15), Some(77));
        assert_eq!(arena.tag_at(96), Some(77));
        assert!(arena.is_consistent());
    }

    #[test]
    fn exact_fit_takes_whole_block() {
        let mut arena = arena_100();
        let off = arena.allocate(23).unwrap();
        assert_eq!(off.get(), 4);
        assert_eq!(arena.tag_at(0), Some(-92));
        assert_eq!(arena.tag_at(96), Some(-92));
    }

    #[test]
    fn remainder_equal_to_min_block_splits() {
        // 92 - 80 = 12 == min_block: the leftover becomes a 4-byte block.
        let mut arena = arena_100();
        arena.allocate(20).unwrap();
        assert_eq!(arena.tag_at(0), Some(-80));
        assert_eq!(arena.tag_at(84), Some(-80));
        assert_eq!(arena.tag_at(88), Some(4));
        assert_eq!(arena.tag_at(96), Some(4));
    }

    #[test]
    fn deallocate_twice_is_invalid_pointer() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        let _b = arena.allocate(5).unwrap();
        arena.deallocate(a).unwrap();
        let before = layout(&arena);
        assert_eq!(
            arena.deallocate(a),
            Err(ArenaError::InvalidPointer { offset: 4 })
        );
        assert_eq!(layout(&arena), before);
    }

    #[test]
    fn deallocate_rejects_offsets_not_on_a_block() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        for raw in [0, 2, 8, 44, 52, 100, 1000] {
            let err = arena.deallocate(ArenaOffset::from_raw(raw)).unwrap_err();
            assert_eq!(err, ArenaError::InvalidPointer { offset: raw });
        }
        assert_eq!(arena.tag_at(0), Some(-40));
        arena.deallocate(a).unwrap();
    }

    #[test]
    fn deallocate_rejects_fake_header_inside_payload() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        // Forge something that looks like an in-use header inside the payload.
        arena.payload_mut(a).unwrap()[4..8].copy_from_slice(&(-4i32).to_ne_bytes());
        assert_eq!(
            arena.deallocate(ArenaOffset::from_raw(12)),
            Err(ArenaError::InvalidPointer { offset: 12 })
        );
        assert_eq!(arena.check(), Ok(()));
    }

    #[test]
    fn deallocate_sized_checks_count() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        assert_eq!(
            arena.deallocate_sized(a, 11),
            Err(ArenaError::InvalidPointer { offset: 4 })
        );
        arena.deallocate_sized(a, 10).unwrap();
        assert_eq!(arena.tag_at(0), Some(92));
    }

    #[test]
    fn deallocate_sized_accepts_absorbed_slack() {
        let mut arena = arena_100();
        let a = arena.allocate(21).unwrap();
        // Block was granted 92 bytes; 23 units still fit.
        arena.deallocate_sized(a, 23).unwrap();
        assert_eq!(arena.tag_at(0), Some(92));
    }

    #[test]
    fn payload_covers_granted_bytes() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        assert_eq!(arena.payload(a).unwrap().len(), 40);

        // Slack absorbed: 84 bytes requested, 92 granted.
        let mut arena = arena_100();
        let b = arena.allocate(21).unwrap();
        assert_eq!(arena.payload(b).unwrap().len(), 92);
    }

    #[test]
    fn payload_writes_do_not_touch_tags() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        let b = arena.allocate(5).unwrap();
        arena.payload_mut(a).unwrap().fill(0xAB);
        arena.payload_mut(b).unwrap().fill(0xCD);
        assert_eq!(arena.check(), Ok(()));
        assert_eq!(arena.tag_at(44), Some(-40));
        assert_eq!(arena.tag_at(48), Some(-20));
        assert!(arena.payload(a).unwrap().iter().all(|&x| x == 0xAB));
        assert!(arena.payload(b).unwrap().iter().all(|&x| x == 0xCD));
    }

    #[test]
    fn payload_of_free_block_is_rejected() {
        let mut arena = arena_100();
        let a = arena.allocate(10).unwrap();
        arena.deallocate(a).unwrap();
        assert_eq!(
            arena.payload(a),
            Err(ArenaError::InvalidPointer { offset: 4 })
        );
    }

    #[test]
    fn reset_discards_all_blocks() {
        let mut arena = arena_100();
        arena.allocate(3).unwrap();
        arena.allocate(3).unwrap();
        arena.reset();
        assert_eq!(
            layout(&arena),
            vec![Block {
                header: 0,
                payload: 92,
                state: BlockState::Free
            }]
        );
    }

    #[test]
    fn check_reports_adjacent_free_blocks() {
        let mut arena = arena_100();
        write_boundary(&mut arena.buffer, 0, 40);
        write_boundary(&mut arena.buffer, 48, 44);
        assert!(arena.is_consistent());
        assert!(matches!(
            arena.check(),
            Err(ArenaError::Corrupted {
                offset: 48,
                reason: "adjacent free blocks"
            })
        ));
    }

    #[test]
    fn is_consistent_detects_tampering() {
        let mut arena = arena_100();
        crate::raw::write_tag(&mut arena.buffer, 96, 91);
        assert!(!arena.is_consistent());
    }

    #[test]
    fn stats_track_occupancy() {
        let mut arena = arena_100();
        arena.allocate(10).unwrap();
        let stats = arena.stats();
        assert_eq!(stats.block_count, 2);
        assert_eq!(stats.used_bytes, 40);
        assert_eq!(stats.free_bytes, 44);
        assert_eq!(stats.largest_free, 44);
        assert_eq!(arena.largest_free(), 44);
    }

    #[test]
    fn debug_format() {
        let debug = format!("{:?}", arena_100());
        assert!(debug.contains("TagArena"));
        assert!(debug.contains("capacity: 100"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use proptest::sample::Index;

        #[derive(Clone, Debug)]
        enum Op {
            Alloc(usize),
            Free(Index),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1usize..30).prop_map(Op::Alloc),
                any::<Index>().prop_map(Op::Free),
            ]
        }

        fn tiled_len(arena: &TagArena) -> usize {
            arena.blocks().map(|b| b.len()).sum()
        }

        proptest! {
            #[test]
            fn invariants_hold_after_every_op(
                capacity in 12usize..600,
                unit_size in 1usize..9,
                ops in proptest::collection::vec(op(), 1..80),
            ) {
                let Ok(mut arena) = TagArena::new(capacity, unit_size) else {
                    return Ok(());
                };
                let mut live: Vec<ArenaOffset> = Vec::new();
                for op in ops {
                    match op {
                        Op::Alloc(count) => {
                            let before = layout(&arena);
                            match arena.allocate(count) {
                                Ok(off) => {
                                    let granted = arena.payload(off).unwrap().len();
                                    prop_assert!(granted >= count * unit_size);
                                    live.push(off);
                                }
                                Err(ArenaError::OutOfMemory { .. }) => {
                                    prop_assert_eq!(layout(&arena), before);
                                }
                                Err(other) => prop_assert!(false, "unexpected {other}"),
                            }
                        }
                        Op::Free(idx) => {
                            if live.is_empty() {
                                continue;
                            }
                            let off = live.swap_remove(idx.index(live.len()));
                            prop_assert_eq!(arena.deallocate(off), Ok(()));
                            prop_assert_eq!(arena.check(), Ok(()));
                        }
                    }
                    prop_assert!(arena.is_consistent());
                    prop_assert_eq!(tiled_len(&arena), capacity);
                }

                for off in live.drain(..) {
                    prop_assert_eq!(arena.deallocate(off), Ok(()));
                }
                prop_assert_eq!(
                    layout(&arena),
                    vec![Block {
                        header: 0,
                        payload: capacity - 2 * TAG_SIZE,
                        state: BlockState::Free,
                    }]
                );
            }

            #[test]
            fn allocate_then_free_round_trips(
                count in 1usize..40,
                unit_size in 1usize..9,
            ) {
                let mut arena = TagArena::new(400, unit_size).unwrap();
                let before = layout(&arena);
                if let Ok(off) = arena.allocate(count) {
                    arena.deallocate(off).unwrap();
                }
                prop_assert_eq!(layout(&arena), before);
            }

            #[test]
            fn double_free_leaves_arena_unchanged(
                counts in proptest::collection::vec(1usize..8, 1..10),
                victim in any::<Index>(),
            ) {
                let mut arena = TagArena::new(400, 4).unwrap();
                let offs: Vec<_> = counts
                    .iter()
                    .filter_map(|&c| arena.allocate(c).ok())
                    .collect();
                prop_assume!(!offs.is_empty());
                let off = offs[victim.index(offs.len())];
                arena.deallocate(off).unwrap();
                let before = layout(&arena);
                prop_assert_eq!(
                    arena.deallocate(off),
                    Err(ArenaError::InvalidPointer { offset: off.get() })
                );
                prop_assert_eq!(layout(&arena), before);
            }
        }
    }
}
