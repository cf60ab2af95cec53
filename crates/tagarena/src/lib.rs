//! Fixed-capacity first-fit arena with in-band boundary tags.
//!
//! A [`TagArena`] manages variably-sized blocks inside one pre-allocated
//! byte buffer. There is no side table: every block records its own size
//! and state in a signed header tag and an identical footer tag, so the
//! buffer can be walked forwards from any header and backwards from any
//! footer. This crate is the memory-management core of a drop-in element
//! allocator; constructing and dropping values in the returned payload is
//! left to the caller.
//!
//! # Layout
//!
//! ```text
//! TagArena
//! ├── buffer: Box<[u8]> (fixed capacity N, tiled by blocks)
//! │   └── [header i32][payload ...][footer i32] × k
//! │       tag > 0 → free, |tag| payload bytes
//! │       tag < 0 → in use, |tag| payload bytes reserved
//! └── ArenaConfig (capacity, unit_size → min_block)
//! ```
//!
//! # Operations
//!
//! - **allocate:** first-fit scan from offset 0; the chosen block is split
//!   unless the leftover would be smaller than `unit_size + 2 * TAG_SIZE`,
//!   in which case the caller is given the whole block.
//! - **deallocate:** flips the tag sign and coalesces with free neighbours
//!   on both sides.
//! - **is_consistent / check:** walk the chain and verify tiling and tag
//!   pairing.
//!
//! # Safety
//!
//! Tags are read and written in place through the primitives in `raw.rs`,
//! the only module allowed to contain `unsafe` code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
pub mod block;
pub mod config;
pub mod error;
pub mod handle;
mod raw;
pub mod stats;

// Public re-exports for the primary API surface.
pub use arena::TagArena;
pub use block::{Block, BlockState, Blocks};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use handle::ArenaOffset;
pub use raw::{Tag, TAG_SIZE};
pub use stats::ArenaStats;
