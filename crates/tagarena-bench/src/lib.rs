//! Workload profiles for benchmarking and stress-testing `tagarena`.
//!
//! Provides deterministic allocation scripts and a driver that replays
//! them against an arena:
//!
//! - [`churn_script`]: seeded mix of allocations and frees
//! - [`run_script`]: replay a script, counting successes and exhaustion
//! - [`reference_arena`]: 64 KiB arena of 8-byte units

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tagarena::{ArenaError, ArenaOffset, TagArena};

/// Capacity of [`reference_arena`] in bytes.
pub const REFERENCE_CAPACITY: usize = 64 * 1024;

/// Unit size of [`reference_arena`] in bytes.
pub const REFERENCE_UNIT_SIZE: usize = 8;

/// One step of an allocation script.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Allocate this many units.
    Alloc(usize),
    /// Free a live allocation, chosen by this index modulo the live count.
    /// A no-op when nothing is live.
    Free(usize),
}

/// Result of replaying a script.
#[derive(Debug, Default)]
pub struct ScriptOutcome {
    /// Successful allocations.
    pub allocated: usize,
    /// Successful frees.
    pub freed: usize,
    /// Allocations rejected with `OutOfMemory`.
    pub out_of_memory: usize,
    /// Offsets still live at the end of the script, in allocation order
    /// modulo swap-removal.
    pub live: Vec<ArenaOffset>,
}

/// Build a 64 KiB arena of 8-byte units.
pub fn reference_arena() -> TagArena {
    TagArena::new(REFERENCE_CAPACITY, REFERENCE_UNIT_SIZE)
        .expect("reference capacity holds a minimal block")
}

/// Generate `len` ops from `seed`: roughly 60% allocations of
/// `1..=max_units` units, 40% frees.
///
/// The same seed always yields the same script.
pub fn churn_script(seed: u64, len: usize, max_units: usize) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let max_units = max_units.max(1) as u32;
    (0..len)
        .map(|_| {
            if rng.next_u32() % 10 < 6 {
                Op::Alloc((rng.next_u32() % max_units) as usize + 1)
            } else {
                Op::Free(rng.next_u32() as usize)
            }
        })
        .collect()
}

/// Replay `script` against `arena`.
///
/// `OutOfMemory` is counted and skipped; any other error aborts the replay
/// and is returned, since a well-formed script never provokes one.
pub fn run_script(arena: &mut TagArena, script: &[Op]) -> Result<ScriptOutcome, ArenaError> {
    let mut outcome = ScriptOutcome::default();
    for &op in script {
        match op {
            Op::Alloc(count) => match arena.allocate(count) {
                Ok(offset) => {
                    outcome.allocated += 1;
                    outcome.live.push(offset);
                }
                Err(ArenaError::OutOfMemory { .. }) => outcome.out_of_memory += 1,
                Err(err) => return Err(err),
            },
            Op::Free(pick) => {
                if outcome.live.is_empty() {
                    continue;
                }
                let offset = outcome.live.swap_remove(pick % outcome.live.len());
                arena.deallocate(offset)?;
                outcome.freed += 1;
            }
        }
    }
    Ok(outcome)
}

/// Free every offset still live in `outcome`.
pub fn drain(arena: &mut TagArena, outcome: &mut ScriptOutcome) -> Result<(), ArenaError> {
    for offset in outcome.live.drain(..) {
        arena.deallocate(offset)?;
        outcome.freed += 1;
    }
    Ok(())
}
