//! Boundary-tag read/write primitives.
//!
//! The only `unsafe` in the crate lives here: tags are reinterpreted
//! in place from the arena's byte buffer. Every other module reads and
//! writes tags exclusively through these functions.
//!
//! Tags may sit at any byte offset (units need not be a multiple of the
//! tag width), so all accesses are unaligned.

#![allow(unsafe_code)]

/// In-band boundary tag: positive = free payload bytes, negative = in-use
/// payload bytes.
pub type Tag = i32;

/// Width of one boundary tag in bytes.
pub const TAG_SIZE: usize = std::mem::size_of::<Tag>();

/// Read the tag stored at byte `at`, or `None` if it would run past the
/// end of `buf`.
#[inline]
pub(crate) fn read_tag(buf: &[u8], at: usize) -> Option<Tag> {
    let end = at.checked_add(TAG_SIZE)?;
    if end > buf.len() {
        return None;
    }
    // SAFETY: `at..at + TAG_SIZE` lies within `buf` (checked above), and
    // `read_unaligned` has no alignment requirement. Every bit pattern is a
    // valid `i32`.
    Some(unsafe { buf.as_ptr().add(at).cast::<Tag>().read_unaligned() })
}

/// Store `tag` at byte `at`.
///
/// # Panics
///
/// Panics if `at + TAG_SIZE` exceeds `buf.len()`. Callers only write at
/// offsets derived from a well-formed tag chain.
#[inline]
pub(crate) fn write_tag(buf: &mut [u8], at: usize, tag: Tag) {
    assert!(
        at.checked_add(TAG_SIZE).is_some_and(|end| end <= buf.len()),
        "tag write at {at} out of bounds for {} byte arena",
        buf.len()
    );
    // SAFETY: `at..at + TAG_SIZE` lies within `buf` (asserted above), the
    // exclusive borrow rules out aliasing, and `write_unaligned` has no
    // alignment requirement.
    unsafe { buf.as_mut_ptr().add(at).cast::<Tag>().write_unaligned(tag) }
}

/// Encode a payload size and state as a tag.
///
/// # Panics
///
/// Panics if `payload` exceeds `Tag::MAX`; arena capacities are validated
/// against that bound, so no block payload can.
#[inline]
pub(crate) fn encode(payload: usize, in_use: bool) -> Tag {
    let magnitude = Tag::try_from(payload).expect("payload bounded by validated capacity");
    if in_use {
        -magnitude
    } else {
        magnitude
    }
}

/// Payload size in bytes encoded by `tag`, regardless of state.
#[inline]
pub(crate) fn payload_of(tag: Tag) -> usize {
    tag.unsigned_abs() as usize
}

/// Offset of the footer of the block whose header is at `header`.
#[inline]
pub(crate) fn footer_of(header: usize, payload: usize) -> usize {
    header + TAG_SIZE + payload
}

/// Write `tag` as both header (at `header`) and matching footer of a block.
#[inline]
pub(crate) fn write_boundary(buf: &mut [u8], header: usize, tag: Tag) {
    write_tag(buf, header, tag);
    write_tag(buf, footer_of(header, payload_of(tag)), tag);
}
