//! Size-class header encoding.
//!
//! Every buffer is one block laid out as
//!
//! ```text
//! [len][alloc][tag] payload ... \0
//!              ^    ^
//!              |    payload pointer handed to `Sds`
//!              tag byte: low 3 bits = class, high 5 bits = inline length
//! ```
//!
//! `len` and `alloc` are native-endian, unaligned integers whose width depends
//! on the class (absent for [`SizeClass::Inline`]). All pointer arithmetic on
//! headers lives in this module; the rest of the crate only goes through the
//! accessors below.
//!
//! An inline block is allocated for exactly its length. When the length later
//! shrinks, the tag switches to [`INLINE_SHRUNK`] and the original payload
//! size is kept in the byte right after the terminator, so the block can still
//! be released with its true size.

use core::ptr::NonNull;

const CLASS_MASK: u8 = 0b111;
const CLASS_BITS: u32 = 3;
/// Inline tag whose block is larger than the current length.
const INLINE_SHRUNK: u8 = 5;

/// Header encodings ordered by the magnitude they can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum SizeClass {
    /// Length packed in the tag byte, no spare capacity (lengths 0..=31).
    Inline = 0,
    /// 8-bit length and allocation fields.
    U8 = 1,
    /// 16-bit length and allocation fields.
    U16 = 2,
    /// 32-bit length and allocation fields.
    U32 = 3,
    /// 64-bit length and allocation fields.
    U64 = 4,
}

impl SizeClass {
    /// The smallest class able to represent `size` bytes.
    ///
    /// On targets where `usize` is 32 bits wide, [`SizeClass::U32`] is the
    /// ceiling.
    #[must_use]
    pub const fn for_size(size: usize) -> Self {
        if size < 1 << 5 {
            Self::Inline
        } else if size < 1 << 8 {
            Self::U8
        } else if size < 1 << 16 {
            Self::U16
        } else if (size as u64) < 1 << 32 {
            Self::U32
        } else {
            Self::U64
        }
    }

    /// Bytes occupied by the header, tag included.
    #[must_use]
    pub const fn header_len(self) -> usize {
        1 + 2 * self.field_width()
    }

    /// Largest length (and allocation) this class can record.
    #[must_use]
    pub const fn max_alloc(self) -> usize {
        match self {
            Self::Inline => (1 << 5) - 1,
            Self::U8 => u8::MAX as usize,
            Self::U16 => u16::MAX as usize,
            #[allow(clippy::cast_possible_truncation)]
            Self::U32 => {
                if usize::BITS > 32 {
                    u32::MAX as usize
                } else {
                    usize::MAX
                }
            }
            Self::U64 => usize::MAX,
        }
    }

    const fn field_width(self) -> usize {
        match self {
            Self::Inline => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    fn from_tag(tag: u8) -> Self {
        match tag & CLASS_MASK {
            0 | INLINE_SHRUNK => Self::Inline,
            1 => Self::U8,
            2 => Self::U16,
            3 => Self::U32,
            4 => Self::U64,
            other => unreachable!("corrupt size class tag {other}"),
        }
    }
}

#[inline]
fn tag_ptr(s: NonNull<u8>) -> *mut u8 {
    s.as_ptr().wrapping_sub(1)
}

/// # Safety
///
/// `p` must be valid for reads of `width` bytes.
#[inline]
#[allow(clippy::cast_possible_truncation)]
unsafe fn read_field(p: *const u8, width: usize) -> usize {
    // SAFETY: forwarded to the caller; every read is unaligned.
    unsafe {
        match width {
            1 => usize::from(p.read()),
            2 => usize::from(p.cast::<u16>().read_unaligned()),
            4 => p.cast::<u32>().read_unaligned() as usize,
            _ => p.cast::<u64>().read_unaligned() as usize,
        }
    }
}

/// # Safety
///
/// `p` must be valid for writes of `width` bytes.
#[inline]
#[allow(clippy::cast_possible_truncation)]
unsafe fn write_field(p: *mut u8, width: usize, value: usize) {
    // SAFETY: forwarded to the caller; every write is unaligned.
    unsafe {
        match width {
            1 => p.write(value as u8),
            2 => p.cast::<u16>().write_unaligned(value as u16),
            4 => p.cast::<u32>().write_unaligned(value as u32),
            _ => p.cast::<u64>().write_unaligned(value as u64),
        }
    }
}

/// Reads the class tag of a payload.
///
/// # Safety
///
/// `s` must be the payload pointer of a live buffer.
#[inline]
pub(crate) unsafe fn get_class(s: NonNull<u8>) -> SizeClass {
    // SAFETY: the tag byte directly precedes the payload.
    SizeClass::from_tag(unsafe { tag_ptr(s).read() })
}

/// Logical length of a payload.
///
/// # Safety
///
/// `s` must be the payload pointer of a live buffer.
#[inline]
pub(crate) unsafe fn get_len(s: NonNull<u8>) -> usize {
    // SAFETY: forwarded to the caller.
    let tag = unsafe { tag_ptr(s).read() };
    let class = SizeClass::from_tag(tag);
    if class == SizeClass::Inline {
        return usize::from(tag >> CLASS_BITS);
    }
    let w = class.field_width();
    // SAFETY: the header holds `len` at `2 * w + 1` bytes before the payload.
    unsafe { read_field(s.as_ptr().wrapping_sub(1 + 2 * w), w) }
}

/// Payload bytes usable for content, excluding the terminator.
///
/// # Safety
///
/// `s` must be the payload pointer of a live buffer.
#[inline]
pub(crate) unsafe fn get_alloc(s: NonNull<u8>) -> usize {
    // SAFETY: forwarded to the caller.
    let class = unsafe { get_class(s) };
    if class == SizeClass::Inline {
        // SAFETY: forwarded to the caller.
        return unsafe { get_len(s) };
    }
    let w = class.field_width();
    // SAFETY: the header holds `alloc` at `w + 1` bytes before the payload.
    unsafe { read_field(s.as_ptr().wrapping_sub(1 + w), w) }
}

/// Payload bytes the block was sized for. Differs from [`get_alloc`] only for
/// inline buffers that were shortened.
///
/// # Safety
///
/// `s` must be the payload pointer of a live buffer.
#[inline]
pub(crate) unsafe fn get_block_payload(s: NonNull<u8>) -> usize {
    // SAFETY: forwarded to the caller.
    let tag = unsafe { tag_ptr(s).read() };
    if tag & CLASS_MASK != INLINE_SHRUNK {
        // SAFETY: forwarded to the caller.
        return unsafe { get_alloc(s) };
    }
    let len = usize::from(tag >> CLASS_BITS);
    // SAFETY: a shrunk inline block ends at least one byte past the terminator.
    usize::from(unsafe { s.as_ptr().add(len + 1).read() })
}

/// # Safety
///
/// `s` must be an inline payload whose block holds at least `len` payload
/// bytes, and the byte after the current terminator must not have been
/// overwritten since the last length change.
#[inline]
#[allow(clippy::cast_possible_truncation)]
unsafe fn set_inline_len(s: NonNull<u8>, len: usize) {
    // SAFETY: forwarded to the caller.
    let block = unsafe { get_block_payload(s) };
    debug_assert!(len <= block);
    let mut tag = (len as u8) << CLASS_BITS;
    if len < block {
        tag |= INLINE_SHRUNK;
        // SAFETY: `len + 1 <= block`, still inside the payload area.
        unsafe { s.as_ptr().add(len + 1).write(block as u8) };
    }
    // SAFETY: forwarded to the caller.
    unsafe { tag_ptr(s).write(tag) };
}

/// # Safety
///
/// `s` must be the payload pointer of a live buffer whose class can record
/// `len`. For inline buffers `len` must not exceed the block's payload size.
#[inline]
pub(crate) unsafe fn set_len(s: NonNull<u8>, len: usize) {
    // SAFETY: forwarded to the caller.
    let class = unsafe { get_class(s) };
    debug_assert!(len <= class.max_alloc());
    if class == SizeClass::Inline {
        // SAFETY: forwarded to the caller.
        unsafe { set_inline_len(s, len) };
        return;
    }
    let w = class.field_width();
    // SAFETY: see `len`.
    unsafe { write_field(s.as_ptr().wrapping_sub(1 + 2 * w), w, len) };
}

/// # Safety
///
/// `s` must be the payload pointer of a live buffer whose class can record
/// `alloc`. Inline buffers carry no allocation field and ignore the call.
#[inline]
pub(crate) unsafe fn set_alloc(s: NonNull<u8>, alloc: usize) {
    // SAFETY: forwarded to the caller.
    let class = unsafe { get_class(s) };
    debug_assert!(alloc <= class.max_alloc());
    if class == SizeClass::Inline {
        return;
    }
    let w = class.field_width();
    // SAFETY: see `alloc`.
    unsafe { write_field(s.as_ptr().wrapping_sub(1 + w), w, alloc) };
}

/// Writes a complete header in front of a fresh payload.
///
/// # Safety
///
/// `s` must be preceded by `class.header_len()` writable bytes belonging to
/// the same block, and `len <= alloc <= class.max_alloc()`.
#[inline]
pub(crate) unsafe fn init(s: NonNull<u8>, class: SizeClass, len: usize, alloc: usize) {
    debug_assert!(len <= alloc && alloc <= class.max_alloc());
    debug_assert!(class != SizeClass::Inline || len == alloc);
    if class == SizeClass::Inline {
        #[allow(clippy::cast_possible_truncation)]
        let tag = (len as u8) << CLASS_BITS;
        // SAFETY: the tag byte is inside the header.
        unsafe { tag_ptr(s).write(tag) };
        return;
    }
    // SAFETY: the tag byte is inside the header.
    unsafe { tag_ptr(s).write(class as u8) };
    // SAFETY: the class is now recorded, the remaining fields are in bounds.
    unsafe {
        set_len(s, len);
        set_alloc(s, alloc);
    }
}
