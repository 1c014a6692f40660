//! The buffer handle, its constructors and the growth engine.
//!
//! Overview
//! - An [`Sds`] owns one block holding `[header][payload][\0]`. The header
//!   width is chosen by [`SizeClass`] so that short strings pay one to three
//!   bytes of bookkeeping while huge ones can still record 64-bit sizes.
//! - The handle stores the payload pointer. Any operation that needs more room
//!   may move the payload to a new block (or, when the header width changes,
//!   to a new offset inside a new block); the handle is updated in place, so
//!   `&mut self` stands for "consumes the old handle and returns the new one".
//!
//! Invariants (checked by [`Sds::assert_invariants`] in tests)
//! - `len <= allocated <= size_class.max_alloc()` and the block is exactly
//!   `header_len + allocated + 1` bytes.
//! - The byte at offset `len` is always `0`, regardless of embedded zeros.
//! - [`SizeClass::Inline`] buffers have no spare capacity. Empty buffers and
//!   buffers built with spare room never use it.
//! - Growth never lowers the size class; only [`Sds::shrink_to_fit`] does.

use core::{
    alloc::Layout,
    borrow::{Borrow, BorrowMut},
    cmp::Ordering,
    ffi::CStr,
    fmt,
    hash::{Hash, Hasher},
    mem::MaybeUninit,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
    slice,
};

use bstr::BStr;

use crate::{
    allocator::{Heap, RawAlloc},
    error::AllocError,
    header::{self, SizeClass},
    options::GrowthMode,
    tracing_compat::trace,
};

/// A growable, binary-safe, always NUL-terminated byte string.
///
/// # Examples
///
/// ```
/// use tinsds::{Sds, SizeClass};
///
/// let mut s = Sds::from_bytes(b"hello")?;
/// s.append(b"\0world")?;
/// assert_eq!(s.len(), 11);
/// assert_eq!(s.as_bytes_with_nul().last(), Some(&0));
/// assert!(s.size_class() >= SizeClass::U8);
/// # Ok::<(), tinsds::AllocError>(())
/// ```
pub struct Sds<A: RawAlloc = Heap> {
    ptr: NonNull<u8>,
    alloc: A,
}

// SAFETY: an `Sds` uniquely owns its block, like `Vec<u8>`.
unsafe impl<A: RawAlloc + Send> Send for Sds<A> {}
// SAFETY: shared references only read the block.
unsafe impl<A: RawAlloc + Sync> Sync for Sds<A> {}

#[derive(Clone, Copy)]
enum Init<'a> {
    Bytes(&'a [u8]),
    Zeroed(usize),
}

impl Init<'_> {
    fn len(self) -> usize {
        match self {
            Init::Bytes(bytes) => bytes.len(),
            Init::Zeroed(len) => len,
        }
    }
}

/// Diverges the way `Vec` does when an infallible API cannot allocate.
#[cold]
pub(crate) fn alloc_failure(err: AllocError) -> ! {
    match err {
        AllocError::CapacityOverflow => panic!("capacity overflow"),
        AllocError::OutOfMemory { size } => alloc::alloc::handle_alloc_error(
            Layout::from_size_align(size, 1).unwrap_or(Layout::new::<u8>()),
        ),
    }
}

#[inline]
fn block_size(class: SizeClass, alloc: usize) -> Result<usize, AllocError> {
    class
        .header_len()
        .checked_add(alloc)
        .and_then(|n| n.checked_add(1))
        .ok_or(AllocError::CapacityOverflow)
}

impl Sds<Heap> {
    /// Creates an empty buffer ready for appending.
    ///
    /// The buffer starts with an 8-bit header and no spare room; the first
    /// append grows it greedily. Use [`Sds::with_capacity`] to reserve room up
    /// front.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn new() -> Result<Self, AllocError> {
        Self::new_in(Heap)
    }

    /// Creates a buffer holding a copy of `bytes`, with no spare capacity.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AllocError> {
        Self::from_bytes_in(bytes, Heap)
    }

    /// Creates a buffer from a NUL-terminated C string (terminator excluded).
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_cstr(s: &CStr) -> Result<Self, AllocError> {
        Self::from_cstr_in(s, Heap)
    }

    /// Creates a buffer of `len` zero bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn zeroed(len: usize) -> Result<Self, AllocError> {
        Self::zeroed_in(len, Heap)
    }

    /// Creates an empty buffer with room for `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        Self::with_capacity_in(capacity, Heap)
    }
}

impl<A: RawAlloc> Sds<A> {
    /// Like [`Sds::new`] with an explicit allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn new_in(alloc: A) -> Result<Self, AllocError> {
        Self::make_in(Init::Bytes(&[]), 0, alloc)
    }

    /// Like [`Sds::from_bytes`] with an explicit allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_bytes_in(bytes: &[u8], alloc: A) -> Result<Self, AllocError> {
        Self::make_in(Init::Bytes(bytes), bytes.len(), alloc)
    }

    /// Like [`Sds::from_cstr`] with an explicit allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn from_cstr_in(s: &CStr, alloc: A) -> Result<Self, AllocError> {
        Self::from_bytes_in(s.to_bytes(), alloc)
    }

    /// Like [`Sds::zeroed`] with an explicit allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn zeroed_in(len: usize, alloc: A) -> Result<Self, AllocError> {
        Self::make_in(Init::Zeroed(len), len, alloc)
    }

    /// Like [`Sds::with_capacity`] with an explicit allocator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        Self::make_in(Init::Bytes(&[]), capacity, alloc)
    }

    fn make_in(init: Init<'_>, capacity: usize, alloc: A) -> Result<Self, AllocError> {
        let len = init.len();
        debug_assert!(len <= capacity);
        let mut class = SizeClass::for_size(capacity);
        // Inline headers cannot remember spare room, so a buffer created for
        // appending would migrate on its very first append.
        if class == SizeClass::Inline && (len == 0 || capacity > len) {
            class = SizeClass::U8;
        }
        let size = block_size(class, capacity)?;
        let base = alloc.allocate(size)?;
        // SAFETY: the block is `header_len + capacity + 1` bytes long, so the
        // payload and its terminator are in bounds.
        let ptr = unsafe { base.add(class.header_len()) };
        unsafe {
            header::init(ptr, class, len, capacity);
            match init {
                Init::Bytes(bytes) => {
                    ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), len);
                }
                Init::Zeroed(_) => ptr.as_ptr().write_bytes(0, len),
            }
            ptr.as_ptr().add(len).write(0);
        }
        Ok(Self { ptr, alloc })
    }

    /// Duplicates the buffer: same content, at least the same spare capacity.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails.
    pub fn try_clone(&self) -> Result<Self, AllocError>
    where
        A: Clone,
    {
        Self::make_in(
            Init::Bytes(self.as_bytes()),
            self.allocated(),
            self.alloc.clone(),
        )
    }

    /// Releases the buffer. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }

    /// The allocator backing this buffer.
    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    // --------------------------------------------------------------------------------------------
    // Inspection
    // --------------------------------------------------------------------------------------------

    /// Logical length in bytes, embedded zeros included.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        // SAFETY: `ptr` is the payload of the block we own.
        unsafe { header::get_len(self.ptr) }
    }

    /// Returns `true` if the buffer holds no bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload bytes available in the block: `len() + spare_capacity()`.
    #[inline]
    #[must_use]
    pub fn allocated(&self) -> usize {
        // SAFETY: `ptr` is the payload of the block we own.
        unsafe { header::get_alloc(self.ptr) }
    }

    /// Bytes that can be appended without reallocating.
    #[inline]
    #[must_use]
    pub fn spare_capacity(&self) -> usize {
        self.allocated() - self.len()
    }

    /// Size accounted to the buffer: header, [`allocated`](Sds::allocated)
    /// payload bytes and terminator.
    #[inline]
    #[must_use]
    pub fn alloc_size(&self) -> usize {
        self.size_class().header_len() + self.allocated() + 1
    }

    /// Size of the block actually held. Larger than [`Sds::alloc_size`] only
    /// for a shortened inline buffer, which keeps its original block.
    #[inline]
    pub(crate) fn block_size(&self) -> usize {
        // SAFETY: `ptr` is the payload of the block we own.
        let payload = unsafe { header::get_block_payload(self.ptr) };
        self.size_class().header_len() + payload + 1
    }

    /// The header encoding currently in use.
    #[inline]
    #[must_use]
    pub fn size_class(&self) -> SizeClass {
        // SAFETY: `ptr` is the payload of the block we own.
        unsafe { header::get_class(self.ptr) }
    }

    /// The logical content.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: the first `len` payload bytes are initialized.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// The logical content, mutably. The terminator is not reachable.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        // SAFETY: the first `len` payload bytes are initialized and uniquely
        // borrowed through `&mut self`.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), len) }
    }

    /// The logical content followed by the terminator.
    #[inline]
    #[must_use]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        // SAFETY: the terminator at `len` is always written.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len() + 1) }
    }

    /// The content as a [`BStr`] for display and byte-string utilities.
    #[inline]
    #[must_use]
    pub fn as_bstr(&self) -> &BStr {
        BStr::new(self.as_bytes())
    }

    /// Address of the payload. Changes whenever the buffer is relocated.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable address of the payload. Writes are only valid within
    /// `[0, allocated())`; the terminator and anything after it belong to the
    /// buffer.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The spare room after the content, for callers that fill it directly
    /// (for example as the destination of a read) and then commit the bytes
    /// with [`Sds::increment_len`].
    #[inline]
    pub fn spare_capacity_mut(&mut self) -> &mut [MaybeUninit<u8>] {
        let len = self.len();
        let spare = self.allocated() - len;
        // SAFETY: `[len, allocated)` lies inside the block and is uniquely
        // borrowed; `MaybeUninit` tolerates uninitialized bytes.
        unsafe {
            slice::from_raw_parts_mut(
                self.ptr.as_ptr().add(len).cast::<MaybeUninit<u8>>(),
                spare,
            )
        }
    }

    /// Lexicographic byte comparison; on a shared prefix the shorter buffer
    /// orders first.
    #[must_use]
    pub fn compare<B: RawAlloc>(&self, other: &Sds<B>) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }

    // --------------------------------------------------------------------------------------------
    // Growth engine
    // --------------------------------------------------------------------------------------------

    /// Ensures at least `additional` bytes can be appended without another
    /// reallocation, over-allocating per [`GrowthMode::Greedy`].
    ///
    /// Does nothing when enough spare room exists.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails; the buffer is unchanged.
    pub fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        self.reserve_with(additional, GrowthMode::Greedy)
    }

    /// Like [`Sds::reserve`] but allocates exactly the required size.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails; the buffer is unchanged.
    pub fn reserve_exact(&mut self, additional: usize) -> Result<(), AllocError> {
        self.reserve_with(additional, GrowthMode::Exact)
    }

    /// Ensures room for `additional` more bytes using the given growth mode.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails; the buffer is unchanged.
    pub fn reserve_with(&mut self, additional: usize, mode: GrowthMode) -> Result<(), AllocError> {
        if self.spare_capacity() >= additional {
            return Ok(());
        }
        let required = self
            .len()
            .checked_add(additional)
            .ok_or(AllocError::CapacityOverflow)?;
        let target = mode.target(required);
        let class = SizeClass::for_size(target)
            .max(self.size_class())
            .max(SizeClass::U8);
        self.relocate(class, target)
    }

    /// Releases all spare capacity, moving to the smallest header able to
    /// record the current length.
    ///
    /// A buffer whose block is already tight is left untouched (same address).
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if the allocator fails; the buffer is unchanged.
    pub fn shrink_to_fit(&mut self) -> Result<(), AllocError> {
        if self.block_size() == self.alloc_size() && self.spare_capacity() == 0 {
            return Ok(());
        }
        let len = self.len();
        let class = SizeClass::for_size(len).min(self.size_class());
        self.relocate(class, len)
    }

    /// Moves the content into a block of `class` with `alloc` payload bytes.
    fn relocate(&mut self, class: SizeClass, alloc: usize) -> Result<(), AllocError> {
        let len = self.len();
        let old_class = self.size_class();
        let old_size = self.block_size();
        debug_assert!(len <= alloc && alloc <= class.max_alloc());

        let new_size = block_size(class, alloc)?;
        if class == old_class {
            // SAFETY: the block is live and exactly `old_size` bytes long. The
            // allocator keeps `min(old_size, new_size)` bytes, which covers
            // header, content and terminator.
            let base = unsafe { self.alloc.reallocate(self.base(), old_size, new_size)? };
            // SAFETY: the header width did not change, so the payload sits at
            // the same offset and `alloc` fits the class checked above.
            self.ptr = unsafe { base.add(class.header_len()) };
            unsafe { header::init(self.ptr, class, len, alloc) };
            trace!(?class, len, old_size, new_size, "reallocated buffer");
        } else {
            let base = self.alloc.allocate(new_size)?;
            // SAFETY: the new block holds `header_len + alloc + 1 >= len + 1`
            // payload bytes after the header.
            let ptr = unsafe { base.add(class.header_len()) };
            unsafe {
                ptr::copy_nonoverlapping(self.ptr.as_ptr(), ptr.as_ptr(), len + 1);
                self.alloc.deallocate(self.base(), old_size);
                header::init(ptr, class, len, alloc);
            }
            self.ptr = ptr;
            trace!(from = ?old_class, to = ?class, len, new_size, "migrated size class");
        }
        Ok(())
    }

    /// Start of the block.
    #[inline]
    fn base(&self) -> NonNull<u8> {
        // SAFETY: the header precedes the payload inside the same block.
        unsafe { self.ptr.sub(self.size_class().header_len()) }
    }

    /// Sets the length and writes the terminator.
    ///
    /// # Safety
    ///
    /// `len <= self.allocated()` and the first `len` payload bytes must be
    /// initialized. Nothing past the current terminator may have been written
    /// since the last length change.
    #[inline]
    pub(crate) unsafe fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.allocated());
        // SAFETY: forwarded to the caller.
        unsafe {
            header::set_len(self.ptr, len);
            self.ptr.as_ptr().add(len).write(0);
        }
    }

    /// Adjusts the length by `delta` without copying, then rewrites the
    /// terminator. A negative `delta` right-trims.
    ///
    /// Used after writing into [`Sds::spare_capacity_mut`]:
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let mut s = Sds::from_bytes(b"id=")?;
    /// s.reserve(2)?;
    /// let spare = s.spare_capacity_mut();
    /// spare[0].write(b'4');
    /// spare[1].write(b'2');
    /// unsafe { s.increment_len(2) };
    /// assert_eq!(s, "id=42");
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    ///
    /// # Safety
    ///
    /// For a positive `delta`, the `delta` bytes following the current content
    /// must have been initialized.
    ///
    /// # Panics
    ///
    /// Panics if the new length would be negative or exceed
    /// [`Sds::allocated`].
    pub unsafe fn increment_len(&mut self, delta: isize) {
        let new_len = self.len().checked_add_signed(delta);
        let Some(new_len) = new_len.filter(|&n| n <= self.allocated()) else {
            panic!(
                "length adjustment {delta} out of bounds (len {}, allocated {})",
                self.len(),
                self.allocated()
            );
        };
        // SAFETY: bounds checked above, initialization guaranteed by caller.
        unsafe { self.set_len(new_len) };
    }

    /// Checks every structural invariant, panicking on violation.
    #[cfg(any(test, feature = "fuzzing"))]
    pub fn assert_invariants(&self) {
        let len = self.len();
        let alloc = self.allocated();
        let class = self.size_class();
        assert!(len <= alloc, "len {len} exceeds allocation {alloc}");
        assert!(alloc <= class.max_alloc(), "{class:?} cannot record {alloc}");
        assert_eq!(self.as_bytes_with_nul()[len], 0, "missing terminator");
        assert_eq!(self.spare_capacity() + len, alloc);
        if class == SizeClass::Inline {
            assert_eq!(len, alloc, "inline buffer with spare capacity");
            let block = self.block_size() - class.header_len() - 1;
            assert!(len <= block && block <= class.max_alloc(), "bad inline block {block}");
        } else {
            assert_eq!(self.block_size(), self.alloc_size());
        }
        assert_eq!(self.alloc_size(), class.header_len() + alloc + 1);
    }
}

impl<A: RawAlloc> Drop for Sds<A> {
    fn drop(&mut self) {
        let size = self.block_size();
        // SAFETY: the block is live, exactly `size` bytes, and never used again.
        unsafe { self.alloc.deallocate(self.base(), size) };
    }
}

impl<A: RawAlloc + Clone> Clone for Sds<A> {
    fn clone(&self) -> Self {
        self.try_clone().unwrap_or_else(|err| alloc_failure(err))
    }
}

impl<A: RawAlloc> Deref for Sds<A> {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: RawAlloc> DerefMut for Sds<A> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl<A: RawAlloc> AsRef<[u8]> for Sds<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: RawAlloc> AsMut<[u8]> for Sds<A> {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl<A: RawAlloc> Borrow<[u8]> for Sds<A> {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: RawAlloc> BorrowMut<[u8]> for Sds<A> {
    fn borrow_mut(&mut self) -> &mut [u8] {
        self.as_bytes_mut()
    }
}

impl<A: RawAlloc> fmt::Debug for Sds<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_bstr(), f)
    }
}

impl<A: RawAlloc> fmt::Display for Sds<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_bstr(), f)
    }
}

impl<A: RawAlloc, B: RawAlloc> PartialEq<Sds<B>> for Sds<A> {
    fn eq(&self, other: &Sds<B>) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<A: RawAlloc> Eq for Sds<A> {}

impl<A: RawAlloc, B: RawAlloc> PartialOrd<Sds<B>> for Sds<A> {
    fn partial_cmp(&self, other: &Sds<B>) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl<A: RawAlloc> Ord for Sds<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl<A: RawAlloc> Hash for Sds<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

macro_rules! impl_partial_eq_bytes {
    ($($rhs:ty => |$v:ident| $bytes:expr),* $(,)?) => {$(
        impl<A: RawAlloc> PartialEq<$rhs> for Sds<A> {
            fn eq(&self, $v: &$rhs) -> bool {
                let bytes: &[u8] = $bytes;
                self.as_bytes() == bytes
            }
        }

        impl<A: RawAlloc> PartialEq<Sds<A>> for $rhs {
            fn eq(&self, other: &Sds<A>) -> bool {
                let $v = self;
                let bytes: &[u8] = $bytes;
                bytes == other.as_bytes()
            }
        }
    )*};
}

impl_partial_eq_bytes! {
    [u8] => |v| v,
    &[u8] => |v| v,
    str => |v| v.as_bytes(),
    &str => |v| v.as_bytes(),
}

impl<A: RawAlloc, const N: usize> PartialEq<[u8; N]> for Sds<A> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_bytes() == other
    }
}

impl<A: RawAlloc, const N: usize> PartialEq<&[u8; N]> for Sds<A> {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.as_bytes() == *other
    }
}

impl TryFrom<&[u8]> for Sds<Heap> {
    type Error = AllocError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl TryFrom<&str> for Sds<Heap> {
    type Error = AllocError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::from_bytes(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::Sds;
    use crate::{MAX_PREALLOC, SizeClass};

    #[test]
    fn empty_buffer_is_never_inline() {
        let s = Sds::new().unwrap();
        assert_eq!(s.size_class(), SizeClass::U8);
        assert_eq!(s.len(), 0);
        assert_eq!(s.as_bytes_with_nul(), b"\0");
        s.assert_invariants();

        let s = Sds::with_capacity(100).unwrap();
        assert_eq!((s.len(), s.spare_capacity()), (0, 100));
        assert_eq!(s.size_class(), SizeClass::U8);
        s.assert_invariants();
    }

    #[test]
    fn short_content_is_inline_without_spare() {
        let s = Sds::from_bytes(b"abc").unwrap();
        assert_eq!(s.size_class(), SizeClass::Inline);
        assert_eq!(s.spare_capacity(), 0);
        assert_eq!(s.alloc_size(), 1 + 3 + 1);
        s.assert_invariants();
    }

    #[test]
    fn append_to_inline_migrates_away() {
        let mut s = Sds::from_bytes(b"abc").unwrap();
        s.append(b"d").unwrap();
        assert_eq!(s.size_class(), SizeClass::U8);
        // (3 + 1) * 2
        assert_eq!(s.allocated(), 8);
        assert_eq!(s, "abcd");
        s.assert_invariants();
    }

    #[test]
    fn reserve_is_noop_with_enough_room() {
        let mut s = Sds::with_capacity(64).unwrap();
        let before = s.as_ptr();
        s.reserve(64).unwrap();
        assert_eq!(s.as_ptr(), before);
        assert_eq!(s.allocated(), 64);
    }

    #[test]
    fn greedy_growth_above_threshold_adds_fixed_slack() {
        let mut s = Sds::new().unwrap();
        s.reserve(MAX_PREALLOC + 10).unwrap();
        assert_eq!(s.allocated(), 2 * MAX_PREALLOC + 10);
        assert_eq!(s.size_class(), SizeClass::U32);
        s.assert_invariants();
    }

    #[test]
    fn reserve_exact_allocates_required_size() {
        let mut s = Sds::from_bytes(b"abc").unwrap();
        s.reserve_exact(300).unwrap();
        assert_eq!(s.allocated(), 303);
        assert_eq!(s.size_class(), SizeClass::U16);
        assert_eq!(s, "abc");
    }

    #[test]
    fn growth_never_lowers_class() {
        let mut s = Sds::with_capacity(70_000).unwrap();
        assert_eq!(s.size_class(), SizeClass::U32);
        s.append(b"x").unwrap();
        s.shrink_to_fit().unwrap();
        assert_eq!(s.size_class(), SizeClass::Inline);
        s.append(b"y").unwrap();
        assert_eq!(s.size_class(), SizeClass::U8);

        let mut t = Sds::with_capacity(70_000).unwrap();
        t.append(&[b'z'; 70_000]).unwrap();
        // Class U32 stays even though the next target fits U32 anyway.
        t.append(b"!").unwrap();
        assert_eq!(t.size_class(), SizeClass::U32);
    }

    #[test]
    fn grow_from_ten_bytes_to_one_hundred_thousand() {
        let mut s = Sds::from_bytes(b"0123456789").unwrap();
        let chunk = [b'x'; 1000];
        while s.len() < 100_000 {
            s.append(&chunk).unwrap();
            s.assert_invariants();
        }
        assert!(s.size_class().max_alloc() >= 100_000);
        assert!(s.allocated() >= 100_000);
        assert_eq!(&s[..10], b"0123456789");
        assert!(s[10..].iter().all(|&b| b == b'x'));
    }

    #[test]
    fn shortened_inline_keeps_its_block() {
        let mut s = Sds::from_bytes(b"hello world").unwrap();
        assert_eq!(s.size_class(), SizeClass::Inline);
        let (addr, block) = (s.as_ptr(), s.block_size());
        s.truncate(5);
        s.assert_invariants();
        assert_eq!(s, "hello");
        assert_eq!((s.as_ptr(), s.block_size()), (addr, block));
        assert_eq!(s.spare_capacity() + s.len() + 1 + 1, s.alloc_size());
        assert_eq!(s.alloc_size(), 1 + 5 + 1);

        s.shrink_to_fit().unwrap();
        s.assert_invariants();
        assert_eq!(s.block_size(), 1 + 5 + 1);
        assert_eq!(s, "hello");

        s.trim(b"ho");
        assert_eq!(s, "ell");
        assert_eq!(s.spare_capacity() + s.len() + 1 + 1, s.alloc_size());
        assert_eq!(s.block_size(), 1 + 5 + 1);

        s.clear();
        s.append(b"grown past the old block").unwrap();
        s.assert_invariants();
        assert_eq!(s.size_class(), SizeClass::U8);
    }

    #[test]
    fn shrink_to_fit_is_idempotent() {
        let mut s = Sds::with_capacity(1000).unwrap();
        s.append(b"hello").unwrap();
        s.shrink_to_fit().unwrap();
        assert_eq!(s.spare_capacity(), 0);
        assert_eq!(s.size_class(), SizeClass::Inline);
        let addr = s.as_ptr();
        let size = s.alloc_size();
        s.shrink_to_fit().unwrap();
        assert_eq!(s.as_ptr(), addr);
        assert_eq!(s.alloc_size(), size);
        assert_eq!(s, "hello");
    }

    #[test]
    fn shrink_within_same_class_reallocates_in_place() {
        let mut s = Sds::with_capacity(1000).unwrap();
        s.append(&[b'a'; 300]).unwrap();
        s.shrink_to_fit().unwrap();
        assert_eq!(s.size_class(), SizeClass::U16);
        assert_eq!(s.allocated(), 300);
        s.assert_invariants();
    }

    #[test]
    fn duplicate_keeps_content_and_capacity() {
        let mut s = Sds::with_capacity(100).unwrap();
        s.append(b"a\0b").unwrap();
        let d = s.try_clone().unwrap();
        assert_eq!(d, s);
        assert_eq!(d.len(), 3);
        assert!(d.spare_capacity() >= s.spare_capacity());
        assert_ne!(d.as_ptr(), s.as_ptr());
        d.assert_invariants();
    }

    #[test]
    fn zeroed_is_all_zero() {
        let s = Sds::zeroed(40).unwrap();
        assert_eq!(s.len(), 40);
        assert!(s.iter().all(|&b| b == 0));
        s.assert_invariants();
    }

    #[test]
    fn compare_orders_prefix_first() {
        let a = Sds::from_bytes(b"abc").unwrap();
        let b = Sds::from_bytes(b"abcd").unwrap();
        let c = Sds::from_bytes(b"abd").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.compare(&a.try_clone().unwrap()), core::cmp::Ordering::Equal);
        let mut v: Vec<_> = [c.clone(), a.clone(), b.clone()].into();
        v.sort();
        assert_eq!(v, [a, b, c]);
    }

    #[test]
    fn spare_capacity_commit() {
        let mut s = Sds::new().unwrap();
        s.reserve(3).unwrap();
        for (slot, b) in s.spare_capacity_mut().iter_mut().zip(b"xyz") {
            slot.write(*b);
        }
        unsafe { s.increment_len(3) };
        assert_eq!(s, "xyz");
        unsafe { s.increment_len(-1) };
        assert_eq!(s, "xy");
        assert_eq!(s.as_bytes_with_nul(), b"xy\0");
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn increment_past_allocation_panics() {
        let mut s = Sds::from_bytes(b"ab").unwrap();
        unsafe { s.increment_len(1) };
    }

    #[test]
    fn compares_with_bytes_and_str_both_ways() {
        let s = Sds::from_bytes(b"k\0v").unwrap();
        let bytes: &[u8] = b"k\0v";
        assert!(s == *bytes && *bytes == s);
        assert!(s == bytes && bytes == s);
        assert!(s == "k\0v" && "k\0v" == s);
        assert!(s == *"k\0v" && *"k\0v" == s);
        assert!(s == *b"k\0v" && s == b"k\0v");
        assert!(s != "k");
    }

    #[test]
    fn debug_is_escaped() {
        let s = Sds::from_bytes(b"a\"\n\xff").unwrap();
        assert_eq!(alloc::format!("{s:?}"), r#""a\"\n\xff""#);
    }
}
