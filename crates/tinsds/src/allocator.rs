//! The allocator seam used by every buffer.
//!
//! A buffer lives in a single byte-aligned block holding its header, payload
//! and terminator. Blocks are always described by their full size, so an
//! implementation never has to remember sizes on its own.

use core::{alloc::Layout, ptr::NonNull};

use crate::error::AllocError;

/// Provider of the blocks backing [`Sds`](crate::Sds) buffers.
///
/// # Safety
///
/// Implementations must return blocks that are valid for reads and writes of
/// the requested number of bytes until they are passed back to
/// [`deallocate`](RawAlloc::deallocate) or
/// [`reallocate`](RawAlloc::reallocate). `reallocate` must preserve the first
/// `min(old_size, new_size)` bytes and, on failure, leave the old block
/// untouched and valid.
pub unsafe trait RawAlloc {
    /// Allocates an uninitialized block of `size` bytes (`size > 0`).
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError>;

    /// Resizes a block previously returned by this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must denote a live block of exactly `old_size` bytes obtained
    /// from this allocator, and `new_size` must be non-zero.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block.
    ///
    /// # Safety
    ///
    /// `ptr` must denote a live block of exactly `size` bytes obtained from
    /// this allocator. The block must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize);
}

/// The global Rust allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Heap;

#[inline]
fn byte_layout(size: usize) -> Result<Layout, AllocError> {
    Layout::from_size_align(size, 1).map_err(|_| AllocError::CapacityOverflow)
}

unsafe impl RawAlloc for Heap {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(size > 0);
        let layout = byte_layout(size)?;
        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory { size })
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(new_size > 0);
        let old = byte_layout(old_size)?;
        // Rejects sizes that would overflow `isize` once rounded to the alignment.
        byte_layout(new_size)?;
        // SAFETY: the caller guarantees `ptr` was allocated with `old`; the new
        // size is non-zero and was validated above.
        let ptr = unsafe { alloc::alloc::realloc(ptr.as_ptr(), old, new_size) };
        NonNull::new(ptr).ok_or(AllocError::OutOfMemory { size: new_size })
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // The layout was valid when the block was allocated.
        if let Ok(layout) = byte_layout(size) {
            // SAFETY: the caller guarantees `ptr` is a live block of `layout`.
            unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}

unsafe impl<A: RawAlloc + ?Sized> RawAlloc for &A {
    #[inline]
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        (**self).allocate(size)
    }

    #[inline]
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded contract.
        unsafe { (**self).reallocate(ptr, old_size, new_size) }
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded contract.
        unsafe { (**self).deallocate(ptr, size) }
    }
}
