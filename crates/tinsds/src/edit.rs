//! Mutation primitives.
//!
//! Everything here is built on the growth engine: appends go through
//! [`Sds::reserve`], and the in-place edits (`range`, `trim`, `truncate`, ...)
//! only ever shorten the content, so they never allocate.

use core::{ffi::CStr, ptr};

use bstr::ByteSlice;

use crate::{
    allocator::RawAlloc,
    error::AllocError,
    sds::{Sds, alloc_failure},
};

impl<A: RawAlloc> Sds<A> {
    /// Appends `bytes`, embedded zeros included.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), AllocError> {
        self.reserve(bytes.len())?;
        let len = self.len();
        // SAFETY: `reserve` guarantees `bytes.len()` spare bytes after `len`,
        // and `bytes` cannot alias the uniquely borrowed block.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.as_mut_ptr().add(len), bytes.len());
            self.set_len(len + bytes.len());
        }
        Ok(())
    }

    /// Appends a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), AllocError> {
        self.append(&[byte])
    }

    /// Appends UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn append_str(&mut self, s: &str) -> Result<(), AllocError> {
        self.append(s.as_bytes())
    }

    /// Appends a C string without its terminator.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn append_cstr(&mut self, s: &CStr) -> Result<(), AllocError> {
        self.append(s.to_bytes())
    }

    /// Appends the content of another buffer.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn append_sds<B: RawAlloc>(&mut self, other: &Sds<B>) -> Result<(), AllocError> {
        self.append(other.as_bytes())
    }

    /// Replaces the content with `bytes`, reusing the block when it is large
    /// enough.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn copy_from(&mut self, bytes: &[u8]) -> Result<(), AllocError> {
        if self.allocated() < bytes.len() {
            self.reserve(bytes.len() - self.len())?;
        }
        // SAFETY: the block now holds at least `bytes.len()` payload bytes.
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.as_mut_ptr(), bytes.len());
            self.set_len(bytes.len());
        }
        Ok(())
    }

    /// Replaces the content with UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn copy_from_str(&mut self, s: &str) -> Result<(), AllocError> {
        self.copy_from(s.as_bytes())
    }

    /// Extends the content with zero bytes up to `target` bytes. Does nothing
    /// if the buffer is already that long.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError`] if growing fails; the buffer is unchanged.
    pub fn grow_zeroed(&mut self, target: usize) -> Result<(), AllocError> {
        let len = self.len();
        if target <= len {
            return Ok(());
        }
        self.reserve(target - len)?;
        // SAFETY: `[len, target]` (terminator slot included) is inside the block.
        unsafe {
            self.as_mut_ptr().add(len).write_bytes(0, target - len + 1);
            self.set_len(target);
        }
        Ok(())
    }

    /// Keeps only the inclusive range `start..=end` of the content, moving it
    /// to the front.
    ///
    /// Negative indices count from the end (`-1` is the last byte). Indices are
    /// clamped to the content; an empty or inverted range leaves an empty
    /// buffer. Never reallocates.
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let mut s = Sds::from_bytes(b"Hello World")?;
    /// s.range(1, -1);
    /// assert_eq!(s, "ello World");
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    pub fn range(&mut self, start: isize, end: isize) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let resolve =
            |i: isize| usize::try_from(i).unwrap_or_else(|_| len.saturating_sub(i.unsigned_abs()));
        let (start, end) = (resolve(start), resolve(end));
        let new_len = if start > end || start >= len {
            0
        } else {
            end.min(len - 1) - start + 1
        };
        if start > 0 && new_len > 0 {
            self.as_bytes_mut().copy_within(start..start + new_len, 0);
        }
        // SAFETY: `new_len <= len`.
        unsafe { self.set_len(new_len) };
    }

    /// Strips leading and trailing bytes contained in `cset`.
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let mut s = Sds::from_bytes(b"AA...AA.a.aa.aHelloWorld     :::")?;
    /// s.trim(b"Aa. :");
    /// assert_eq!(s, "HelloWorld");
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    pub fn trim(&mut self, cset: &[u8]) {
        let bytes = self.as_bytes();
        let keep = |b: &u8| !cset.contains(b);
        let start = bytes.iter().position(keep).unwrap_or(bytes.len());
        let end = bytes.iter().rposition(keep).map_or(start, |i| i + 1);
        if start > 0 {
            self.as_bytes_mut().copy_within(start..end, 0);
        }
        // SAFETY: the kept bytes were moved to the front.
        unsafe { self.set_len(end - start) };
    }

    /// Shortens the content to `len` bytes. Does nothing if it is already
    /// shorter.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len() {
            // SAFETY: shrinking within initialized content.
            unsafe { self.set_len(len) };
        }
    }

    /// Empties the buffer, keeping its block.
    ///
    /// Spare capacity is kept for classes with a capacity field. An inline
    /// buffer has none to keep: its `allocated()` follows the length.
    pub fn clear(&mut self) {
        self.truncate(0);
    }

    /// Cuts the content at its first zero byte, for buffers whose bytes were
    /// edited through the raw pointer.
    pub fn update_len(&mut self) {
        if let Some(nul) = self.as_bytes().find_byte(0) {
            self.truncate(nul);
        }
    }

    /// Replaces every byte found in `from` with the byte at the same position
    /// in `to`. Only the first `min(from.len(), to.len())` pairs are used; the
    /// first matching pair wins.
    ///
    /// ```
    /// use tinsds::Sds;
    ///
    /// let mut s = Sds::from_bytes(b"hello")?;
    /// s.map_bytes(b"ho", b"01");
    /// assert_eq!(s, "0ell1");
    /// # Ok::<(), tinsds::AllocError>(())
    /// ```
    pub fn map_bytes(&mut self, from: &[u8], to: &[u8]) {
        for b in self.as_bytes_mut() {
            if let Some((_, &t)) = from.iter().zip(to).find(|&(f, _)| *f == *b) {
                *b = t;
            }
        }
    }
}

impl<A: RawAlloc> Extend<u8> for Sds<A> {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0).unwrap_or_else(|err| alloc_failure(err));
        for b in iter {
            self.push(b).unwrap_or_else(|err| alloc_failure(err));
        }
    }
}

impl<'a, A: RawAlloc> Extend<&'a u8> for Sds<A> {
    fn extend<I: IntoIterator<Item = &'a u8>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}
