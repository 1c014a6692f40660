#![allow(missing_docs, dead_code)]

use core::{cell::Cell, ptr::NonNull};

use tinsds::{AllocError, Heap, RawAlloc};

/// Heap allocator that counts live blocks and bytes, and can be told to fail.
#[derive(Debug, Default)]
pub struct TrackingAlloc {
    live_blocks: Cell<usize>,
    live_bytes: Cell<usize>,
    allocations: Cell<usize>,
    remaining: Cell<Option<usize>>,
}

impl TrackingAlloc {
    pub fn live_blocks(&self) -> usize {
        self.live_blocks.get()
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes.get()
    }

    /// Successful `allocate` and `reallocate` calls so far.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Lets `n` more requests succeed, then fails every following one.
    pub fn fail_after(&self, n: usize) {
        self.remaining.set(Some(n));
    }

    pub fn stop_failing(&self) {
        self.remaining.set(None);
    }

    fn admit(&self, size: usize) -> Result<(), AllocError> {
        match self.remaining.get() {
            Some(0) => Err(AllocError::OutOfMemory { size }),
            Some(n) => {
                self.remaining.set(Some(n - 1));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

unsafe impl RawAlloc for TrackingAlloc {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, AllocError> {
        self.admit(size)?;
        let ptr = Heap.allocate(size)?;
        self.live_blocks.set(self.live_blocks.get() + 1);
        self.live_bytes.set(self.live_bytes.get() + size);
        self.allocations.set(self.allocations.get() + 1);
        Ok(ptr)
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.admit(new_size)?;
        let ptr = unsafe { Heap.reallocate(ptr, old_size, new_size)? };
        self.live_bytes.set(self.live_bytes.get() - old_size + new_size);
        self.allocations.set(self.allocations.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize) {
        unsafe { Heap.deallocate(ptr, size) };
        self.live_blocks.set(self.live_blocks.get() - 1);
        self.live_bytes.set(self.live_bytes.get() - size);
    }
}
