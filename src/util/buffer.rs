//! Page-aligned I/O buffer
//!
//! O_DIRECT requires the transfer buffer to be aligned to the device block
//! size; aligning to the page size satisfies every device and costs nothing,
//! so a single page-aligned allocation serves all backends.

use crate::Result;
use anyhow::Context;
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// A heap buffer whose start address is aligned to the system page size.
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate a zero-filled buffer of `len` bytes, page-aligned.
    pub fn new(len: usize) -> Result<Self> {
        anyhow::ensure!(len > 0, "buffer length must be non-zero");

        let align = page_size();
        let layout = Layout::from_size_align(len, align)
            .context("invalid buffer layout")?;
        // SAFETY: layout has non-zero size, checked above.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).context("buffer allocation failed")?;

        Ok(Self { ptr, len, layout })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for len bytes and uniquely borrowed here.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated with this exact layout in new().
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

// SAFETY: the buffer owns its allocation exclusively.
unsafe impl Send for AlignedBuffer {}

/// System page size in bytes.
pub fn page_size() -> usize {
    // SAFETY: sysconf with a valid name has no side effects.
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}
