//! Aligned lane buffers.
//!
//! Each lane owns a private read/write buffer pair, aligned to one kernel
//! block and zero-initialized. Ownership is exclusive: a pair moves into
//! its lane's worker thread at generator construction and is freed when
//! the worker drops it. Allocation for a whole generator is all-or-none;
//! if any single buffer is refused, everything already acquired is
//! released before the error propagates.

use crate::result::{SusurroError, SusurroResult};
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

/// One zero-initialized allocation with explicit alignment
pub(crate) struct AlignedBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl AlignedBuffer {
    /// Allocate `size` bytes aligned to `alignment`
    pub(crate) fn allocate(size: usize, alignment: usize) -> SusurroResult<Self> {
        if size == 0 {
            return Err(SusurroError::invalid_argument(
                "buffer size must be positive",
            ));
        }
        let layout = Layout::from_size_align(size, alignment).map_err(|_| {
            SusurroError::invalid_argument(format!(
                "invalid buffer geometry: {size} bytes aligned to {alignment}"
            ))
        })?;
        // Zeroing keeps read/copy kernels off uninitialized memory.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(SusurroError::AllocationFailure {
            bytes: size,
            alignment,
        })?;
        Ok(Self { ptr, layout })
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.ptr.as_ptr(), self.layout);
        }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("size", &self.layout.size())
            .field("alignment", &self.layout.align())
            .finish()
    }
}

// The buffer is an exclusively owned heap region; moving it across the
// thread boundary into its lane worker is sound.
unsafe impl Send for AlignedBuffer {}

/// A lane's private buffer pair
#[derive(Debug)]
pub(crate) struct LaneBuffers {
    read: AlignedBuffer,
    write: AlignedBuffer,
}

impl LaneBuffers {
    /// Allocate one read/write pair
    pub(crate) fn allocate(size: usize, alignment: usize) -> SusurroResult<Self> {
        Ok(Self {
            read: AlignedBuffer::allocate(size, alignment)?,
            write: AlignedBuffer::allocate(size, alignment)?,
        })
    }

    /// Allocate pairs for every lane, all-or-none.
    ///
    /// The vector accumulates RAII buffers, so the first failure unwinds
    /// every allocation that preceded it.
    pub(crate) fn allocate_lanes(
        lanes: usize,
        size: usize,
        alignment: usize,
    ) -> SusurroResult<Vec<Self>> {
        let mut pairs = Vec::with_capacity(lanes);
        for _ in 0..lanes {
            pairs.push(Self::allocate(size, alignment)?);
        }
        Ok(pairs)
    }

    pub(crate) fn read_ptr(&self) -> *const u8 {
        self.read.as_ptr()
    }

    pub(crate) fn read_ptr_mut(&mut self) -> *mut u8 {
        self.read.as_mut_ptr()
    }

    pub(crate) fn write_ptr(&mut self) -> *mut u8 {
        self.write.as_mut_ptr()
    }

    pub(crate) fn len(&self) -> usize {
        self.read.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_aligned_and_zeroed() {
        let buf = AlignedBuffer::allocate(4096, 512).unwrap();
        assert_eq!(buf.as_ptr() as usize % 512, 0);
        assert_eq!(buf.len(), 4096);
        let bytes = unsafe { std::slice::from_raw_parts(buf.as_ptr(), 4096) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn lane_pair_buffers_are_disjoint() {
        let mut pair = LaneBuffers::allocate(1024, 256).unwrap();
        let read = pair.read_ptr() as usize;
        let write = pair.write_ptr() as usize;
        assert!(read + 1024 <= write || write + 1024 <= read);
    }

    #[test]
    fn allocate_lanes_returns_requested_count() {
        let lanes = LaneBuffers::allocate_lanes(4, 512, 256).unwrap();
        assert_eq!(lanes.len(), 4);
        for lane in &lanes {
            assert_eq!(lane.len(), 512);
        }
    }

    #[test]
    fn zero_alignment_is_invalid_geometry() {
        let err = AlignedBuffer::allocate(1024, 0).unwrap_err();
        assert!(matches!(
            err,
            crate::result::SusurroError::InvalidArgument { .. }
        ));
    }

    #[test]
    fn buffers_can_cross_threads() {
        let mut pair = LaneBuffers::allocate(512, 256).unwrap();
        let handle = std::thread::spawn(move || {
            unsafe { pair.write_ptr().write_bytes(0x77, 512) };
            pair.len()
        });
        assert_eq!(handle.join().unwrap(), 512);
    }
}
