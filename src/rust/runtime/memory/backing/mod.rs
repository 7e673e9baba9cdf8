// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// A backing buffer is the contiguous byte region that packet windows are carved from.  Where the bytes come from, and
// how they are given back, is decided by a `BackingStrategy`:
//
//   - heap: plain allocate/free from the global allocator.
//   - external: caller-supplied memory, released through a caller-given callback.
//   - segmented: memory described by a chain of native segment descriptors (modeled after DPDK MBufs), which must be
//     kept consistent with the packet window on every resize.
//
// A `BackingBuffer` remembers the strategy that produced it and hands its memory back to that strategy when dropped.
// Sharing is expressed by wrapping the buffer in an `Arc`: cloning a packet bumps the (atomic) strong count, and the
// last packet to let go of the buffer triggers the release.

mod external;
mod heap;
mod segmented;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    fmt,
    ops::Range,
    ptr::NonNull,
    slice,
    str::FromStr,
    sync::Arc,
};

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    external::{
        ExternalBacking,
        ReleaseFn,
    },
    heap::HeapBacking,
    segmented::{
        SegmentedBacking,
        DEFAULT_SEGMENT_SIZE,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Kinds of backing strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackingKind {
    /// Global heap allocator.
    Heap,
    /// Caller-owned memory with a release callback.
    External,
    /// Native segmented buffer.
    Segmented,
}

/// Snapshot of one native segment descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SegmentInfo {
    /// Offset of this segment's storage from the start of the backing buffer.
    pub buf_off: usize,
    /// Storage length of this segment.
    pub buf_len: u16,
    /// Offset of the first live byte within this segment.
    pub data_off: u16,
    /// Number of live bytes in this segment.
    pub data_len: u16,
    /// Total live bytes across the chain (only meaningful in the first segment).
    pub pkt_len: u32,
}

/// A contiguous byte region owned on behalf of one or more packets.
pub struct BackingBuffer {
    /// Start of the region.
    ptr: NonNull<u8>,
    /// Length of the region.
    len: usize,
    /// Strategy that produced the region and will release it.
    strategy: Arc<dyn BackingStrategy>,
}

// Safety: The region behind `ptr` is only ever written through `&mut BackingBuffer`, which packets obtain with
// `Arc::get_mut()`, i.e. only while they hold the sole reference. Shared buffers are read-only.
unsafe impl Send for BackingBuffer {}
unsafe impl Sync for BackingBuffer {}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Backing Strategy
///
/// Supplies and releases the memory behind [BackingBuffer]s. Implementations must be thread-safe: a buffer may be
/// released on whichever thread drops the last packet referencing it.
pub trait BackingStrategy: fmt::Debug + Send + Sync {
    /// Returns the kind of this strategy.
    fn kind(&self) -> BackingKind;

    /// Allocates `size` zero-filled bytes. Fails with `ENOMEM` if the environment cannot supply them.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>, Fail>;

    /// Allocates `size` bytes and copies `old[src]` to offset `dst` of the new region.
    fn resize_with_copy(&self, old: &[u8], size: usize, src: Range<usize>, dst: usize) -> Result<NonNull<u8>, Fail> {
        assert!(dst + src.len() <= size, "resize_with_copy(): copy does not fit the new buffer");
        let ptr: NonNull<u8> = self.allocate(size)?;
        // Safety: `ptr` is a fresh allocation of `size` bytes, so it is valid for `src.len()` writes at `dst` and
        // cannot overlap `old`.
        unsafe {
            ::std::ptr::copy_nonoverlapping(old[src.clone()].as_ptr(), ptr.as_ptr().add(dst), src.len());
        }
        Ok(ptr)
    }

    /// Releases a region previously returned by this strategy.
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must describe a region obtained from this strategy that is no longer referenced.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);

    /// Strategy that supplies replacement buffers when a buffer from this one must be reallocated. `None` means this
    /// strategy allocates its own replacements.
    fn fallback(&self) -> Option<&Arc<dyn BackingStrategy>> {
        None
    }

    /// Records the live window `[data, tail)` in any native metadata describing the region.
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must describe a region obtained from this strategy, and the caller must have exclusive access
    /// to it.
    unsafe fn sync_window(&self, _ptr: NonNull<u8>, _size: usize, _data: usize, _tail: usize) {}

    /// Describes the native segments covering the region, if this strategy has any.
    ///
    /// # Safety
    ///
    /// `ptr` and `size` must describe a live region obtained from this strategy.
    unsafe fn segments(&self, _ptr: NonNull<u8>, _size: usize) -> Option<Vec<SegmentInfo>> {
        None
    }
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl BackingBuffer {
    /// Allocates a new buffer of `size` bytes from `strategy`.
    pub fn allocate(strategy: &Arc<dyn BackingStrategy>, size: usize) -> Result<Self, Fail> {
        let ptr: NonNull<u8> = strategy.allocate(size)?;
        Ok(Self {
            ptr,
            len: size,
            strategy: strategy.clone(),
        })
    }

    /// Wraps a region that `strategy` will release.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` initialized bytes until `strategy` releases it.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, len: usize, strategy: Arc<dyn BackingStrategy>) -> Self {
        Self { ptr, len, strategy }
    }

    /// Allocates a buffer of `size` bytes holding a copy of `self[src]` at offset `dst`. The replacement comes from
    /// this buffer's strategy, or from its fallback if it cannot allocate.
    pub fn resize_with_copy(&self, size: usize, src: Range<usize>, dst: usize) -> Result<Self, Fail> {
        let strategy: &Arc<dyn BackingStrategy> = self.strategy.fallback().unwrap_or(&self.strategy);
        let ptr: NonNull<u8> = strategy.resize_with_copy(self.as_slice(), size, src, dst)?;
        Ok(Self {
            ptr,
            len: size,
            strategy: strategy.clone(),
        })
    }

    /// Returns the length of the region.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the region holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the platform address of the first byte of the region.
    pub fn addr(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Returns the strategy that owns the region.
    pub fn strategy(&self) -> &Arc<dyn BackingStrategy> {
        &self.strategy
    }

    /// Returns the region as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        // Safety: `ptr` is valid for reads of `len` initialized bytes for as long as `self` lives.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the region as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety: `ptr` is valid for writes of `len` bytes, and `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Records the live window `[data, tail)` in the strategy's native metadata.
    pub fn sync_window(&mut self, data: usize, tail: usize) {
        debug_assert!(data <= tail && tail <= self.len);
        // Safety: the region came from `self.strategy`, and `&mut self` guarantees exclusive access.
        unsafe { self.strategy.sync_window(self.ptr, self.len, data, tail) }
    }

    /// Describes the native segments covering the region, if any.
    pub fn segments(&self) -> Option<Vec<SegmentInfo>> {
        // Safety: the region came from `self.strategy` and is alive for as long as `self` is.
        unsafe { self.strategy.segments(self.ptr, self.len) }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Drop Trait Implementation for Backing Buffers
impl Drop for BackingBuffer {
    fn drop(&mut self) {
        trace!("drop(): releasing {} bytes ({:?})", self.len, self.strategy.kind());
        // Safety: the region came from `self.strategy`, and nothing references it once the buffer is dropped.
        unsafe { self.strategy.release(self.ptr, self.len) }
    }
}

/// Debug Trait Implementation for Backing Buffers
impl fmt::Debug for BackingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackingBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len)
            .field("kind", &self.strategy.kind())
            .finish()
    }
}

/// Conversion Trait Implementation for Backing Kinds
impl FromStr for BackingKind {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heap" => Ok(BackingKind::Heap),
            "segmented" => Ok(BackingKind::Segmented),
            _ => Err(Fail::new(libc::EINVAL, "unknown backing strategy")),
        }
    }
}

/// Display Trait Implementation for Backing Kinds
impl fmt::Display for BackingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &str = match self {
            BackingKind::Heap => "heap",
            BackingKind::External => "external",
            BackingKind::Segmented => "segmented",
        };
        f.write_str(name)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
