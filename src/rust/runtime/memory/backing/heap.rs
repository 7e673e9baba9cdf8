// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::{
    BackingKind,
    BackingStrategy,
};
use crate::{
    pal::arch::PACKET_BUFFER_ALIGNMENT,
    runtime::fail::Fail,
};
use ::std::{
    alloc::{
        alloc_zeroed,
        dealloc,
        Layout,
    },
    ptr::NonNull,
    sync::{
        Arc,
        OnceLock,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Heap Backing Strategy
///
/// Buffers come from the global allocator, aligned to `PACKET_BUFFER_ALIGNMENT`.
#[derive(Debug, Default)]
pub struct HeapBacking {}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl HeapBacking {
    pub fn new() -> Self {
        Self {}
    }

    /// Returns the process-wide heap strategy.
    pub fn shared() -> Arc<dyn BackingStrategy> {
        static HEAP: OnceLock<Arc<dyn BackingStrategy>> = OnceLock::new();
        HEAP.get_or_init(|| Arc::new(HeapBacking::new())).clone()
    }

    fn layout(size: usize) -> Result<Layout, Fail> {
        Layout::from_size_align(size, PACKET_BUFFER_ALIGNMENT)
            .map_err(|_| Fail::out_of_memory(size))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl BackingStrategy for HeapBacking {
    fn kind(&self) -> BackingKind {
        BackingKind::Heap
    }

    fn allocate(&self, size: usize) -> Result<NonNull<u8>, Fail> {
        // The global allocator does not accept zero-sized requests.
        if size == 0 {
            return Ok(NonNull::dangling());
        }

        let layout: Layout = Self::layout(size)?;
        // Safety: `layout` has a non-zero size. The null return is checked below.
        let allocation: *mut u8 = unsafe { alloc_zeroed(layout) };
        match NonNull::new(allocation) {
            Some(ptr) => Ok(ptr),
            None => {
                let fail: Fail = Fail::out_of_memory(size);
                error!("allocate(): {}", fail.cause);
                Err(fail)
            },
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        if size == 0 {
            return;
        }
        // This was validated when the region was allocated, so it cannot fail here.
        let layout: Layout = Layout::from_size_align_unchecked(size, PACKET_BUFFER_ALIGNMENT);
        dealloc(ptr.as_ptr(), layout);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
