// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::{
    BackingKind,
    BackingStrategy,
    HeapBacking,
};
use crate::runtime::fail::Fail;
use ::std::{
    fmt,
    ptr::NonNull,
    sync::Arc,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Callback that gives caller-owned memory back to its owner. Invoked once, with the region start and length.
pub type ReleaseFn = Box<dyn Fn(NonNull<u8>, usize) + Send + Sync>;

/// External Backing Strategy
///
/// Wraps a single caller-supplied region. The region is released through the caller's callback or, if none was given,
/// by reconstructing the `Box<[u8]>` it came from. An external region cannot grow in place: reallocations draw from
/// the fallback strategy (the global heap).
pub struct ExternalBacking {
    release_fn: Option<ReleaseFn>,
    fallback: Arc<dyn BackingStrategy>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl ExternalBacking {
    /// Creates an external strategy. `None` means the region was allocated as a `Box<[u8]>`.
    pub fn new(release_fn: Option<ReleaseFn>) -> Self {
        Self {
            release_fn,
            fallback: HeapBacking::shared(),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl BackingStrategy for ExternalBacking {
    fn kind(&self) -> BackingKind {
        BackingKind::External
    }

    fn allocate(&self, _size: usize) -> Result<NonNull<u8>, Fail> {
        Err(Fail::new(libc::ENOTSUP, "external buffers are supplied by the caller"))
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        match self.release_fn {
            Some(ref release_fn) => release_fn(ptr, size),
            None => {
                // Safety: with no callback, the caller promised the region was leaked from a `Box<[u8]>` of this size.
                let boxed: Box<[u8]> = Box::from_raw(::std::ptr::slice_from_raw_parts_mut(ptr.as_ptr(), size));
                drop(boxed);
            },
        }
    }

    fn fallback(&self) -> Option<&Arc<dyn BackingStrategy>> {
        Some(&self.fallback)
    }
}

impl fmt::Debug for ExternalBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalBacking")
            .field("release_fn", &self.release_fn.is_some())
            .finish()
    }
}
