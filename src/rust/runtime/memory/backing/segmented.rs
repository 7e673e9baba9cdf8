// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// The segmented strategy models a native buffer primitive whose length fields are 16 bits wide (as in DPDK MBufs). A
// region larger than one segment is described by a chain of segment descriptors, each covering up to `segment_size`
// bytes of the region. The descriptors live in the same allocation, immediately before the first data byte, so the
// strategy can find them from the region pointer alone.
//
//   +-----------+-----------+-----------+=================================================+
//   | Segment 0 | Segment 1 |    ...    | data bytes (segment 0 | segment 1 | ... )       |
//   +-----------+-----------+-----------+=================================================+
//                                       ^
//                                       region pointer handed out to the packet
//
// Whenever the owning packet moves its window, `sync_window()` redistributes `data_off`/`data_len` over the chain so
// that the native view and the packet's [data, tail) agree.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::{
    BackingKind,
    BackingStrategy,
    SegmentInfo,
};
use crate::{
    pal::arch::CPU_DATA_CACHE_LINE_SIZE,
    runtime::fail::Fail,
};
use ::std::{
    alloc::{
        alloc_zeroed,
        dealloc,
        Layout,
    },
    mem::{
        align_of,
        size_of,
    },
    ptr::NonNull,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Default number of data bytes described by one segment (a common MBuf data room size).
pub const DEFAULT_SEGMENT_SIZE: u16 = 2048;

//======================================================================================================================
// Structures
//======================================================================================================================

// Segment descriptor. Field names and widths follow the MBuf fields they stand in for.
#[repr(C)]
#[repr(align(64))]
#[derive(Debug)]
struct Segment {
    // Virtual address of this segment's storage.
    buf_addr: *mut u8,
    // Storage length of this segment.
    buf_len: u16,
    // Offset of the first live byte within this segment.
    data_off: u16,
    // Amount of live data in this segment.
    data_len: u16,
    // Number of segments in this chain (only valid in the first segment).
    nb_segs: u16,
    // Total live data length (only valid in the first segment).
    pkt_len: u32,
    // Next segment in the chain (must be None in the last segment).
    next: Option<NonNull<Segment>>,
}

const _: () = assert!(align_of::<Segment>() <= CPU_DATA_CACHE_LINE_SIZE);
const _: () = assert!(size_of::<Segment>() % CPU_DATA_CACHE_LINE_SIZE == 0);

/// Segmented Backing Strategy
#[derive(Debug)]
pub struct SegmentedBacking {
    segment_size: u16,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl SegmentedBacking {
    /// Creates a segmented strategy whose segments each describe up to `segment_size` bytes.
    pub fn new(segment_size: u16) -> Result<Self, Fail> {
        if segment_size == 0 {
            return Err(Fail::new(libc::EINVAL, "segment size must be non-zero"));
        }
        Ok(Self { segment_size })
    }

    /// Returns the number of data bytes described by one segment.
    pub fn segment_size(&self) -> u16 {
        self.segment_size
    }

    // Number of descriptors needed to cover `size` bytes. There is always at least one.
    fn nb_segs(&self, size: usize) -> usize {
        let segment_size: usize = self.segment_size as usize;
        ::std::cmp::max(1, size.div_ceil(segment_size))
    }

    // Returns the allocation layout for a region of `size` bytes, and the length of the descriptor area before it.
    fn layout(&self, size: usize) -> Result<(Layout, usize), Fail> {
        let header: usize = self
            .nb_segs(size)
            .checked_mul(size_of::<Segment>())
            .ok_or_else(|| Fail::out_of_memory(size))?;
        let layout: Layout = header
            .checked_add(size)
            .and_then(|amount| Layout::from_size_align(amount, CPU_DATA_CACHE_LINE_SIZE).ok())
            .ok_or_else(|| Fail::out_of_memory(size))?;
        Ok((layout, header))
    }

    // Gets the first segment descriptor of a region.
    // Safety: `ptr` and `size` must describe a region allocated by this strategy.
    unsafe fn first_segment(&self, ptr: NonNull<u8>, size: usize) -> NonNull<Segment> {
        let header: usize = self.nb_segs(size) * size_of::<Segment>();
        NonNull::new_unchecked(ptr.as_ptr().sub(header).cast::<Segment>())
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl BackingStrategy for SegmentedBacking {
    fn kind(&self) -> BackingKind {
        BackingKind::Segmented
    }

    fn allocate(&self, size: usize) -> Result<NonNull<u8>, Fail> {
        let (layout, header): (Layout, usize) = self.layout(size)?;

        // Safety: the layout is never zero-sized, since there is at least one descriptor.
        let allocation: *mut u8 = unsafe { alloc_zeroed(layout) };
        if allocation.is_null() {
            let fail: Fail = Fail::out_of_memory(layout.size());
            error!("allocate(): {}", fail.cause);
            return Err(fail);
        }

        let nb_segs: usize = self.nb_segs(size);
        let segments: *mut Segment = allocation.cast::<Segment>();
        // Safety: the descriptor area holds `nb_segs` properly aligned descriptors, followed by `size` data bytes.
        unsafe {
            let data: *mut u8 = allocation.add(header);
            for i in 0..nb_segs {
                let start: usize = i * self.segment_size as usize;
                let len: usize = ::std::cmp::min(self.segment_size as usize, size - start);
                segments.add(i).write(Segment {
                    buf_addr: data.add(start),
                    // `len` is bounded by the (16-bit) segment size, so this cast is safe.
                    buf_len: len as u16,
                    data_off: 0,
                    data_len: 0,
                    nb_segs: if i == 0 { nb_segs as u16 } else { 1 },
                    pkt_len: 0,
                    next: if i + 1 < nb_segs {
                        Some(NonNull::new_unchecked(segments.add(i + 1)))
                    } else {
                        None
                    },
                });
            }

            trace!("allocate(): {} bytes in {} segments", size, nb_segs);
            Ok(NonNull::new_unchecked(data))
        }
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        // The layout was validated when the region was allocated, so it cannot fail here.
        if let Ok((layout, _)) = self.layout(size) {
            dealloc(self.first_segment(ptr, size).cast::<u8>().as_ptr(), layout);
        }
    }

    unsafe fn sync_window(&self, ptr: NonNull<u8>, size: usize, data: usize, tail: usize) {
        let mut first: NonNull<Segment> = self.first_segment(ptr, size);
        // The window of a single region never exceeds u32::MAX bytes in practice; saturate rather than wrap.
        first.as_mut().pkt_len = u32::try_from(tail - data).unwrap_or(u32::MAX);

        let mut next_entry: Option<NonNull<Segment>> = Some(first);
        while let Some(mut entry) = next_entry {
            let segment: &mut Segment = entry.as_mut();
            next_entry = segment.next;

            let start: usize = segment.buf_addr.offset_from(ptr.as_ptr()) as usize;
            let end: usize = start + segment.buf_len as usize;
            let lo: usize = data.clamp(start, end);
            let hi: usize = tail.clamp(start, end);
            // Both values are bounded by buf_len, so these casts are safe.
            segment.data_off = (lo - start) as u16;
            segment.data_len = hi.saturating_sub(lo) as u16;
        }
    }

    unsafe fn segments(&self, ptr: NonNull<u8>, size: usize) -> Option<Vec<SegmentInfo>> {
        let mut result: Vec<SegmentInfo> = Vec::with_capacity(self.nb_segs(size));
        let mut next_entry: Option<NonNull<Segment>> = Some(self.first_segment(ptr, size));
        while let Some(entry) = next_entry {
            let segment: &Segment = entry.as_ref();
            next_entry = segment.next;
            result.push(SegmentInfo {
                buf_off: segment.buf_addr.offset_from(ptr.as_ptr()) as usize,
                buf_len: segment.buf_len,
                data_off: segment.data_off,
                data_len: segment.data_len,
                pkt_len: segment.pkt_len,
            });
        }
        Some(result)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
