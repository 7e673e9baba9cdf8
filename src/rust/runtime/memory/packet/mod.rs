// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// A packet is a window `[data, tail)` into a backing buffer, plus annotations. The bytes before the window are the
// headroom and the bytes after it are the tailroom:
//
//   +----------------+==================+----------------+
//   |    headroom    |   packet data    |    tailroom    |
//   +----------------+==================+----------------+
//   ^ head           ^ data             ^ tail           ^ end
//
// Any number of packets may share one backing buffer. A shared buffer is never written: operations that would modify
// it first give the packet a private copy (copy-on-write). Each packet owns its window and annotations.

mod annotations;
mod cow;
mod headers;
mod resize;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    fail::Fail,
    memory::{
        backing::{
            BackingBuffer,
            BackingKind,
            BackingStrategy,
            ExternalBacking,
            HeapBacking,
            ReleaseFn,
            SegmentInfo,
        },
        DEFAULT_HEADROOM,
        MIN_BUFFER_LENGTH,
    },
};
use ::std::{
    fmt,
    ops::Deref,
    ptr::NonNull,
    sync::Arc,
};

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    annotations::{
        Annotations,
        PacketType,
        ADDR_ANNO_SIZE,
        USER_ANNO_SIZE,
    },
    headers::HeaderRef,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// A packet handle.
pub struct Packet {
    /// Backing buffer, possibly shared with other packets.
    buffer: Arc<BackingBuffer>,
    /// Offset of the first data byte.
    data: usize,
    /// Offset one past the last data byte.
    tail: usize,
    /// Annotations.
    anno: Annotations,
    /// Next packet in a chain.
    next: Option<Box<Packet>>,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Packet {
    /// Creates a heap-backed packet with `length` data bytes and at least the given headroom and tailroom. The data is
    /// copied from the first `length` bytes of `data`, or zero-filled if `data` is `None`. Buffers smaller than
    /// [MIN_BUFFER_LENGTH] are padded with extra tailroom.
    pub fn make(headroom: usize, data: Option<&[u8]>, length: usize, tailroom: usize) -> Result<Self, Fail> {
        Self::make_in(&HeapBacking::shared(), headroom, data, length, tailroom)
    }

    /// Same as [Packet::make()], but allocates from `strategy`.
    pub fn make_in(
        strategy: &Arc<dyn BackingStrategy>,
        headroom: usize,
        data: Option<&[u8]>,
        length: usize,
        tailroom: usize,
    ) -> Result<Self, Fail> {
        if let Some(bytes) = data {
            assert!(
                bytes.len() >= length,
                "make(): source holds {} bytes but {} were requested",
                bytes.len(),
                length
            );
        }

        let size: usize = match headroom.checked_add(length).and_then(|n| n.checked_add(tailroom)) {
            Some(size) => size.max(MIN_BUFFER_LENGTH),
            None => panic!("make(): capacity overflow (headroom={}, length={}, tailroom={})", headroom, length, tailroom),
        };

        let mut buffer: BackingBuffer = match BackingBuffer::allocate(strategy, size) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!("make(): {:?}", e);
                return Err(e);
            },
        };
        let tail: usize = headroom + length;
        if let Some(bytes) = data {
            buffer.as_mut_slice()[headroom..tail].copy_from_slice(&bytes[..length]);
        }
        buffer.sync_window(headroom, tail);

        Ok(Self {
            buffer: Arc::new(buffer),
            data: headroom,
            tail,
            anno: Annotations::default(),
            next: None,
        })
    }

    /// Creates a zero-filled packet with `length` data bytes and the default headroom.
    pub fn make_default(length: usize) -> Result<Self, Fail> {
        Self::make(DEFAULT_HEADROOM, None, length, 0)
    }

    /// Creates a packet holding a copy of `bytes`.
    pub fn from_slice(headroom: usize, bytes: &[u8], tailroom: usize) -> Result<Self, Fail> {
        Self::make(headroom, Some(bytes), bytes.len(), tailroom)
    }

    /// Wraps caller-owned memory in a packet without copying it. The packet starts with no headroom or tailroom and
    /// covers all `length` bytes. Once the last packet sharing the memory goes away, `release_fn` is invoked with the
    /// original pointer and length. With no `release_fn`, the memory is assumed to come from a `Box<[u8]>` of exactly
    /// `length` bytes and is freed as such.
    ///
    /// Growing the packet past its edges moves the data to a heap buffer and releases the caller's memory at that
    /// point.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads and writes of `length` initialized bytes until it is released, and must not be
    /// accessed through any other path in the meantime.
    pub unsafe fn from_external(data: NonNull<u8>, length: usize, release_fn: Option<ReleaseFn>) -> Self {
        let strategy: Arc<dyn BackingStrategy> = Arc::new(ExternalBacking::new(release_fn));
        Self {
            buffer: Arc::new(BackingBuffer::from_raw_parts(data, length, strategy)),
            data: 0,
            tail: length,
            anno: Annotations::default(),
            next: None,
        }
    }

    /// Wraps an owned byte box in a packet without copying it.
    pub fn from_boxed(bytes: Box<[u8]>) -> Self {
        let length: usize = bytes.len();
        let ptr: *mut u8 = Box::into_raw(bytes) as *mut u8;
        // A zero-length box hands out a dangling pointer, which is never dereferenced for zero bytes.
        let data: NonNull<u8> = NonNull::new(ptr).unwrap_or(NonNull::dangling());
        // Safety: the box gave up `length` initialized bytes at `data`, and the default release frees them as a box.
        unsafe { Self::from_external(data, length, None) }
    }

    /// Returns the number of bytes before the data.
    pub fn headroom(&self) -> usize {
        self.data
    }

    /// Returns the number of bytes after the data.
    pub fn tailroom(&self) -> usize {
        self.buffer.len() - self.tail
    }

    /// Returns the number of data bytes.
    pub fn length(&self) -> usize {
        self.tail - self.data
    }

    /// Returns the length of the backing buffer.
    pub fn buffer_length(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the data bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer.as_slice()[self.data..self.tail]
    }

    /// Returns the whole backing buffer, headroom and tailroom included.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Returns the platform address of the start of the backing buffer.
    pub fn buffer_addr(&self) -> usize {
        self.buffer.addr()
    }

    /// Returns the platform address of the first data byte.
    pub fn data_addr(&self) -> usize {
        self.buffer.addr() + self.data
    }

    /// Returns `true` if other packets reference the same backing buffer.
    pub fn shared(&self) -> bool {
        Arc::strong_count(&self.buffer) > 1
    }

    /// Returns the number of packets referencing the backing buffer, this one included.
    pub fn sharers(&self) -> usize {
        Arc::strong_count(&self.buffer)
    }

    /// Returns the kind of strategy behind the backing buffer.
    pub fn backing_kind(&self) -> BackingKind {
        self.buffer.strategy().kind()
    }

    /// Describes the native segments of the backing buffer, if it has any.
    pub fn native_segments(&self) -> Option<Vec<SegmentInfo>> {
        self.buffer.segments()
    }

    /// Returns the data bytes for writing, first taking a private copy of the buffer if it is shared.
    pub fn data_mut(&mut self) -> Result<&mut [u8], Fail> {
        self.uniqueify()?;
        self.try_data_mut().ok_or_else(|| Fail::new(libc::EBUSY, "packet buffer is still shared"))
    }

    /// Returns the data bytes for writing, or `None` if the buffer is shared.
    pub fn try_data_mut(&mut self) -> Option<&mut [u8]> {
        let (data, tail): (usize, usize) = (self.data, self.tail);
        Arc::get_mut(&mut self.buffer).map(|buffer| &mut buffer.as_mut_slice()[data..tail])
    }

    /// Returns the annotations.
    pub fn anno(&self) -> &Annotations {
        &self.anno
    }

    /// Returns the annotations for writing. Annotations are private to each packet, so this never copies the buffer.
    pub fn anno_mut(&mut self) -> &mut Annotations {
        &mut self.anno
    }

    /// Resets every annotation, header positions included.
    pub fn clear_annotations(&mut self) {
        self.anno.clear();
    }

    /// Copies every annotation from `other`. Header positions are copied as buffer offsets, so they are only
    /// meaningful if both packets have the same layout.
    pub fn copy_annotations(&mut self, other: &Packet) {
        self.anno = other.anno.clone();
    }

    /// Returns the next packet in the chain.
    pub fn next(&self) -> Option<&Packet> {
        self.next.as_deref()
    }

    /// Returns the next packet in the chain for writing.
    pub fn next_mut(&mut self) -> Option<&mut Packet> {
        self.next.as_deref_mut()
    }

    /// Links `next` after this packet and returns the packet it replaces.
    pub fn set_next(&mut self, next: Option<Packet>) -> Option<Packet> {
        let old: Option<Box<Packet>> = ::std::mem::replace(&mut self.next, next.map(Box::new));
        old.map(|packet| *packet)
    }

    /// Unlinks and returns the next packet in the chain.
    pub fn take_next(&mut self) -> Option<Packet> {
        self.next.take().map(|packet| *packet)
    }

    /// Publishes the current window to native metadata. Shared buffers are left alone: their metadata belongs to
    /// whichever packet copies them last.
    fn sync_native(&mut self) {
        let (data, tail): (usize, usize) = (self.data, self.tail);
        if let Some(buffer) = Arc::get_mut(&mut self.buffer) {
            buffer.sync_window(data, tail);
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

/// Clone Trait Implementation for Packets
///
/// The clone shares the backing buffer and starts with a copy of the window and annotations. Chain links are not
/// cloned.
impl Clone for Packet {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            data: self.data,
            tail: self.tail,
            anno: self.anno.clone(),
            next: None,
        }
    }
}

/// Drop Trait Implementation for Packets
impl Drop for Packet {
    fn drop(&mut self) {
        // Unlink the chain first, so long chains do not recurse.
        let mut next: Option<Box<Packet>> = self.next.take();
        while let Some(mut packet) = next {
            next = packet.next.take();
        }
    }
}

/// Dereference Trait Implementation for Packets
impl Deref for Packet {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// Debug Trait Implementation for Packets
impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("headroom", &self.headroom())
            .field("length", &self.length())
            .field("tailroom", &self.tailroom())
            .field("sharers", &self.sharers())
            .field("backing", &self.backing_kind())
            .finish()
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
