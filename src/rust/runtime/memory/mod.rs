// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod allocator;
mod backing;
mod packet;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    allocator::PacketAllocator,
    backing::{
        BackingBuffer,
        BackingKind,
        BackingStrategy,
        ExternalBacking,
        HeapBacking,
        ReleaseFn,
        SegmentInfo,
        SegmentedBacking,
        DEFAULT_SEGMENT_SIZE,
    },
    packet::{
        Annotations,
        HeaderRef,
        Packet,
        PacketType,
        ADDR_ANNO_SIZE,
        USER_ANNO_SIZE,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Smallest backing buffer handed out by packet constructors. Smaller requests get extra tailroom.
pub const MIN_BUFFER_LENGTH: usize = 64;

/// Headroom reserved by default constructors: room for an Ethernet header plus a 14-byte encapsulation, rounded so
/// that the IP header that follows is 4-byte aligned.
pub const DEFAULT_HEADROOM: usize = 28;

/// Extra room added on top of the request when push or put must reallocate.
pub const PUSH_SLACK: usize = 128;

/// Alignment preserved by data shifts that have to reallocate.
pub const SHIFT_ALIGNMENT: usize = 8;
