// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::{
    config::Config,
    fail::Fail,
    memory::{
        BackingKind,
        BackingStrategy,
        HeapBacking,
        Packet,
        SegmentedBacking,
        DEFAULT_HEADROOM,
    },
};
use ::std::sync::Arc;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Packet Allocator
///
/// Creates packets from a fixed backing strategy with a configured default headroom.
#[derive(Clone, Debug)]
pub struct PacketAllocator {
    strategy: Arc<dyn BackingStrategy>,
    default_headroom: usize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl PacketAllocator {
    pub fn new(strategy: Arc<dyn BackingStrategy>, default_headroom: usize) -> Self {
        Self {
            strategy,
            default_headroom,
        }
    }

    /// Builds an allocator from the packet buffer section of `config`.
    pub fn from_config(config: &Config) -> Result<Self, Fail> {
        let strategy: Arc<dyn BackingStrategy> = match config.backing()? {
            BackingKind::Heap => HeapBacking::shared(),
            BackingKind::Segmented => Arc::new(SegmentedBacking::new(config.segment_size()?)?),
            BackingKind::External => {
                let cause: &str = "external memory cannot back an allocator";
                error!("from_config(): {}", cause);
                return Err(Fail::new(libc::EINVAL, cause));
            },
        };
        let default_headroom: usize = config.default_headroom()?;
        info!(
            "from_config(): backing={}, default_headroom={}",
            strategy.kind(),
            default_headroom
        );
        Ok(Self::new(strategy, default_headroom))
    }

    /// Returns the strategy new packets are allocated from.
    pub fn strategy(&self) -> &Arc<dyn BackingStrategy> {
        &self.strategy
    }

    pub fn default_headroom(&self) -> usize {
        self.default_headroom
    }

    /// Same as [Packet::make()], but allocates from this allocator's strategy.
    pub fn make(&self, headroom: usize, data: Option<&[u8]>, length: usize, tailroom: usize) -> Result<Packet, Fail> {
        Packet::make_in(&self.strategy, headroom, data, length, tailroom)
    }

    /// Creates a zero-filled packet with `length` data bytes and the default headroom.
    pub fn make_default(&self, length: usize) -> Result<Packet, Fail> {
        self.make(self.default_headroom, None, length, 0)
    }

    /// Creates a packet holding a copy of `bytes` with the default headroom.
    pub fn make_copy(&self, bytes: &[u8]) -> Result<Packet, Fail> {
        self.make(self.default_headroom, Some(bytes), bytes.len(), 0)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for PacketAllocator {
    fn default() -> Self {
        Self::new(HeapBacking::shared(), DEFAULT_HEADROOM)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
