// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::Packet;
use crate::runtime::{
    fail::Fail,
    memory::{
        backing::BackingBuffer,
        MIN_BUFFER_LENGTH,
    },
};
use ::std::sync::Arc;

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Packet {
    /// Makes sure this packet holds the only reference to its backing buffer, copying the buffer if it is shared.
    ///
    /// On failure the packet is left exactly as it was.
    pub fn uniqueify(&mut self) -> Result<(), Fail> {
        if !self.shared() {
            return Ok(());
        }
        self.expensive_uniqueify(0, 0)
    }

    /// Same as [Packet::uniqueify()], but also grows (or, with negative values, shrinks) the headroom and tailroom by
    /// the given amounts. A resize always reallocates, even if the buffer is not shared.
    ///
    /// Shrinking past the data is a programming error and panics: `extra_headroom` must be at least `-headroom()` and
    /// `extra_tailroom` at least `-tailroom()`.
    pub fn uniqueify_with(&mut self, extra_headroom: isize, extra_tailroom: isize) -> Result<(), Fail> {
        if !self.shared() && extra_headroom == 0 && extra_tailroom == 0 {
            return Ok(());
        }
        self.expensive_uniqueify(extra_headroom, extra_tailroom)
    }

    /// Consuming variant of [Packet::uniqueify_with()]: on failure the packet is dropped along with the handle.
    pub fn into_unique(mut self, extra_headroom: isize, extra_tailroom: isize) -> Result<Self, Fail> {
        self.uniqueify_with(extra_headroom, extra_tailroom)?;
        Ok(self)
    }

    /// Moves the packet into a private buffer with the requested extra headroom and tailroom.
    ///
    /// The bytes of the old buffer, minus whatever a negative extra trims from either end, are copied so that old
    /// offset `o` lands at new offset `o + extra_headroom`. Header annotations move with the bytes. Other packets that
    /// shared the old buffer keep it.
    pub(super) fn expensive_uniqueify(&mut self, extra_headroom: isize, extra_tailroom: isize) -> Result<(), Fail> {
        let headroom: isize = self.headroom() as isize;
        let tailroom: isize = self.tailroom() as isize;
        assert!(
            extra_headroom >= -headroom && extra_tailroom >= -tailroom,
            "uniqueify(): cannot trim into packet data (headroom={}, extra_headroom={}, tailroom={}, extra_tailroom={})",
            headroom,
            extra_headroom,
            tailroom,
            extra_tailroom
        );

        let length: usize = self.length();
        let old_size: usize = self.buffer.len();
        let layout: Option<(usize, usize)> = headroom
            .checked_add(extra_headroom)
            .zip(tailroom.checked_add(extra_tailroom))
            .and_then(|(new_headroom, new_tailroom)| {
                let size: usize = (new_headroom as usize)
                    .checked_add(length)?
                    .checked_add(new_tailroom as usize)?;
                Some((new_headroom as usize, size.max(MIN_BUFFER_LENGTH)))
            });
        let (new_headroom, size): (usize, usize) = match layout {
            Some(layout) => layout,
            None => panic!(
                "uniqueify(): capacity overflow (headroom={}, extra_headroom={}, tailroom={}, extra_tailroom={})",
                headroom, extra_headroom, tailroom, extra_tailroom
            ),
        };

        let start_copy: usize = (-extra_headroom).max(0) as usize;
        let end_copy: usize = (old_size as isize + extra_tailroom.min(0)) as usize;
        let dst: usize = extra_headroom.max(0) as usize;

        trace!(
            "uniqueify(): sharers={}, old_size={}, new_size={}, extra_headroom={}, extra_tailroom={}",
            self.sharers(),
            old_size,
            size,
            extra_headroom,
            extra_tailroom
        );

        let mut buffer: BackingBuffer = match self.buffer.resize_with_copy(size, start_copy..end_copy, dst) {
            Ok(buffer) => buffer,
            Err(e) => {
                error!("uniqueify(): {:?}", e);
                return Err(e);
            },
        };

        let data: usize = new_headroom;
        let tail: usize = data + length;
        buffer.sync_window(data, tail);

        // Replacing the handle drops our reference to the old buffer, releasing it if no one else holds it.
        self.buffer = Arc::new(buffer);
        self.data = data;
        self.tail = tail;
        self.anno.shift_header_annotations(extra_headroom);
        Ok(())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
