// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::Packet;
use crate::runtime::{
    fail::Fail,
    memory::{
        PUSH_SLACK,
        SHIFT_ALIGNMENT,
    },
};
use ::std::sync::{
    atomic::{
        AtomicUsize,
        Ordering,
    },
    Arc,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Number of slow-path warnings reported per process for each of push and put.
const EXPENSIVE_WARNING_LIMIT: usize = 5;

//======================================================================================================================
// Static Variables
//======================================================================================================================

static EXPENSIVE_PUSH_WARNINGS: AtomicUsize = AtomicUsize::new(0);
static EXPENSIVE_PUT_WARNINGS: AtomicUsize = AtomicUsize::new(0);

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Packet {
    /// Extends the data by `nbytes` at the front. The new bytes are whatever the headroom held.
    ///
    /// This is cheap if the buffer is not shared and the headroom fits `nbytes`. Otherwise the packet is moved to a
    /// private buffer with `nbytes` plus some slack of extra headroom, so later pushes are cheap again. On failure the
    /// packet is left as it was.
    pub fn push(&mut self, nbytes: usize) -> Result<(), Fail> {
        if !self.shared() && nbytes <= self.headroom() {
            self.data -= nbytes;
            self.sync_native();
            return Ok(());
        }
        self.expensive_push(nbytes)
    }

    /// Same as [Packet::push()], but writes into the headroom even if the buffer is shared. The caller must know the
    /// pushed bytes are not used by the other sharers.
    pub fn nonunique_push(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes <= self.headroom() {
            self.data -= nbytes;
            self.sync_native();
            return Ok(());
        }
        self.expensive_push(nbytes)
    }

    /// Consuming variant of [Packet::push()]: on failure the packet is dropped along with the handle.
    pub fn into_pushed(mut self, nbytes: usize) -> Result<Self, Fail> {
        self.push(nbytes)?;
        Ok(self)
    }

    /// Extends the data by `nbytes` at the end. The new bytes are whatever the tailroom held.
    ///
    /// Same costs as [Packet::push()], mirrored onto the tailroom.
    pub fn put(&mut self, nbytes: usize) -> Result<(), Fail> {
        if !self.shared() && nbytes <= self.tailroom() {
            self.tail += nbytes;
            self.sync_native();
            return Ok(());
        }
        self.expensive_put(nbytes)
    }

    /// Same as [Packet::put()], but writes into the tailroom even if the buffer is shared.
    pub fn nonunique_put(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes <= self.tailroom() {
            self.tail += nbytes;
            self.sync_native();
            return Ok(());
        }
        self.expensive_put(nbytes)
    }

    /// Consuming variant of [Packet::put()]: on failure the packet is dropped along with the handle.
    pub fn into_put(mut self, nbytes: usize) -> Result<Self, Fail> {
        self.put(nbytes)?;
        Ok(self)
    }

    /// Removes `nbytes` from the front of the data. Never copies, even if the buffer is shared. Header annotations
    /// are left alone. Fails with `EINVAL` if the data holds fewer than `nbytes`.
    pub fn pull(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.length() {
            let cause: String = format!("cannot pull {} bytes from a packet of {}", nbytes, self.length());
            error!("pull(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        self.data += nbytes;
        self.sync_native();
        Ok(())
    }

    /// Removes `nbytes` from the end of the data. Never copies, even if the buffer is shared. Fails with `EINVAL` if
    /// the data holds fewer than `nbytes`.
    pub fn take(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.length() {
            let cause: String = format!("cannot take {} bytes from a packet of {}", nbytes, self.length());
            error!("take(): {}", cause);
            return Err(Fail::new(libc::EINVAL, &cause));
        }
        self.tail -= nbytes;
        self.sync_native();
        Ok(())
    }

    /// Moves the data (and header annotations) `offset` bytes within the buffer: towards the front if negative,
    /// towards the end if positive. Content and length are preserved. Typically used to align headers.
    ///
    /// If the buffer is shared or the room on the destination side is too small, the packet is moved to a private
    /// buffer laid out so that the data address keeps the alignment, modulo 8, that the in-place shift would have
    /// given it.
    pub fn shift_data(&mut self, offset: isize) -> Result<(), Fail> {
        if offset == 0 {
            return Ok(());
        }

        let fits: bool = if offset < 0 {
            offset.unsigned_abs() <= self.headroom()
        } else {
            offset.unsigned_abs() <= self.tailroom()
        };
        if fits {
            let (data, tail): (usize, usize) = (self.data, self.tail);
            let new_data: usize = data.wrapping_add_signed(offset);
            let new_tail: usize = tail.wrapping_add_signed(offset);
            if let Some(buffer) = Arc::get_mut(&mut self.buffer) {
                buffer.as_mut_slice().copy_within(data..tail, new_data);
                buffer.sync_window(new_data, new_tail);
                self.data = new_data;
                self.tail = new_tail;
                self.anno.shift_header_annotations(offset);
                return Ok(());
            }
        }

        // Pick the extra headroom so the new data address is congruent to (old data address + offset). The
        // replacement buffer is aligned at least as strictly as `SHIFT_ALIGNMENT`.
        let mask: usize = SHIFT_ALIGNMENT - 1;
        let headroom: isize = self.headroom() as isize;
        let extras: Option<(isize, isize)> = if offset < 0 {
            let extra_headroom: Option<isize> = if offset.unsigned_abs() > headroom.unsigned_abs() {
                Some(-headroom + (self.data_addr().wrapping_add_signed(offset) & mask) as isize)
            } else {
                offset.checked_add((self.buffer_addr() & mask) as isize)
            };
            extra_headroom.zip(offset.checked_neg())
        } else {
            offset.checked_add((self.buffer_addr() & mask) as isize).map(|extra| (extra, 0))
        };

        match extras {
            Some((extra_headroom, extra_tailroom)) => self.expensive_uniqueify(extra_headroom, extra_tailroom),
            None => panic!("shift_data(): capacity overflow (headroom={}, offset={})", headroom, offset),
        }
    }

    /// Consuming variant of [Packet::shift_data()]: on failure the packet is dropped along with the handle.
    pub fn into_shifted(mut self, offset: isize) -> Result<Self, Fail> {
        self.shift_data(offset)?;
        Ok(self)
    }

    fn expensive_push(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.headroom() && Self::should_warn(&EXPENSIVE_PUSH_WARNINGS) {
            warn!("push(): expensive push; have {} wanted {}", self.headroom(), nbytes);
        }
        let extra: isize = match nbytes.checked_add(PUSH_SLACK).and_then(round_up_4).map(isize::try_from) {
            Some(Ok(extra)) => extra,
            _ => panic!("push(): capacity overflow (headroom={}, nbytes={})", self.headroom(), nbytes),
        };
        self.expensive_uniqueify(extra, 0)?;
        self.data -= nbytes;
        self.sync_native();
        Ok(())
    }

    fn expensive_put(&mut self, nbytes: usize) -> Result<(), Fail> {
        if nbytes > self.tailroom() && Self::should_warn(&EXPENSIVE_PUT_WARNINGS) {
            warn!("put(): expensive put; have {} wanted {}", self.tailroom(), nbytes);
        }
        let extra: isize = match nbytes.checked_add(PUSH_SLACK).map(isize::try_from) {
            Some(Ok(extra)) => extra,
            _ => panic!("put(): capacity overflow (tailroom={}, nbytes={})", self.tailroom(), nbytes),
        };
        self.expensive_uniqueify(0, extra)?;
        self.tail += nbytes;
        self.sync_native();
        Ok(())
    }

    fn should_warn(counter: &AtomicUsize) -> bool {
        counter.fetch_add(1, Ordering::Relaxed) < EXPENSIVE_WARNING_LIMIT
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn round_up_4(n: usize) -> Option<usize> {
    n.checked_add(3).map(|n| n & !3)
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
