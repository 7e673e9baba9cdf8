// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use super::Packet;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Read-only view of a header through one of a packet's header annotations.
///
/// Header annotations are positions, not borrows: they may point before the data (for example at a link-layer header
/// that was already pulled) or anywhere else in the buffer. Reads are limited to bytes between the start of the buffer
/// and the end of the data.
#[derive(Clone, Copy, Debug)]
pub struct HeaderRef<'a> {
    packet: &'a Packet,
    position: isize,
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl<'a> HeaderRef<'a> {
    /// Offset of the header from the first data byte. Negative if the header starts in the headroom.
    pub fn offset(&self) -> isize {
        self.position - self.packet.data as isize
    }

    /// Returns `true` if the header starts inside the data.
    pub fn in_data(&self) -> bool {
        let start: isize = self.packet.data as isize;
        let end: isize = self.packet.tail as isize;
        start <= self.position && self.position < end
    }

    /// Returns every readable byte from the header to the end of the data, or `None` if the header lies outside of
    /// the buffer or past the data.
    pub fn bytes(&self) -> Option<&'a [u8]> {
        let position: usize = usize::try_from(self.position).ok()?;
        if position > self.packet.tail {
            return None;
        }
        Some(&self.packet.buffer.as_slice()[position..self.packet.tail])
    }

    /// Returns the first `len` header bytes, or `None` if fewer are readable.
    pub fn get(&self, len: usize) -> Option<&'a [u8]> {
        self.bytes().and_then(|bytes| bytes.get(..len))
    }

    /// Reads the byte at `at` from the start of the header.
    pub fn read_u8(&self, at: usize) -> Option<u8> {
        self.bytes().and_then(|bytes| bytes.get(at).copied())
    }

    /// Reads a big-endian 16-bit word at `at` from the start of the header.
    pub fn read_u16_be(&self, at: usize) -> Option<u16> {
        let bytes: &[u8] = self.bytes()?.get(at..at.checked_add(2)?)?;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a big-endian 32-bit word at `at` from the start of the header.
    pub fn read_u32_be(&self, at: usize) -> Option<u32> {
        let bytes: &[u8] = self.bytes()?.get(at..at.checked_add(4)?)?;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl Packet {
    /// Records the link-layer header at `offset` from the first data byte.
    pub fn set_mac_header(&mut self, offset: isize) {
        self.anno.mac_header = Some(self.position_of(offset));
    }

    /// Records a network header of `header_len` bytes at `offset` from the first data byte. The transport header is
    /// recorded right after it.
    pub fn set_network_header(&mut self, offset: isize, header_len: usize) {
        let position: isize = self.position_of(offset);
        self.anno.network_header = Some(position);
        self.anno.transport_header = Some(position + header_len as isize);
    }

    /// Changes the length of the network header, moving the transport header. Does nothing if no network header is
    /// recorded.
    pub fn set_network_header_length(&mut self, header_len: usize) {
        if let Some(position) = self.anno.network_header {
            self.anno.transport_header = Some(position + header_len as isize);
        }
    }

    /// Records the transport header at `offset` from the first data byte.
    pub fn set_transport_header(&mut self, offset: isize) {
        self.anno.transport_header = Some(self.position_of(offset));
    }

    pub fn clear_mac_header(&mut self) {
        self.anno.mac_header = None;
    }

    pub fn clear_network_header(&mut self) {
        self.anno.network_header = None;
    }

    pub fn clear_transport_header(&mut self) {
        self.anno.transport_header = None;
    }

    pub fn has_mac_header(&self) -> bool {
        self.anno.mac_header.is_some()
    }

    pub fn has_network_header(&self) -> bool {
        self.anno.network_header.is_some()
    }

    pub fn has_transport_header(&self) -> bool {
        self.anno.transport_header.is_some()
    }

    /// Returns the link-layer header, if recorded.
    pub fn mac_header(&self) -> Option<HeaderRef<'_>> {
        self.anno.mac_header.map(|position| self.header_at(position))
    }

    /// Returns the network header, if recorded.
    pub fn network_header(&self) -> Option<HeaderRef<'_>> {
        self.anno.network_header.map(|position| self.header_at(position))
    }

    /// Returns the transport header, if recorded.
    pub fn transport_header(&self) -> Option<HeaderRef<'_>> {
        self.anno.transport_header.map(|position| self.header_at(position))
    }

    /// Offset of the link-layer header from the first data byte.
    pub fn mac_header_offset(&self) -> Option<isize> {
        self.mac_header().map(|header| header.offset())
    }

    /// Offset of the network header from the first data byte.
    pub fn network_header_offset(&self) -> Option<isize> {
        self.network_header().map(|header| header.offset())
    }

    /// Offset of the transport header from the first data byte.
    pub fn transport_header_offset(&self) -> Option<isize> {
        self.transport_header().map(|header| header.offset())
    }

    /// Distance from the network header to the transport header.
    pub fn network_header_length(&self) -> Option<isize> {
        Some(self.anno.transport_header? - self.anno.network_header?)
    }

    /// Number of bytes from the network header to the end of the data.
    pub fn network_length(&self) -> Option<isize> {
        self.anno.network_header.map(|position| self.tail as isize - position)
    }

    /// Number of bytes from the transport header to the end of the data.
    pub fn transport_length(&self) -> Option<isize> {
        self.anno.transport_header.map(|position| self.tail as isize - position)
    }

    fn position_of(&self, offset: isize) -> isize {
        self.data as isize + offset
    }

    fn header_at(&self, position: isize) -> HeaderRef<'_> {
        HeaderRef {
            packet: self,
            position,
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
