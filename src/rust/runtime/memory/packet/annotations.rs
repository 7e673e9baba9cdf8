// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::Fail;
use ::std::{
    net::Ipv4Addr,
    ops::Range,
    time::{
        Duration,
        SystemTime,
        UNIX_EPOCH,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Size of the address annotation area.
pub const ADDR_ANNO_SIZE: usize = 16;

/// Size of the user annotation area.
pub const USER_ANNO_SIZE: usize = 24;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Packet class tag, telling whether a packet is meant for this host, broadcast, multicast, and so on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    #[default]
    Host = 0,
    Broadcast = 1,
    Multicast = 2,
    OtherHost = 3,
    Outgoing = 4,
    Loopback = 5,
    FastRoute = 6,
}

/// Per-packet annotations.
///
/// Annotations are copied when a packet is cloned and are independent from then on. Header positions are kept as
/// offsets from the start of the backing buffer (not from the packet data), so they stay put when the window moves
/// and are re-based whenever the bytes themselves move. A header position is only a hint: it may be outside the
/// current window, or even outside the buffer, and must be bounds-checked before use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations {
    pub(super) mac_header: Option<isize>,
    pub(super) network_header: Option<isize>,
    pub(super) transport_header: Option<isize>,
    timestamp: Duration,
    packet_type: PacketType,
    address: [u8; ADDR_ANNO_SIZE],
    user: [u8; USER_ANNO_SIZE],
}

//======================================================================================================================
// Associated Functions
//======================================================================================================================

impl Annotations {
    /// Resets every annotation to zero or null.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Moves every non-null header position by `delta` bytes. Null positions stay null.
    pub fn shift_header_annotations(&mut self, delta: isize) {
        for header in [&mut self.mac_header, &mut self.network_header, &mut self.transport_header] {
            if let Some(position) = header {
                *position += delta;
            }
        }
    }

    /// Time since the Unix epoch at which the packet was stamped. Zero means unset.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn set_timestamp(&mut self, timestamp: Duration) {
        self.timestamp = timestamp;
    }

    /// Stamps the packet with the current system time.
    pub fn set_timestamp_now(&mut self) {
        // A clock set before the epoch leaves the timestamp unset.
        self.timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn set_packet_type(&mut self, packet_type: PacketType) {
        self.packet_type = packet_type;
    }

    /// Address annotation area. Routing stages usually store a next-hop address here.
    pub fn address(&self) -> &[u8; ADDR_ANNO_SIZE] {
        &self.address
    }

    pub fn address_mut(&mut self) -> &mut [u8; ADDR_ANNO_SIZE] {
        &mut self.address
    }

    /// Reads the address annotation as an IPv4 destination address.
    pub fn dst_ip_anno(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.address[0], self.address[1], self.address[2], self.address[3])
    }

    /// Stores an IPv4 destination address in the address annotation.
    pub fn set_dst_ip_anno(&mut self, addr: Ipv4Addr) {
        self.address[..4].copy_from_slice(&addr.octets());
    }

    /// User annotation area, uninterpreted by the packet core.
    pub fn user(&self) -> &[u8; USER_ANNO_SIZE] {
        &self.user
    }

    pub fn user_mut(&mut self) -> &mut [u8; USER_ANNO_SIZE] {
        &mut self.user
    }

    /// Reads the `index`-th 16-bit word of the user area.
    pub fn user_u16(&self, index: usize) -> Result<u16, Fail> {
        let bytes: [u8; 2] = Self::user_word(&self.user, index)?;
        Ok(u16::from_le_bytes(bytes))
    }

    /// Writes the `index`-th 16-bit word of the user area.
    pub fn set_user_u16(&mut self, index: usize, value: u16) -> Result<(), Fail> {
        Self::set_user_word(&mut self.user, index, value.to_le_bytes())
    }

    /// Reads the `index`-th 32-bit word of the user area.
    pub fn user_u32(&self, index: usize) -> Result<u32, Fail> {
        let bytes: [u8; 4] = Self::user_word(&self.user, index)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Writes the `index`-th 32-bit word of the user area.
    pub fn set_user_u32(&mut self, index: usize, value: u32) -> Result<(), Fail> {
        Self::set_user_word(&mut self.user, index, value.to_le_bytes())
    }

    // Byte range of the `index`-th `N`-byte word, or `None` if it cannot be represented.
    fn user_range<const N: usize>(index: usize) -> Option<Range<usize>> {
        let start: usize = index.checked_mul(N)?;
        Some(start..start.checked_add(N)?)
    }

    fn user_word<const N: usize>(user: &[u8; USER_ANNO_SIZE], index: usize) -> Result<[u8; N], Fail> {
        let range: Option<Range<usize>> = Self::user_range::<N>(index);
        match range.and_then(|range| user.get(range)) {
            Some(bytes) => {
                let mut word: [u8; N] = [0; N];
                word.copy_from_slice(bytes);
                Ok(word)
            },
            None => Err(Fail::new(libc::EINVAL, "user annotation index out of range")),
        }
    }

    fn set_user_word<const N: usize>(user: &mut [u8; USER_ANNO_SIZE], index: usize, word: [u8; N]) -> Result<(), Fail> {
        let range: Option<Range<usize>> = Self::user_range::<N>(index);
        match range.and_then(|range| user.get_mut(range)) {
            Some(bytes) => {
                bytes.copy_from_slice(&word);
                Ok(())
            },
            None => Err(Fail::new(libc::EINVAL, "user annotation index out of range")),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl TryFrom<u8> for PacketType {
    type Error = Fail;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Host),
            1 => Ok(PacketType::Broadcast),
            2 => Ok(PacketType::Multicast),
            3 => Ok(PacketType::OtherHost),
            4 => Ok(PacketType::Outgoing),
            5 => Ok(PacketType::Loopback),
            6 => Ok(PacketType::FastRoute),
            _ => Err(Fail::new(libc::EINVAL, "unknown packet type")),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
