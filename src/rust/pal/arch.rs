// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

// This file is for CPU architecture-specific things.

// ------------------------
// CPU Data Cache Line Size
// ------------------------
cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 64;
    } else if #[cfg(any(all(target_arch = "aarch64", target_vendor = "apple"), target_arch = "powerpc64"))] {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 128;
    } else {
        pub const CPU_DATA_CACHE_LINE_SIZE: usize = 64;
    }
}

// ---------------------------
// Packet Allocation Alignment
// ---------------------------
// Heap-backed packet buffers start on a cache line, so the low bits of a fresh buffer address are always zero.  The
// data-shift fallback relies on buffers being at least `SHIFT_ALIGNMENT` aligned.
pub const PACKET_BUFFER_ALIGNMENT: usize = CPU_DATA_CACHE_LINE_SIZE;

const _: () = assert!(PACKET_BUFFER_ALIGNMENT.is_power_of_two());
