// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::pktcore::{
    ensure_eq,
    runtime::memory::{
        BackingStrategy,
        SegmentedBacking,
        MIN_BUFFER_LENGTH,
    },
    Packet,
    PacketAllocator,
};
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::std::sync::Arc;
use common::{
    check_layout,
    setup,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const SEEDS: u64 = 16;
const STEPS: usize = 1000;
const MAX_HANDLES: usize = 6;
const MAX_DELTA: usize = 300;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A packet alongside the bytes it is expected to hold.
struct Tracked {
    packet: Packet,
    model: Vec<u8>,
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

// Applies one random operation to a random handle and mirrors it onto the model.
fn step(rng: &mut SmallRng, handles: &mut Vec<Tracked>) -> Result<()> {
    let i: usize = rng.gen_range(0..handles.len());
    let n: usize = rng.gen_range(0..MAX_DELTA);
    match rng.gen_range(0..9) {
        0 => {
            let t: &mut Tracked = &mut handles[i];
            let before: usize = t.packet.headroom();
            let shared: bool = t.packet.shared();
            t.packet.push(n)?;
            // The bytes that appear are whatever the headroom held; overwrite them to keep the model exact.
            if n > 0 {
                let fill: u8 = rng.gen();
                t.packet.data_mut()?[..n].fill(fill);
                let mut model: Vec<u8> = vec![fill; n];
                model.extend_from_slice(&t.model);
                t.model = model;
            }
            if before >= n && !shared {
                ensure_eq!(t.packet.headroom(), before - n);
            }
        },
        1 => {
            let t: &mut Tracked = &mut handles[i];
            t.packet.put(n)?;
            let fill: u8 = rng.gen();
            let length: usize = t.packet.length();
            t.packet.data_mut()?[length - n..].fill(fill);
            t.model.extend(::std::iter::repeat(fill).take(n));
        },
        2 => {
            let t: &mut Tracked = &mut handles[i];
            if n > t.model.len() {
                ensure_eq!(t.packet.pull(n).is_err(), true);
            } else {
                t.packet.pull(n)?;
                t.model.drain(..n);
            }
        },
        3 => {
            let t: &mut Tracked = &mut handles[i];
            if n > t.model.len() {
                ensure_eq!(t.packet.take(n).is_err(), true);
            } else {
                t.packet.take(n)?;
                let length: usize = t.model.len() - n;
                t.model.truncate(length);
            }
        },
        4 => {
            let offset: isize = rng.gen_range(-(MAX_DELTA as isize)..MAX_DELTA as isize);
            handles[i].packet.shift_data(offset)?;
        },
        5 if handles.len() < MAX_HANDLES => {
            let packet: Packet = handles[i].packet.clone();
            let model: Vec<u8> = handles[i].model.clone();
            handles.push(Tracked { packet, model });
        },
        6 if handles.len() > 1 => {
            handles.swap_remove(i);
        },
        7 => {
            let t: &mut Tracked = &mut handles[i];
            if !t.model.is_empty() {
                let at: usize = rng.gen_range(0..t.model.len());
                let value: u8 = rng.gen();
                t.packet.data_mut()?[at] = value;
                t.model[at] = value;
            }
        },
        _ => {
            let extra_headroom: isize = rng.gen_range(0..64);
            let extra_tailroom: isize = rng.gen_range(0..64);
            handles[i].packet.uniqueify_with(extra_headroom, extra_tailroom)?;
            ensure_eq!(handles[i].packet.shared(), false);
        },
    }
    Ok(())
}

// Checks every handle against its model.
fn verify(handles: &[Tracked]) -> Result<()> {
    for t in handles {
        ensure_eq!(&t.packet[..], &t.model[..]);
        ensure_eq!(t.packet.buffer_length() >= MIN_BUFFER_LENGTH, true);
        check_layout(&t.packet);
    }
    Ok(())
}

fn walk(allocator: &PacketAllocator, seed: u64) -> Result<()> {
    let mut rng: SmallRng = SmallRng::seed_from_u64(seed);
    let initial: Vec<u8> = (0..rng.gen_range(0..200)).map(|_| rng.gen()).collect();
    let mut handles: Vec<Tracked> = vec![Tracked {
        packet: allocator.make_copy(&initial)?,
        model: initial,
    }];

    for _ in 0..STEPS {
        step(&mut rng, &mut handles)?;
        verify(&handles)?;
    }
    Ok(())
}

//======================================================================================================================
// Tests
//======================================================================================================================

/// Random operations on heap-backed packets and their clones.
#[test]
fn random_walk_heap() -> Result<()> {
    setup();
    let allocator: PacketAllocator = PacketAllocator::default();
    for seed in 0..SEEDS {
        walk(&allocator, seed)?;
    }
    Ok(())
}

/// Random operations on segmented packets and their clones.
#[test]
fn random_walk_segmented() -> Result<()> {
    setup();
    let strategy: Arc<dyn BackingStrategy> = Arc::new(SegmentedBacking::new(256)?);
    let allocator: PacketAllocator = PacketAllocator::new(strategy, 16);
    for seed in 0..SEEDS {
        walk(&allocator, 1000 + seed)?;
    }
    Ok(())
}
