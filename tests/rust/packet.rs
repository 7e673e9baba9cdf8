// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::pktcore::{
    ensure_eq,
    ensure_neq,
    runtime::memory::{
        BackingStrategy,
        SegmentInfo,
        SegmentedBacking,
        MIN_BUFFER_LENGTH,
        PUSH_SLACK,
    },
    Config,
    Packet,
    PacketAllocator,
    PacketType,
};
use ::std::{
    net::Ipv4Addr,
    sync::Arc,
};
use common::{
    check_layout,
    setup,
    BudgetBacking,
};

//======================================================================================================================
// Construction
//======================================================================================================================

/// Tests that a small packet is padded to the minimum buffer length and that a push within the headroom is cheap.
#[test]
fn make_then_push_in_place() -> Result<()> {
    setup();
    let mut p: Packet = Packet::make(4, Some(b"ABCD"), 4, 4)?;
    ensure_eq!(p.buffer_length(), MIN_BUFFER_LENGTH);
    ensure_eq!(p.headroom(), 4);
    ensure_eq!(p.length(), 4);

    let addr: usize = p.buffer_addr();
    p.push(2)?;
    ensure_eq!(p.headroom(), 2);
    ensure_eq!(p.length(), 6);
    ensure_eq!(p.buffer_addr(), addr);
    ensure_eq!(&p[2..], b"ABCD");
    check_layout(&p);
    Ok(())
}

/// Tests that a clone outlives the packet it was cloned from.
#[test]
fn clone_outlives_original() -> Result<()> {
    setup();
    let p: Packet = Packet::from_slice(16, b"payload", 16)?;
    let q: Packet = p.clone();
    ensure_eq!(q.sharers(), 2);
    drop(p);
    ensure_eq!(q.sharers(), 1);
    ensure_eq!(&q[..], b"payload");
    Ok(())
}

//======================================================================================================================
// Header Processing
//======================================================================================================================

/// Walks a frame down and back up the stack, the way a router would.
#[test]
fn decapsulate_and_encapsulate() -> Result<()> {
    setup();
    let mut frame: Vec<u8> = vec![0u8; 14 + 20 + 8];
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    frame[14] = 0x45;
    frame[30..34].copy_from_slice(&[192, 168, 1, 1]);

    let mut p: Packet = Packet::from_slice(0, &frame, 0)?;
    p.set_mac_header(0);
    p.set_network_header(14, 20);
    p.pull(14)?;
    ensure_eq!(p.network_header_offset(), Some(0));
    ensure_eq!(p.mac_header().and_then(|h| h.read_u16_be(12)), Some(0x0800));

    let dst: Option<u32> = p.network_header().and_then(|h| h.read_u32_be(16));
    p.anno_mut().set_dst_ip_anno(Ipv4Addr::from(dst.unwrap_or_default()));
    p.anno_mut().set_packet_type(PacketType::OtherHost);
    ensure_eq!(p.anno().dst_ip_anno(), Ipv4Addr::new(192, 168, 1, 1));

    // No headroom left: re-adding a bigger link header reallocates once.
    p.push(14 + 4)?;
    ensure_eq!(p.length(), 14 + 4 + 28);
    ensure_eq!(p.network_header_offset(), Some(18));
    ensure_eq!(p.transport_header_offset(), Some(38));
    ensure_eq!(p.network_header().and_then(|h| h.read_u8(0)), Some(0x45));
    ensure_eq!(p.anno().packet_type(), PacketType::OtherHost);
    check_layout(&p);
    Ok(())
}

/// Tests that pull and take on a shared packet never copy, and that the other sharer does not see the change.
#[test]
fn pull_take_shared() -> Result<()> {
    setup();
    let p: Packet = Packet::from_slice(0, b"0123456789", 0)?;
    let mut q: Packet = p.clone();
    q.pull(2)?;
    q.take(2)?;
    ensure_eq!(q.buffer_addr(), p.buffer_addr());
    ensure_eq!(&q[..], b"234567");
    ensure_eq!(&p[..], b"0123456789");
    Ok(())
}

//======================================================================================================================
// Copy-On-Write
//======================================================================================================================

/// Tests that writes after a clone are private to the writer.
#[test]
fn writes_are_private() -> Result<()> {
    setup();
    let mut p: Packet = Packet::from_slice(8, b"original", 8)?;
    let q: Packet = p.clone();

    p.data_mut()?[0] = b'O';
    ensure_eq!(&p[..], b"Original");
    ensure_eq!(&q[..], b"original");
    ensure_neq!(p.buffer_addr(), q.buffer_addr());
    ensure_eq!(p.shared() || q.shared(), false);
    Ok(())
}

/// Tests that annotations are copied on clone and then evolve independently.
#[test]
fn annotations_are_independent() -> Result<()> {
    setup();
    let mut p: Packet = Packet::make_default(20)?;
    p.anno_mut().set_user_u32(0, 1)?;
    p.anno_mut().set_packet_type(PacketType::Multicast);

    let mut q: Packet = p.clone();
    q.anno_mut().set_user_u32(0, 2)?;
    q.clear_annotations();
    ensure_eq!(p.anno().user_u32(0)?, 1);
    ensure_eq!(p.anno().packet_type(), PacketType::Multicast);
    ensure_eq!(q.anno().packet_type(), PacketType::Host);

    q.copy_annotations(&p);
    ensure_eq!(q.anno(), p.anno());
    Ok(())
}

//======================================================================================================================
// Allocation Failure
//======================================================================================================================

/// Tests that a failed constructor reports out of memory.
#[test]
fn make_out_of_memory() -> Result<()> {
    setup();
    let strategy: Arc<dyn BackingStrategy> = BudgetBacking::new(0);
    let errno: Option<i32> = Packet::make_in(&strategy, 0, None, 10, 0).map_err(|e| e.errno).err();
    ensure_eq!(errno, Some(libc::ENOMEM));
    Ok(())
}

/// Tests that failed mutations leave the packet exactly as it was.
#[test]
fn failed_growth_leaves_packet_untouched() -> Result<()> {
    setup();
    let budget: Arc<BudgetBacking> = BudgetBacking::new(1);
    let strategy: Arc<dyn BackingStrategy> = budget.clone();
    let mut p: Packet = Packet::make_in(&strategy, 2, Some(b"keep"), 4, 2)?;
    p.set_network_header(0, 4);
    let (addr, headroom, tailroom): (usize, usize, usize) = (p.buffer_addr(), p.headroom(), p.tailroom());

    ensure_eq!(p.push(100).map_err(|e| e.errno), Err(libc::ENOMEM));
    ensure_eq!(p.put(500).map_err(|e| e.errno), Err(libc::ENOMEM));
    ensure_eq!(p.shift_data(-8).map_err(|e| e.errno), Err(libc::ENOMEM));
    ensure_eq!(p.buffer_addr(), addr);
    ensure_eq!((p.headroom(), p.tailroom()), (headroom, tailroom));
    ensure_eq!(&p[..], b"keep");
    ensure_eq!(p.network_header_offset(), Some(0));

    // A shared packet stays shared.
    let q: Packet = p.clone();
    ensure_eq!(p.uniqueify().is_err(), true);
    ensure_eq!(p.shared(), true);
    ensure_eq!(p.data_mut().is_err(), true);
    drop(q);

    budget.refill(1);
    p.push(100)?;
    ensure_eq!(&p[100..], b"keep");
    Ok(())
}

/// Tests that the consuming variants drop the packet on failure.
#[test]
fn consuming_variants_drop_on_failure() -> Result<()> {
    setup();
    let strategy: Arc<dyn BackingStrategy> = BudgetBacking::new(1);
    let p: Packet = Packet::make_in(&strategy, 0, Some(b"gone"), 4, 0)?;
    let witness: Packet = p.clone();

    ensure_eq!(p.into_pushed(8).is_err(), true);
    ensure_eq!(witness.shared(), false);
    ensure_eq!(witness.clone().into_unique(0, 0).is_err(), true);
    ensure_eq!(witness.shared(), false);
    Ok(())
}

//======================================================================================================================
// Growth
//======================================================================================================================

/// Tests that a run of small pushes only reallocates once, thanks to the push slack.
#[test]
fn pushes_amortize() -> Result<()> {
    setup();
    let mut p: Packet = Packet::from_slice(0, b"x", 0)?;
    p.push(1)?;
    let addr: usize = p.buffer_addr();
    for _ in 0..PUSH_SLACK / 4 {
        p.push(4)?;
    }
    ensure_eq!(p.buffer_addr(), addr);
    ensure_eq!(p.length(), 2 + PUSH_SLACK);
    check_layout(&p);
    Ok(())
}

/// Tests that segmented packets keep their native descriptors in step with the window.
#[test]
fn segmented_descriptors_follow_window() -> Result<()> {
    setup();
    let strategy: Arc<dyn BackingStrategy> = Arc::new(SegmentedBacking::new(128)?);
    let allocator: PacketAllocator = PacketAllocator::new(strategy, 32);
    let mut p: Packet = allocator.make_copy(&[1u8; 300])?;

    let check = |p: &Packet| -> Result<()> {
        let segments: Vec<SegmentInfo> = p.native_segments().unwrap_or_default();
        let total: usize = segments.iter().map(|s| s.data_len as usize).sum();
        ensure_eq!(total, p.length());
        ensure_eq!(segments.first().map(|s| s.pkt_len as usize), Some(p.length()));
        Ok(())
    };

    check(&p)?;
    p.pull(40)?;
    check(&p)?;
    p.take(10)?;
    check(&p)?;
    p.push(64)?;
    check(&p)?;
    p.shift_data(8)?;
    check(&p)?;

    // The descriptors of a shared buffer describe whoever wrote them last; a private copy gets its own.
    let mut q: Packet = p.clone();
    q.put(1000)?;
    check(&q)?;
    ensure_eq!(q.native_segments().map(|s| s.len()), Some(q.buffer_length().div_ceil(128)));
    Ok(())
}

/// Tests that the allocator can be configured from a file.
#[test]
fn allocator_from_config() -> Result<()> {
    setup();
    let path: ::std::path::PathBuf = ::std::env::temp_dir().join(format!("pktcore-{}.yaml", ::std::process::id()));
    ::std::fs::write(&path, "packet_buffer:\n  backing: heap\n  default_headroom: 64\n")?;
    let config: Result<Config, _> = Config::new(&path.to_string_lossy());
    ::std::fs::remove_file(&path)?;

    let allocator: PacketAllocator = PacketAllocator::from_config(&config?)?;
    let p: Packet = allocator.make_default(0)?;
    ensure_eq!(p.headroom(), 64);
    Ok(())
}
