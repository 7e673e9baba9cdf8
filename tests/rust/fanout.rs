// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::crossbeam_channel::{
    self,
    Receiver,
    Sender,
};
use ::pktcore::Packet;
use ::std::thread::{
    self,
    JoinHandle,
};
use common::{
    check_layout,
    setup,
};

//======================================================================================================================
// Constants
//======================================================================================================================

const NWORKERS: usize = 8;
const ROUNDS: usize = 64;
const PAYLOAD: &[u8] = b"the quick brown fox jumps over the lazy dog";

//======================================================================================================================
// Tests
//======================================================================================================================

/// Hands clones of one packet to several threads, each of which prepends its own header. The original payload must
/// come back intact in every result, and the source packet must be untouched.
#[test]
fn fanout_clones_across_threads() {
    setup();
    let source: Packet = match Packet::from_slice(0, PAYLOAD, 0) {
        Ok(p) => p,
        Err(e) => panic!("from_slice() failed: {:?}", e),
    };

    let (result_tx, result_rx): (Sender<(usize, Packet)>, Receiver<(usize, Packet)>) = crossbeam_channel::unbounded();
    let mut workers: Vec<(Sender<Packet>, JoinHandle<()>)> = Vec::with_capacity(NWORKERS);
    for id in 0..NWORKERS {
        let (tx, rx): (Sender<Packet>, Receiver<Packet>) = crossbeam_channel::unbounded();
        let result_tx: Sender<(usize, Packet)> = result_tx.clone();
        let handle: JoinHandle<()> = thread::spawn(move || {
            for mut p in rx.iter() {
                if let Err(e) = p.push(2) {
                    panic!("push() failed: {:?}", e);
                }
                match p.try_data_mut() {
                    Some(data) => data[..2].copy_from_slice(&(id as u16).to_be_bytes()),
                    None => panic!("pushed packet is still shared"),
                }
                if result_tx.send((id, p)).is_err() {
                    break;
                }
            }
        });
        workers.push((tx, handle));
    }
    drop(result_tx);

    for _ in 0..ROUNDS {
        for (tx, _) in workers.iter() {
            if let Err(e) = tx.send(source.clone()) {
                panic!("send() failed: {:?}", e);
            }
        }
    }

    let mut received: usize = 0;
    for _ in 0..NWORKERS * ROUNDS {
        let (id, p): (usize, Packet) = match result_rx.recv() {
            Ok(result) => result,
            Err(e) => panic!("recv() failed: {:?}", e),
        };
        assert_eq!(p.length(), PAYLOAD.len() + 2);
        assert_eq!(&p[..2], &(id as u16).to_be_bytes());
        assert_eq!(&p[2..], PAYLOAD);
        check_layout(&p);
        received += 1;
    }
    assert_eq!(received, NWORKERS * ROUNDS);

    for (tx, handle) in workers {
        drop(tx);
        if let Err(e) = handle.join() {
            panic!("worker panicked: {:?}", e);
        }
    }

    // Every clone was either copied or dropped, so the source is alone again.
    assert!(!source.shared());
    assert_eq!(&source[..], PAYLOAD);
    assert_eq!(source.headroom(), 0);
}

/// Drops clones of one packet concurrently from many threads. The buffer must be released exactly once, which the
/// allocator would notice otherwise.
#[test]
fn concurrent_release() {
    setup();
    for _ in 0..ROUNDS {
        let source: Packet = match Packet::make_default(1500) {
            Ok(p) => p,
            Err(e) => panic!("make_default() failed: {:?}", e),
        };
        let handles: Vec<JoinHandle<usize>> = (0..NWORKERS)
            .map(|_| {
                let p: Packet = source.clone();
                thread::spawn(move || p.length())
            })
            .collect();
        drop(source);
        for handle in handles {
            match handle.join() {
                Ok(length) => assert_eq!(length, 1500),
                Err(e) => panic!("worker panicked: {:?}", e),
            }
        }
    }
}
