//! Capture bytes through the full node pipeline

use canlogic::runtime::{Receiver, Scheduler, channel};
use canlogic::{
    CanDecoder, CaptureSource, DecodeSnapshot, DecoderConfig, FieldName, FrameType, ProcessNode,
    WorkResult,
};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn record(level: u8, timestamp: u32) -> Vec<u8> {
    let mut bytes = vec![0x11, level, 0x01, 0x00];
    bytes.extend(timestamp.to_le_bytes());
    bytes
}

fn bits(text: &str) -> Vec<u8> {
    text.bytes()
        .filter(|b| matches!(b, b'0' | b'1'))
        .map(|b| b - b'0')
        .collect()
}

/// Bus bits with stuffing applied, as a capture device would see them
fn stuffed(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut last = None;
    let mut run = 0;
    for &bit in payload {
        if last == Some(bit) {
            run += 1;
        } else {
            last = Some(bit);
            run = 1;
        }
        out.push(bit);
        if run == 5 {
            out.push(1 - bit);
            last = Some(1 - bit);
            run = 1;
        }
    }
    out
}

/// One record at t=0, then an edge at the end of every run, 20 ticks per bit
fn capture(raw: &[u8]) -> Vec<u8> {
    let mut bytes = record(raw[0], 0);
    let mut timestamp = 0;
    for run in raw.chunk_by(|a, b| a == b) {
        timestamp += 20 * run.len() as u32;
        bytes.extend(record(1 - run[0], timestamp));
    }
    bytes
}

struct CollectingSink {
    input: Receiver<DecodeSnapshot>,
    snapshots: Arc<Mutex<Vec<DecodeSnapshot>>>,
}

impl ProcessNode for CollectingSink {
    fn name(&self) -> &str {
        "collecting_sink"
    }

    fn work(&mut self) -> WorkResult<usize> {
        let snapshot = self.input.recv()?;
        self.snapshots.lock().unwrap().push(snapshot);
        Ok(1)
    }
}

fn run_pipeline(bytes: Vec<u8>, chunk_size: usize) -> Vec<DecodeSnapshot> {
    let config = DecoderConfig::new().with_poll_interval(Duration::from_millis(5));
    let snapshots = Arc::new(Mutex::new(Vec::new()));

    let mut scheduler = Scheduler::new();
    let (bytes_tx, bytes_rx) = channel::<Vec<u8>>(None);
    let (snapshot_tx, snapshot_rx) = channel::<DecodeSnapshot>(None);

    scheduler.start_process(
        CaptureSource::new(Cursor::new(bytes), bytes_tx).with_chunk_size(chunk_size),
    );
    scheduler.start_process(CanDecoder::new(config, bytes_rx, snapshot_tx));
    scheduler.start_process(CollectingSink {
        input: snapshot_rx,
        snapshots: Arc::clone(&snapshots),
    });
    scheduler.wait();

    let snapshots = snapshots.lock().unwrap();
    snapshots.clone()
}

#[test]
fn test_standard_frame_through_pipeline() {
    let frame = bits(
        "0 11001010000 0 0 0 0010 10100101 00001111 \
         110000011110000 1 0 1 1111111 111",
    );
    let snapshots = run_pipeline(capture(&stuffed(&frame)), 7);

    let last = snapshots.last().expect("at least one snapshot");
    assert_eq!(last.destuffed, frame);
    assert_eq!(last.outcomes.len(), 1);
    assert!(last.outcomes[0].is_complete());

    let decoded = last.frames().next().unwrap();
    assert_eq!(decoded.frame_type, FrameType::Standard);
    assert_eq!(decoded.identifier(), Some(0x650));
    assert_eq!(decoded.data(), vec![0xA5, 0x0F]);
    assert_eq!(decoded.to_string(), "Standard Data ID=0x650 DLC=2 [A5 0F]");

    // cycles are numbered consecutively
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.cycle, i as u64 + 1);
    }
}

#[test]
fn test_extended_remote_frame_through_pipeline() {
    let frame = bits(
        "0 10000000001 1 1 000000000000000011 1 0 0 0100 \
         010101010101010 1 0 1 1111111 111",
    );
    let snapshots = run_pipeline(capture(&stuffed(&frame)), 1024);

    let last = snapshots.last().expect("at least one snapshot");
    let decoded = last.frames().next().unwrap();
    assert_eq!(decoded.frame_type, FrameType::Extended);
    assert!(decoded.is_remote());
    assert_eq!(decoded.identifier(), Some((0x401 << 18) | 0x3));
    assert_eq!(decoded.dlc(), Some(4));
    assert!(decoded.field(FieldName::Data(0)).is_none());
}

#[test]
fn test_garbage_and_noise_between_records() {
    let frame = bits("0 00000000001 0 0 0 0000 000000000000000 1 0 1 1111111 111");
    let clean = capture(&stuffed(&frame));

    // garbage before every record and a repeated-level record after the first
    let mut noisy = Vec::new();
    for (i, record_bytes) in clean.chunks(8).enumerate() {
        noisy.extend([0xAA, 0x11, 0x55]);
        noisy.extend(record_bytes);
        if i == 0 {
            noisy.extend(record(record_bytes[1], 7));
        }
    }

    let snapshots = run_pipeline(noisy, 16);
    let last = snapshots.last().expect("at least one snapshot");
    assert_eq!(last.destuffed, frame);
    assert_eq!(last.frames().next().unwrap().identifier(), Some(1));
}
