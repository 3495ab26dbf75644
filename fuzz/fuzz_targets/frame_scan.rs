//! Arbitrary bytes through the frame parser, split across two sources.
//!
//! The first input byte picks the split point. Frames must match a
//! straight-line model of the wire format: the body between the markers,
//! truncated to `CAPACITY - 1` bytes, clamped exactly when it was longer,
//! and followed by its NUL terminator.

#![no_main]

use libfuzzer_sys::fuzz_target;
use shieldnet_proto::{END_MARKER, FrameParser, START_MARKER};

const CAPACITY: usize = 16;

/// (body, clamped) for every complete frame in `stream`.
fn model(stream: &[u8]) -> Vec<(Vec<u8>, bool)> {
    let mut frames = Vec::new();
    let mut body: Option<Vec<u8>> = None;
    for &byte in stream {
        match body.as_mut() {
            None if byte == START_MARKER => body = Some(Vec::new()),
            None => {},
            Some(raw) if byte == END_MARKER => {
                let clamped = raw.len() >= CAPACITY;
                raw.truncate(CAPACITY - 1);
                frames.push((std::mem::take(raw), clamped));
                body = None;
            },
            Some(raw) => raw.push(byte),
        }
    }
    frames
}

fuzz_target!(|data: &[u8]| {
    let Some((&split, data)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(data.len());
    let (mut first, mut second) = data.split_at(split);

    let mut parser = FrameParser::<CAPACITY>::new();
    let mut frames = Vec::new();
    while parser.scan([&mut first, &mut second]) {
        assert!(parser.cursor() < CAPACITY);
        let body = parser.frame().expect("ready parser has a frame");
        let terminated = parser.terminated().expect("ready parser has a frame");
        assert_eq!(terminated.len(), body.len() + 1);
        assert_eq!(terminated[body.len()], 0);
        frames.push((body.to_vec(), parser.was_clamped()));
        parser.clear();
    }

    assert!(first.is_empty() && second.is_empty());
    assert_eq!(frames, model(data));
});
