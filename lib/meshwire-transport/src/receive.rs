//! The receive state machine (spec.md §4.4): `READ_START → READ_MODE →
//! READ_LENGTH → READ_BODY → READ_END → READ_START`.
//!
//! Rendered here as a blocking read loop over one dedicated thread per
//! session, rather than the mio reactor the rest of the net stack uses
//! elsewhere in this codebase — `read_exact` already gives exactly-sized
//! reads with a clean short-read error, which is what the state machine's
//! resync contract needs, and a blocking loop carries far less incidental
//! risk to get wrong than hand-rolling the same contract on top of a
//! non-blocking poll. See DESIGN.md for the full tradeoff.
//!
//! Resync never attempts a byte-at-a-time realignment — a corrupted frame
//! costs exactly one frame of data, by design (spec.md §4.4).

use crate::frame::{DataMode, FrameConfig, SENTINEL_LEN};
use meshwire_support::FrameFault;
use std::io::Read;

const STAGING_SIZE: usize = 4096;

/// Reads and discards exactly `remaining` bytes, without accumulating them.
fn discard<R: Read>(reader: &mut R, mut remaining: usize) -> std::io::Result<()> {
    let mut staging = [0u8; STAGING_SIZE];
    while remaining > 0 {
        let take = remaining.min(STAGING_SIZE);
        reader.read_exact(&mut staging[..take])?;
        remaining -= take;
    }
    Ok(())
}

/// Callbacks the state machine drives. Mirrors the session's
/// `receive_on_tcp(mode, payload)` hook from spec.md §4.4, split out so the
/// transport crate never depends on the session crate.
pub trait ReceiveHooks {
    fn on_frame(&mut self, mode: DataMode, payload: Vec<u8>);
    fn on_frame_error(&mut self, fault: FrameFault);
    fn on_disconnected(&mut self);
}

/// Runs the receive state machine over `reader` until disconnection. Blocks
/// the calling thread; callers run this on the session's dedicated I/O
/// thread.
pub fn run<R: Read>(mut reader: R, config: &FrameConfig, hooks: &mut dyn ReceiveHooks) {
    let start_code = config.start_code();
    let end_code = config.end_code();

    loop {
        // READ_START
        let mut start = [0u8; SENTINEL_LEN];
        if reader.read_exact(&mut start).is_err() {
            hooks.on_disconnected();
            return;
        }
        if start != start_code {
            hooks.on_frame_error(FrameFault::StartMismatch);
            continue;
        }

        // READ_MODE
        let mut mode_byte = [0u8; 1];
        if reader.read_exact(&mut mode_byte).is_err() {
            hooks.on_disconnected();
            return;
        }
        let mode = match DataMode::from_byte(mode_byte[0]) {
            Some(mode) => mode,
            None => {
                hooks.on_frame_error(FrameFault::UnknownMode);
                continue;
            }
        };

        // READ_LENGTH
        let mut length_bytes = [0u8; 4];
        if reader.read_exact(&mut length_bytes).is_err() {
            hooks.on_disconnected();
            return;
        }
        let length = crate::frame::read_length(&length_bytes);
        if length > config.max_frame_len {
            hooks.on_frame_error(FrameFault::LengthOverMax);
            // The declared length is the only hint we have for where the
            // frame ends; skip it (and its trailing end code) to realign
            // with the next frame's start code instead of reading garbage
            // as a new START_CODE.
            if discard(&mut reader, length as usize + SENTINEL_LEN).is_err() {
                hooks.on_disconnected();
                return;
            }
            continue;
        }

        // READ_BODY, chunked through a fixed-size staging buffer.
        let mut accumulator = Vec::with_capacity(length as usize);
        let mut remaining = length as usize;
        let mut staging = [0u8; STAGING_SIZE];
        let mut body_failed = false;
        while remaining > 0 {
            let take = remaining.min(STAGING_SIZE);
            if reader.read_exact(&mut staging[..take]).is_err() {
                body_failed = true;
                break;
            }
            accumulator.extend_from_slice(&staging[..take]);
            remaining -= take;
        }
        if body_failed {
            hooks.on_disconnected();
            return;
        }

        // READ_END
        let mut end = [0u8; SENTINEL_LEN];
        if reader.read_exact(&mut end).is_err() {
            hooks.on_disconnected();
            return;
        }
        if end != end_code {
            hooks.on_frame_error(FrameFault::EndMismatch);
            accumulator.clear();
            continue;
        }

        hooks.on_frame(mode, accumulator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode, PayloadKind};
    use std::io::Cursor;

    struct RecordingHooks {
        frames: Vec<(DataMode, Vec<u8>)>,
        errors: Vec<FrameFault>,
        disconnected: bool,
    }

    impl RecordingHooks {
        fn new() -> Self {
            RecordingHooks { frames: Vec::new(), errors: Vec::new(), disconnected: false }
        }
    }

    impl ReceiveHooks for RecordingHooks {
        fn on_frame(&mut self, mode: DataMode, payload: Vec<u8>) {
            self.frames.push((mode, payload));
        }
        fn on_frame_error(&mut self, fault: FrameFault) {
            self.errors.push(fault);
        }
        fn on_disconnected(&mut self) {
            self.disconnected = true;
        }
    }

    #[test]
    fn delivers_one_well_formed_frame_then_disconnects_on_eof() {
        let config = FrameConfig::default();
        let frame = encode(&config, DataMode::compose(PayloadKind::Packet, false, false), b"hello");

        let mut hooks = RecordingHooks::new();
        run(Cursor::new(frame), &config, &mut hooks);

        assert_eq!(hooks.frames.len(), 1);
        assert_eq!(hooks.frames[0].1, b"hello");
        assert!(hooks.disconnected);
    }

    #[test]
    fn resyncs_past_a_corrupted_frame_without_disconnecting() {
        let config = FrameConfig::default();
        let mut stream = Vec::new();
        stream.extend_from_slice(&[0xFF; 4]); // bad start code
        stream.extend_from_slice(&encode(&config, DataMode::Packet, b"second"));

        let mut hooks = RecordingHooks::new();
        run(Cursor::new(stream), &config, &mut hooks);

        assert_eq!(hooks.errors, vec![FrameFault::StartMismatch]);
        assert_eq!(hooks.frames.len(), 1);
        assert_eq!(hooks.frames[0].1, b"second");
    }

    #[test]
    fn end_code_mismatch_resyncs_and_drops_the_frame() {
        let config = FrameConfig::default();
        let mut framed = encode(&config, DataMode::Packet, b"third");
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        framed.extend_from_slice(&encode(&config, DataMode::Packet, b"fourth"));

        let mut hooks = RecordingHooks::new();
        run(Cursor::new(framed), &config, &mut hooks);

        assert_eq!(hooks.errors, vec![FrameFault::EndMismatch]);
        assert_eq!(hooks.frames.len(), 1);
        assert_eq!(hooks.frames[0].1, b"fourth");
    }

    #[test]
    fn oversized_length_resyncs_without_reading_body() {
        let config = FrameConfig { max_frame_len: 4, ..FrameConfig::default() };
        let mut stream = encode(&config, DataMode::Packet, b"toolong");
        stream.extend_from_slice(&encode(&config, DataMode::Packet, b"ok"));

        let mut hooks = RecordingHooks::new();
        run(Cursor::new(stream), &config, &mut hooks);

        assert_eq!(hooks.errors, vec![FrameFault::LengthOverMax]);
        assert_eq!(hooks.frames.len(), 1);
        assert_eq!(hooks.frames[0].1, b"ok");
    }
}
