//! Send path (spec.md §4.5): build the packet in order — start code, mode
//! byte, length, payload, end code — as separate writes, each checked for
//! exact acceptance. A short write is not retried; per §4.5 the session
//! treats the connection as unhealthy rather than attempting partial
//! recovery.

use crate::frame::{DataMode, FrameConfig, SENTINEL_LEN};
use byteorder::{ByteOrder, LittleEndian};
use meshwire_support::{MeshError, MeshResult};
use std::io::Write;

fn checked_write<W: Write>(writer: &mut W, bytes: &[u8]) -> MeshResult<()> {
    let written = writer.write(bytes)?;
    if written != bytes.len() {
        return Err(MeshError::Transport(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "short send",
        )));
    }
    Ok(())
}

/// Frames `payload` under `mode` and writes it to `writer` as the ordered
/// sequence of sub-sends spec.md §4.5 describes.
pub fn send<W: Write>(writer: &mut W, config: &FrameConfig, mode: DataMode, payload: &[u8]) -> MeshResult<()> {
    checked_write(writer, &config.start_code())?;
    checked_write(writer, &[mode.into()])?;

    let mut length_bytes = [0u8; SENTINEL_LEN];
    LittleEndian::write_u32(&mut length_bytes, payload.len() as u32);
    checked_write(writer, &length_bytes)?;

    checked_write(writer, payload)?;
    checked_write(writer, &config.end_code())?;

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PayloadKind;

    #[test]
    fn send_writes_full_frame() {
        let config = FrameConfig::default();
        let mut out = Vec::new();

        send(&mut out, &config, DataMode::compose(PayloadKind::Packet, false, false), b"hello").unwrap();

        assert_eq!(&out[0..4], &config.start_code());
        assert_eq!(out[4], 0);
        assert_eq!(&out[out.len() - 4..], &config.end_code());
        assert_eq!(&out[9..14], b"hello");
    }

    #[test]
    fn short_write_is_reported_without_retry() {
        struct FlakyWriter {
            calls: usize,
        }
        impl Write for FlakyWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.calls += 1;
                Ok(buf.len().saturating_sub(1))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let config = FrameConfig::default();
        let mut writer = FlakyWriter { calls: 0 };
        let result = send(&mut writer, &config, DataMode::Packet, b"hi");

        assert!(result.is_err());
        assert_eq!(writer.calls, 1);
    }
}
