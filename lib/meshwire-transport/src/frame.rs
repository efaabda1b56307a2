//! Wire frame layout (spec.md §4.3, §6.1):
//!
//! ```text
//! START_CODE (4 bytes, all = start_byte)
//! MODE       (1 byte)
//! LENGTH     (4 bytes, LE u32, payload size)
//! PAYLOAD    (LENGTH bytes)
//! END_CODE   (4 bytes, all = end_byte)
//! ```
//!
//! The codec treats `payload` as an opaque byte string; interpreting it as a
//! `Container`'s text form or a binary/file body belongs to the session
//! layer (spec.md §6.1).

use byteorder::{ByteOrder, LittleEndian};

pub const SENTINEL_LEN: usize = 4;
pub const MODE_LEN: usize = 1;
pub const LENGTH_LEN: usize = 4;

/// The base kind of a frame's payload, independent of whether a transform
/// was applied.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PayloadKind {
    Packet,
    File,
    Binary,
}

/// `data_modes` from spec.md §4.3: the payload kind crossed with the
/// compress/encrypt flags negotiated at handshake. The codec never
/// interprets these beyond routing — compression and encryption are both
/// opaque transforms applied by the session layer (spec.md §1).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum DataMode {
    Packet = 0,
    PacketCompressed = 1,
    PacketEncrypted = 2,
    PacketCompressedEncrypted = 3,
    File = 4,
    FileCompressed = 5,
    FileEncrypted = 6,
    FileCompressedEncrypted = 7,
    Binary = 8,
    BinaryCompressed = 9,
    BinaryEncrypted = 10,
    BinaryCompressedEncrypted = 11,
}

impl DataMode {
    pub fn compose(kind: PayloadKind, compress: bool, encrypt: bool) -> DataMode {
        match (kind, compress, encrypt) {
            (PayloadKind::Packet, false, false) => DataMode::Packet,
            (PayloadKind::Packet, true, false) => DataMode::PacketCompressed,
            (PayloadKind::Packet, false, true) => DataMode::PacketEncrypted,
            (PayloadKind::Packet, true, true) => DataMode::PacketCompressedEncrypted,
            (PayloadKind::File, false, false) => DataMode::File,
            (PayloadKind::File, true, false) => DataMode::FileCompressed,
            (PayloadKind::File, false, true) => DataMode::FileEncrypted,
            (PayloadKind::File, true, true) => DataMode::FileCompressedEncrypted,
            (PayloadKind::Binary, false, false) => DataMode::Binary,
            (PayloadKind::Binary, true, false) => DataMode::BinaryCompressed,
            (PayloadKind::Binary, false, true) => DataMode::BinaryEncrypted,
            (PayloadKind::Binary, true, true) => DataMode::BinaryCompressedEncrypted,
        }
    }

    pub fn kind(self) -> PayloadKind {
        match self {
            DataMode::Packet | DataMode::PacketCompressed | DataMode::PacketEncrypted | DataMode::PacketCompressedEncrypted => {
                PayloadKind::Packet
            }
            DataMode::File | DataMode::FileCompressed | DataMode::FileEncrypted | DataMode::FileCompressedEncrypted => {
                PayloadKind::File
            }
            DataMode::Binary | DataMode::BinaryCompressed | DataMode::BinaryEncrypted | DataMode::BinaryCompressedEncrypted => {
                PayloadKind::Binary
            }
        }
    }

    pub fn compressed(self) -> bool {
        matches!(
            self,
            DataMode::PacketCompressed
                | DataMode::PacketCompressedEncrypted
                | DataMode::FileCompressed
                | DataMode::FileCompressedEncrypted
                | DataMode::BinaryCompressed
                | DataMode::BinaryCompressedEncrypted
        )
    }

    pub fn encrypted(self) -> bool {
        matches!(
            self,
            DataMode::PacketEncrypted
                | DataMode::PacketCompressedEncrypted
                | DataMode::FileEncrypted
                | DataMode::FileCompressedEncrypted
                | DataMode::BinaryEncrypted
                | DataMode::BinaryCompressedEncrypted
        )
    }

    pub fn from_byte(b: u8) -> Option<DataMode> {
        Some(match b {
            0 => DataMode::Packet,
            1 => DataMode::PacketCompressed,
            2 => DataMode::PacketEncrypted,
            3 => DataMode::PacketCompressedEncrypted,
            4 => DataMode::File,
            5 => DataMode::FileCompressed,
            6 => DataMode::FileEncrypted,
            7 => DataMode::FileCompressedEncrypted,
            8 => DataMode::Binary,
            9 => DataMode::BinaryCompressed,
            10 => DataMode::BinaryEncrypted,
            11 => DataMode::BinaryCompressedEncrypted,
            _ => return None,
        })
    }
}

impl From<DataMode> for u8 {
    fn from(mode: DataMode) -> u8 {
        mode as u8
    }
}

/// The sentinel bytes and size cap a frame codec is configured with
/// (spec.md §4.3: "configured at construction").
#[derive(Debug, Copy, Clone)]
pub struct FrameConfig {
    pub start_byte: u8,
    pub end_byte: u8,
    pub max_frame_len: u32,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            start_byte: 0xCB,
            end_byte: 0xCE,
            max_frame_len: 16 * 1024 * 1024,
        }
    }
}

impl FrameConfig {
    pub fn start_code(&self) -> [u8; SENTINEL_LEN] {
        [self.start_byte; SENTINEL_LEN]
    }

    pub fn end_code(&self) -> [u8; SENTINEL_LEN] {
        [self.end_byte; SENTINEL_LEN]
    }
}

/// Builds the full on-wire frame for `mode`/`payload`, per §4.5's send path:
/// start code, mode byte, LE length, payload, end code.
pub fn encode(config: &FrameConfig, mode: DataMode, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SENTINEL_LEN + MODE_LEN + LENGTH_LEN + payload.len() + SENTINEL_LEN);
    out.extend_from_slice(&config.start_code());
    out.push(mode.into());
    let mut len_bytes = [0u8; LENGTH_LEN];
    LittleEndian::write_u32(&mut len_bytes, payload.len() as u32);
    out.extend_from_slice(&len_bytes);
    out.extend_from_slice(payload);
    out.extend_from_slice(&config.end_code());
    out
}

pub fn read_length(bytes: &[u8; LENGTH_LEN]) -> u32 {
    LittleEndian::read_u32(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_bit_exact_layout() {
        let config = FrameConfig { start_byte: 0xAB, end_byte: 0xCD, max_frame_len: 1024 };
        let frame = encode(&config, DataMode::Packet, b"hi");

        assert_eq!(&frame[0..4], &[0xAB; 4]);
        assert_eq!(frame[4], 0);
        assert_eq!(read_length(&frame[5..9].try_into().unwrap()), 2);
        assert_eq!(&frame[9..11], b"hi");
        assert_eq!(&frame[11..15], &[0xCD; 4]);
    }

    #[test]
    fn data_mode_round_trips_through_byte() {
        for mode in [
            DataMode::Packet,
            DataMode::PacketCompressed,
            DataMode::PacketEncrypted,
            DataMode::PacketCompressedEncrypted,
            DataMode::File,
            DataMode::Binary,
            DataMode::BinaryCompressedEncrypted,
        ] {
            let byte: u8 = mode.into();
            assert_eq!(DataMode::from_byte(byte), Some(mode));
        }
    }

    #[test]
    fn compose_and_decompose_flags_agree() {
        let mode = DataMode::compose(PayloadKind::File, true, false);
        assert_eq!(mode.kind(), PayloadKind::File);
        assert!(mode.compressed());
        assert!(!mode.encrypted());
    }
}
