//! Binary/file packet bodies (spec.md §6.2): a sequence of
//! length-prefixed byte runs, each an 8-byte little-endian size followed by
//! that many bytes. Used for `data_modes::binary` and `data_modes::file`
//! frame payloads, as an alternative to the text `Container` body.

use byteorder::{ByteOrder, LittleEndian};
use meshwire_support::{MeshError, MeshResult};

const SIZE_WIDTH: usize = 8;

/// Appends one length-prefixed run to `out`.
pub fn push_run(out: &mut Vec<u8>, bytes: &[u8]) {
    let mut len = [0u8; SIZE_WIDTH];
    LittleEndian::write_u64(&mut len, bytes.len() as u64);
    out.extend_from_slice(&len);
    out.extend_from_slice(bytes);
}

/// Splits a binary packet body into its length-prefixed runs, in order.
pub fn parse_runs(body: &[u8]) -> MeshResult<Vec<&[u8]>> {
    let mut runs = Vec::new();
    let mut pos = 0usize;
    while pos < body.len() {
        if body.len() - pos < SIZE_WIDTH {
            return Err(MeshError::Parse("truncated run length"));
        }
        let len = LittleEndian::read_u64(&body[pos..pos + SIZE_WIDTH]) as usize;
        pos += SIZE_WIDTH;
        if body.len() - pos < len {
            return Err(MeshError::Parse("truncated run body"));
        }
        runs.push(&body[pos..pos + len]);
        pos += len;
    }
    Ok(runs)
}

/// Builds a `binary`-mode body: addressing runs followed by one content run.
pub fn encode_binary(source_id: &str, source_sub_id: &str, target_id: &str, target_sub_id: &str, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    push_run(&mut out, source_id.as_bytes());
    push_run(&mut out, source_sub_id.as_bytes());
    push_run(&mut out, target_id.as_bytes());
    push_run(&mut out, target_sub_id.as_bytes());
    push_run(&mut out, content);
    out
}

/// Builds a `file`-mode body: addressing runs, then the file path, then its
/// content, each as its own run.
pub fn encode_file(
    source_id: &str,
    source_sub_id: &str,
    target_id: &str,
    target_sub_id: &str,
    file_path: &str,
    content: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    push_run(&mut out, source_id.as_bytes());
    push_run(&mut out, source_sub_id.as_bytes());
    push_run(&mut out, target_id.as_bytes());
    push_run(&mut out, target_sub_id.as_bytes());
    push_run(&mut out, file_path.as_bytes());
    push_run(&mut out, content);
    out
}

pub struct Addressing {
    pub source_id: String,
    pub source_sub_id: String,
    pub target_id: String,
    pub target_sub_id: String,
}

/// Parses the four leading addressing runs shared by `binary` and `file`
/// mode bodies, returning the addressing plus the remaining payload runs.
pub fn parse_addressing<'a>(body: &'a [u8]) -> MeshResult<(Addressing, Vec<&'a [u8]>)> {
    let runs = parse_runs(body)?;
    if runs.len() < 4 {
        return Err(MeshError::Parse("binary body missing addressing runs"));
    }
    let addressing = Addressing {
        source_id: String::from_utf8_lossy(runs[0]).into_owned(),
        source_sub_id: String::from_utf8_lossy(runs[1]).into_owned(),
        target_id: String::from_utf8_lossy(runs[2]).into_owned(),
        target_sub_id: String::from_utf8_lossy(runs[3]).into_owned(),
    };
    Ok((addressing, runs[4..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_body_round_trips() {
        let body = encode_binary("a", "0", "b", "1", b"payload");
        let (addr, rest) = parse_addressing(&body).unwrap();
        assert_eq!(addr.source_id, "a");
        assert_eq!(addr.target_sub_id, "1");
        assert_eq!(rest, vec![b"payload".as_slice()]);
    }

    #[test]
    fn file_body_carries_path_and_content() {
        let body = encode_file("a", "", "b", "", "config/meshwire.toml", b"[endpoint]");
        let (addr, rest) = parse_addressing(&body).unwrap();
        assert_eq!(addr.source_id, "a");
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0], b"config/meshwire.toml".as_slice());
        assert_eq!(rest[1], b"[endpoint]".as_slice());
    }

    #[test]
    fn truncated_run_length_is_an_error() {
        let mut body = vec![0u8; 4];
        body.extend_from_slice(b"junk");
        assert!(parse_runs(&body).is_err());
    }
}
