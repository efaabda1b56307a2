//! The file I/O helper (spec.md §1): raw byte persistence by path. Used for
//! payloads that carry no container framing of their own, such as the bytes
//! behind a `file`-mode send (`Session::send_files`). The §6.4
//! `load_packet`/`save_packet` contract, which round-trips a serialized
//! `Container` through disk, lives on `Container` itself in `meshwire-proto`
//! (mirroring `value_container::load_packet`/`save_packet` in the original,
//! which combine file I/O with `deserialize`/`serialize` at the container
//! level) — this module has no dependency on the data model, so it stays
//! free of that.

use std::fs;
use std::io;
use std::path::Path;

pub fn load_bytes<P: AsRef<Path>>(path: P) -> io::Result<Vec<u8>> {
    fs::read(path)
}

pub fn save_bytes<P: AsRef<Path>>(path: P, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip_through_disk() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("meshwire-filestore-bytes-test-{:?}", std::thread::current().id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("blob.bin");

        save_bytes(&path, b"raw file bytes").unwrap();
        assert_eq!(load_bytes(&path).unwrap(), b"raw file bytes");

        fs::remove_dir_all(&dir).unwrap();
    }
}
