//! Text-safe encodings for `Value` payloads (spec.md §3.1).
//!
//! `escape`/`unescape` implement the four-entry substitution table used when
//! a string payload is embedded inside the `[name,type,value];` tuple syntax.
//! `base64` wraps the `base64` crate behind the small surface
//! `meshwire-proto` and the session-key config types need — the upstream
//! `flux::session` module referenced `crate::encoding::base64` without ever
//! defining it; this module is that missing piece, filled in properly.

const ESCAPES: &[(char, &str)] = &[
    ('\r', "</0x0A;>"),
    ('\n', "</0x0B;>"),
    (' ', "</0x0C;>"),
    ('\t', "</0x0D;>"),
];

/// Replace raw control characters with their wire-safe tags.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ESCAPES.iter().find(|(c, _)| *c == ch) {
            Some((_, tag)) => out.push_str(tag),
            None => out.push(ch),
        }
    }
    out
}

/// Inverse of `escape`. Tags are matched longest-first isn't necessary here
/// since none is a prefix of another.
pub fn unescape(encoded: &str) -> String {
    let mut out = encoded.to_string();
    for (ch, tag) in ESCAPES {
        out = out.replace(tag, &ch.to_string());
    }
    out
}

pub mod base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_round_trips_every_entry() {
        let raw = "a\r b\n\tc";
        let encoded = escape(raw);
        assert_eq!(unescape(&encoded), raw);
    }

    #[test]
    fn escape_leaves_plain_text_alone() {
        assert_eq!(escape("hello"), "hello");
        assert_eq!(unescape("hello"), "hello");
    }

    #[test]
    fn base64_round_trips_arbitrary_bytes() {
        let data = [0u8, 1, 2, 255, 128, 17];
        let encoded = base64::encode(&data);
        assert_eq!(base64::decode(&encoded).unwrap(), data);
    }
}
