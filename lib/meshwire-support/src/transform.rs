//! Opaque compression/encryption hook (spec.md §1 "out of scope external
//! collaborators", §4.8 handshake). The core only ever sees a `Transform`;
//! it never reasons about cipher suites or compression algorithms.
//!
//! The AEAD implementation here is a direct port of `flux::crypto`, which
//! wraps `libsodium`'s `crypto_aead_chacha20poly1305_ietf_*` family.

use ctor::ctor;

pub const MAC_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_ABYTES as usize;
pub const KEY_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_KEYBYTES as usize;
pub const NONCE_SIZE: usize = libsodium_sys::crypto_aead_chacha20poly1305_IETF_NPUBBYTES as usize;

const NONCE_OFFSET: usize = NONCE_SIZE - 8;

#[ctor]
fn init_sodium() {
    unsafe {
        if libsodium_sys::sodium_init() < 0 {
            panic!("cryptography initialization failed");
        }
    }
}

fn nonce_to_bytes(nonce: u64) -> [u8; NONCE_SIZE] {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    nonce_bytes[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
    nonce_bytes
}

/// Encrypt `plain` into `cipher`, which must be exactly `plain.len() + MAC_SIZE`.
pub fn encrypt(cipher: &mut [u8], plain: &[u8], additional_data: &[u8], nonce: u64, key: &[u8; KEY_SIZE]) -> bool {
    assert_eq!(
        cipher.len(),
        plain.len() + MAC_SIZE,
        "cipher buffer must be plain length + MAC size"
    );

    let nonce_bytes = nonce_to_bytes(nonce);

    unsafe {
        libsodium_sys::crypto_aead_chacha20poly1305_ietf_encrypt(
            cipher.as_mut_ptr(),
            std::ptr::null_mut(),
            plain.as_ptr(),
            plain.len() as u64,
            additional_data.as_ptr(),
            additional_data.len() as u64,
            std::ptr::null(),
            nonce_bytes.as_ptr(),
            key.as_ptr(),
        ) >= 0
    }
}

/// Decrypt `cipher` into `plain`, which must be exactly `cipher.len() - MAC_SIZE`.
pub fn decrypt(plain: &mut [u8], cipher: &[u8], additional_data: &[u8], nonce: u64, key: &[u8; KEY_SIZE]) -> bool {
    if cipher.len() < MAC_SIZE || plain.len() != cipher.len() - MAC_SIZE {
        return false;
    }

    let nonce_bytes = nonce_to_bytes(nonce);

    unsafe {
        libsodium_sys::crypto_aead_chacha20poly1305_ietf_decrypt(
            plain.as_mut_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            cipher.as_ptr(),
            cipher.len() as u64,
            additional_data.as_ptr(),
            additional_data.len() as u64,
            nonce_bytes.as_ptr(),
            key.as_ptr(),
        ) >= 0
    }
}

pub fn random_bytes(out: &mut [u8]) {
    unsafe {
        libsodium_sys::randombytes_buf(out.as_mut_ptr() as *mut std::ffi::c_void, out.len());
    }
}

/// Derives a fixed-width AEAD key from the handshake's shared
/// `connection_key` text (spec.md §1: "the connection key is a shared secret
/// handed to the core"), via `crypto_generichash` (BLAKE2b) so both peers
/// land on the same key bytes without a separate exchange step.
pub fn derive_key(connection_key: &str) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    unsafe {
        libsodium_sys::crypto_generichash(
            key.as_mut_ptr(),
            KEY_SIZE,
            connection_key.as_ptr(),
            connection_key.len() as u64,
            std::ptr::null(),
            0,
        );
    }
    key
}

/// The opaque compress/encrypt hook itself (spec.md §1): `Session` holds one
/// of these behind a `Mutex<Box<dyn Transform>>` and never reasons about
/// what's behind it. `NoopTransform` is the default a session falls back to
/// when the handshake negotiates neither compression nor encryption, so a
/// future compressor can plug in beside `CryptoState` without `Session`
/// changing at all.
pub trait Transform: Send {
    /// Applies the transform to `plain`, advancing any internal sequence
    /// state (e.g. the AEAD nonce counter).
    fn seal(&mut self, plain: &[u8], additional_data: &[u8]) -> Vec<u8>;

    /// Reverses the transform applied by the peer's `seal`. `None` means the
    /// frame failed to invert (bad key, bad MAC, truncated input) rather
    /// than that it was merely empty.
    fn open(&self, framed: &[u8], additional_data: &[u8]) -> Option<Vec<u8>>;
}

/// The identity transform: frames pass through unchanged.
#[derive(Debug, Default, Copy, Clone)]
pub struct NoopTransform;

impl Transform for NoopTransform {
    fn seal(&mut self, plain: &[u8], _additional_data: &[u8]) -> Vec<u8> {
        plain.to_vec()
    }

    fn open(&self, framed: &[u8], _additional_data: &[u8]) -> Option<Vec<u8>> {
        Some(framed.to_vec())
    }
}

impl Transform for CryptoState {
    fn seal(&mut self, plain: &[u8], additional_data: &[u8]) -> Vec<u8> {
        self.seal_framed(plain, additional_data)
    }

    fn open(&self, framed: &[u8], additional_data: &[u8]) -> Option<Vec<u8>> {
        self.open_framed(framed, additional_data)
    }
}

/// The flag pair a handshake negotiates: whether a payload was compressed
/// and/or encrypted before framing. The core never inspects the algorithm
/// behind either bit — compression and encryption are both treated as
/// opaque byte transforms (spec.md §1).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct TransformFlags {
    pub compress: bool,
    pub encrypt: bool,
}

/// A session-scoped symmetric key plus sequence counter, sufficient to
/// apply/reverse the opaque transform declared at handshake time.
pub struct CryptoState {
    key: [u8; KEY_SIZE],
    sequence: u64,
}

impl CryptoState {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        CryptoState { key, sequence: 0 }
    }

    pub fn random() -> Self {
        let mut key = [0u8; KEY_SIZE];
        random_bytes(&mut key);
        Self::new(key)
    }

    /// Encrypt `plain` with the next sequence number, returning the cipher
    /// bytes (plain length + MAC_SIZE) and advancing the sequence.
    pub fn seal(&mut self, plain: &[u8], additional_data: &[u8]) -> Vec<u8> {
        let mut cipher = vec![0u8; plain.len() + MAC_SIZE];
        let sequence = self.sequence;
        self.sequence += 1;
        encrypt(&mut cipher, plain, additional_data, sequence, &self.key);
        cipher
    }

    /// Decrypt `cipher` encoded at `sequence`, returning the plaintext bytes.
    pub fn open(&self, cipher: &[u8], additional_data: &[u8], sequence: u64) -> Option<Vec<u8>> {
        if cipher.len() < MAC_SIZE {
            return None;
        }
        let mut plain = vec![0u8; cipher.len() - MAC_SIZE];
        if decrypt(&mut plain, cipher, additional_data, sequence, &self.key) {
            Some(plain)
        } else {
            None
        }
    }

    /// Self-describing variant of `seal`/`open`: the sequence number is
    /// carried alongside the ciphertext instead of tracked out of band by
    /// the caller, which is the simpler contract when frames decode on
    /// worker threads that may not observe wire order.
    pub fn seal_framed(&mut self, plain: &[u8], additional_data: &[u8]) -> Vec<u8> {
        let sequence = self.sequence;
        self.sequence += 1;
        let mut cipher = vec![0u8; plain.len() + MAC_SIZE];
        encrypt(&mut cipher, plain, additional_data, sequence, &self.key);

        let mut out = Vec::with_capacity(8 + cipher.len());
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&cipher);
        out
    }

    pub fn open_framed(&self, framed: &[u8], additional_data: &[u8]) -> Option<Vec<u8>> {
        if framed.len() < 8 {
            return None;
        }
        let mut sequence_bytes = [0u8; 8];
        sequence_bytes.copy_from_slice(&framed[..8]);
        let sequence = u64::from_le_bytes(sequence_bytes);
        self.open(&framed[8..], additional_data, sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic_per_connection_key() {
        assert_eq!(derive_key("shared-secret"), derive_key("shared-secret"));
        assert_ne!(derive_key("shared-secret"), derive_key("other-secret"));
    }

    #[test]
    fn seal_then_open_framed_round_trips() {
        let mut sender = CryptoState::new(derive_key("shared-secret"));
        let receiver = CryptoState::new(derive_key("shared-secret"));

        let framed = sender.seal_framed(b"hello mesh", b"");
        let plain = receiver.open_framed(&framed, b"").unwrap();

        assert_eq!(plain, b"hello mesh");
    }

    #[test]
    fn open_framed_rejects_wrong_key() {
        let mut sender = CryptoState::new(derive_key("shared-secret"));
        let receiver = CryptoState::new(derive_key("wrong-secret"));

        let framed = sender.seal_framed(b"hello mesh", b"");
        assert!(receiver.open_framed(&framed, b"").is_none());
    }

    #[test]
    fn noop_transform_round_trips_unchanged() {
        let mut t = NoopTransform;
        let sealed = t.seal(b"hello mesh", b"");
        assert_eq!(t.open(&sealed, b"").unwrap(), b"hello mesh");
    }

    #[test]
    fn boxed_transform_dispatches_through_the_trait() {
        let mut sender: Box<dyn Transform> = Box::new(CryptoState::new(derive_key("shared-secret")));
        let receiver: Box<dyn Transform> = Box::new(CryptoState::new(derive_key("shared-secret")));

        let framed = sender.seal(b"hello mesh", b"");
        assert_eq!(receiver.open(&framed, b"").unwrap(), b"hello mesh");
    }
}
