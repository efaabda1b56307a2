//! Ambient stack shared by every crate in the fabric: logging, the error
//! taxonomy, text encodings and the opaque transform hook. Nothing in here
//! is specific to containers, frames or the job pool — it is the equivalent
//! of the teacher's `flux` crate.

pub mod encoding;
pub mod error;
pub mod filestore;
pub mod logging;
pub mod transform;

/// Bound into the AEAD additional data on every encrypted frame, mirroring
/// `ConnectionToken`'s `protocol` field in the teacher's net stack — it
/// doesn't version the wire format (that's `Container::version`), it just
/// keeps a sealed frame from this fabric from verifying under another
/// protocol's key/nonce scheme.
pub const PROTOCOL_ID: u16 = 0x0a55;

pub use error::{FrameFault, MeshError, MeshResult};
