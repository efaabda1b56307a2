//! Session integration layer (spec.md §4.8, §5): ties the frame codec, the
//! job pool and the `Container`/`Value` data model together over one TCP
//! connection, plus the handshake and config types it depends on.

pub mod callbacks;
pub mod config;
pub mod handshake;
pub mod session;

pub use callbacks::Callbacks;
pub use config::MeshConfig;
pub use handshake::{HandshakeRequest, SessionType};
pub use session::Session;
