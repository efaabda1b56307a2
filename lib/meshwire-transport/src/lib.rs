//! TCP wire-level plumbing: the frame codec, the receive state machine, and
//! the send path (spec.md §4.3, §4.4, §4.5).

pub mod frame;
pub mod receive;
pub mod send;

pub use frame::{DataMode, FrameConfig, PayloadKind};
