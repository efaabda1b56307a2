//! The typed data model carried over the wire: `Value` trees wrapped in
//! `Container` envelopes, plus the binary/file packet body encoding used by
//! the non-text frame modes (spec.md §3, §4.1, §4.2, §6.2).

pub mod binary;
pub mod container;
pub mod value;

pub use container::Container;
pub use value::{Value, ValueType};
