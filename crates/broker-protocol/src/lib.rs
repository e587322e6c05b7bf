//! Wire protocol for the broker: frame codec and verb identifiers.
//!
//! Kept as its own crate so the queue engine (`broker-core`) and the service
//! binary can share the exact same framing without a dependency on the
//! session/transport layer.

mod frame;
pub mod verbs;

pub use frame::{read_frame, CodecError, Frame, DEFAULT_MAX_FRAME_DATA};
