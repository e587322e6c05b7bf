//! Queue engine: message lifecycle, per-queue locking, persistence, and the
//! background distribution loop. No networking lives here — sessions are
//! represented only through the narrow `Sendable` capability so this crate
//! has zero knowledge of the transport that carries its frames.

pub mod consumer;
pub mod distributor;
pub mod error;
pub mod message;
pub mod persistence;
pub mod queue;
pub mod registry;

pub use consumer::{Consumer, ConsumerStatus, Sendable};
pub use error::{QueueError, RegistryError};
pub use message::{Message, MessageStatus};
pub use queue::{Queue, QueueInfo};
pub use registry::Registry;
