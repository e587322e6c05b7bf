//! Message type, lifecycle status, and id generation.

use base64::Engine as _;
use sha1::{Digest, Sha1};

/// A message's position in its lifecycle. `Ack` and `Rejected` are terminal:
/// such a message must not be redelivered and must not survive the next
/// persistence snapshot (`Rejected` is the one exception — see
/// `Queue::reject`, which leaves the record in storage until the next
/// restart's replay drops it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Received = 0,
    Ready = 1,
    Unack = 2,
    Ack = 3,
    Rejected = 4,
    WaitingAck = 5,
}

impl MessageStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Received),
            1 => Some(Self::Ready),
            2 => Some(Self::Unack),
            3 => Some(Self::Ack),
            4 => Some(Self::Rejected),
            5 => Some(Self::WaitingAck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub channel: String,
    /// Nanoseconds since epoch. Reset to "now" on every `Ready -> WaitingAck`
    /// transition; it is the redelivery timer's anchor.
    pub timestamp: i64,
    pub data: Vec<u8>,
    pub status: MessageStatus,
}

impl Message {
    /// Construct a freshly published message. Status starts at `Ready`.
    pub fn new(channel: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: generate_id(),
            channel: channel.into(),
            timestamp: now_nanos(),
            data,
            status: MessageStatus::Ready,
        }
    }

    /// Reconstruct a message read back from a persistence record. Per the
    /// replay contract, status is always reset to `Ready` regardless of what
    /// was recorded on disk.
    pub fn from_record(id: String, channel: String, timestamp: i64, data: Vec<u8>) -> Self {
        Self {
            id,
            channel,
            timestamp,
            data,
            status: MessageStatus::Ready,
        }
    }
}

/// Generate a 28-character message id: URL-safe (padded) base64 of the
/// 20-byte SHA-1 digest of a freshly generated UUID v4.
pub fn generate_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let mut hasher = Sha1::new();
    hasher.update(uuid.as_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::URL_SAFE.encode(digest)
}

pub fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos() as i64
}
