//! Wire verb identifiers.
//!
//! Every frame carries one of these as its `msg_id`. Request/ack pairs are
//! grouped together; `NEXT` and the publisher-registration pair are reserved
//! for forward compatibility and have no handler in this broker.

pub const PUBLISH_REQ: u32 = 1001;
pub const PUBLISH_ACK: u32 = 1002;

pub const NACK_REQ: u32 = 1003;
pub const NACK_ACK: u32 = 1004;

pub const ACK_REQ: u32 = 1005;
pub const ACK_ACK: u32 = 1006;

pub const REJECT_REQ: u32 = 1007;
pub const REJECT_ACK: u32 = 1008;

/// Reserved, no handler registered.
pub const NEXT_REQ: u32 = 1009;
/// Reserved, no handler registered.
pub const NEXT_ACK: u32 = 1010;

pub const CHANNEL_CREATE_REQ: u32 = 1011;
pub const CHANNEL_CREATE_ACK: u32 = 1012;

pub const CHANNEL_JOIN_REQ: u32 = 1013;
pub const CHANNEL_JOIN_ACK: u32 = 1014;

pub const REGISTER_CONSUMER_REQ: u32 = 1015;
pub const REGISTER_CONSUMER_ACK: u32 = 1016;

/// Reserved ("register publisher" in the original wire protocol), no handler registered.
pub const REGISTER_PUBLISHER_REQ: u32 = 1017;
/// Reserved, no handler registered.
pub const REGISTER_PUBLISHER_ACK: u32 = 1018;

/// Broker-initiated: never sent by a client, only received by a consumer.
pub const DISTRIBUTE: u32 = 1019;
/// Unused on the wire; kept for parity with the ack-pair numbering scheme.
pub const DISTRIBUTE_ACK: u32 = 1020;
