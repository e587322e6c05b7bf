//! Verb handlers: decode a request body, mutate a queue through the
//! registry, and produce the matching ack frame. One function per wire
//! verb, wired up by `dispatch`; distributor-initiated frames never pass
//! through here, they are written straight to a session's outbound channel.

use crate::state::AppState;
use broker_core::{ConsumerStatus, Sendable};
use broker_protocol::{verbs, Frame};
use std::sync::Arc;
use tracing::{debug, warn};

/// Route one decoded frame to its handler. Returns `None` for verbs with no
/// registered handler (`NEXT`, `REGISTER PUBLISHER`, `DISTRIBUTE` itself, or
/// anything unrecognized) — the session simply does not reply.
pub async fn dispatch(frame: Frame, session: &Arc<dyn Sendable>, state: &AppState) -> Option<Frame> {
    match frame.msg_id {
        verbs::PUBLISH_REQ => Some(publish(frame.data, state).await),
        verbs::NACK_REQ => Some(nack(frame.data, session, state).await),
        verbs::ACK_REQ => Some(ack(frame.data, session, state).await),
        verbs::REJECT_REQ => Some(reject(frame.data, session, state).await),
        verbs::CHANNEL_CREATE_REQ => Some(channel_create(frame.data, state).await),
        verbs::CHANNEL_JOIN_REQ => Some(channel_join(frame.data, state).await),
        verbs::REGISTER_CONSUMER_REQ => Some(register_consumer(frame.data, session, state).await),
        other => {
            debug!(session_id = session.id(), verb = other, "no handler registered for verb");
            None
        }
    }
}

/// Split `data` on the first space, returning `(before, after)` with neither
/// side trimmed. The payload half of a `PUBLISH` body is opaque and must not
/// be mangled by whitespace trimming.
fn split_first_space(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let pos = data.iter().position(|&b| b == b' ')?;
    Some((&data[..pos], &data[pos + 1..]))
}

fn channel_name(raw: &[u8]) -> Option<String> {
    std::str::from_utf8(raw).ok().map(|s| s.trim().to_ascii_uppercase())
}

fn token(raw: &[u8]) -> Option<String> {
    std::str::from_utf8(raw).ok().map(|s| s.trim().to_owned())
}

const MALFORMED_CHANNEL_PAYLOAD: &[u8] = b"error: malformed request, expected \"CHANNEL payload\"";
const MALFORMED_CHANNEL_MSGID: &[u8] = b"error: malformed request, expected \"CHANNEL msgid\"";
const MALFORMED_CHANNEL: &[u8] = b"error: malformed request, expected \"CHANNEL\"";

async fn publish(data: Vec<u8>, state: &AppState) -> Frame {
    let Some((channel_raw, payload)) = split_first_space(&data) else {
        return Frame::new(verbs::PUBLISH_ACK, MALFORMED_CHANNEL_PAYLOAD.to_vec());
    };
    let Some(channel) = channel_name(channel_raw) else {
        return Frame::new(verbs::PUBLISH_ACK, b"error: channel name is not valid utf-8".to_vec());
    };
    match state.registry.get_or_create(&channel) {
        Ok(queue) => match queue.publish(payload.to_vec()).await {
            Ok(id) => {
                debug!(channel = %channel, msg_id = %id, "published message");
                Frame::new(verbs::PUBLISH_ACK, id.into_bytes())
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "publish failed to persist");
                Frame::new(verbs::PUBLISH_ACK, format!("error: {e}").into_bytes())
            }
        },
        Err(e) => Frame::new(verbs::PUBLISH_ACK, e.to_string().into_bytes()),
    }
}

/// "I received this message and am working on it" — the consumer advances
/// from `WAITING_NACK` to `WORKING`, and the message itself moves to
/// `UNACK`, meaning the redelivery timer no longer applies to it.
async fn nack(data: Vec<u8>, session: &Arc<dyn Sendable>, state: &AppState) -> Frame {
    let Some((channel_raw, rest)) = split_first_space(&data) else {
        return Frame::new(verbs::NACK_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let (Some(channel), Some(msg_id)) = (channel_name(channel_raw), token(rest)) else {
        return Frame::new(verbs::NACK_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let queue = match state.registry.get(&channel) {
        Ok(q) => q,
        Err(e) => return Frame::new(verbs::NACK_ACK, e.to_string().into_bytes()),
    };
    match queue.unack(&msg_id).await {
        Ok(()) => {
            queue.update_consumer(session.id(), ConsumerStatus::Working).await;
            Frame::new(verbs::NACK_ACK, b"OK".to_vec())
        }
        Err(e) => {
            debug!(channel = %channel, msg_id = %msg_id, error = %e, "nack failed");
            Frame::new(verbs::NACK_ACK, b"error".to_vec())
        }
    }
}

async fn ack(data: Vec<u8>, session: &Arc<dyn Sendable>, state: &AppState) -> Frame {
    let Some((channel_raw, rest)) = split_first_space(&data) else {
        return Frame::new(verbs::ACK_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let (Some(channel), Some(msg_id)) = (channel_name(channel_raw), token(rest)) else {
        return Frame::new(verbs::ACK_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let queue = match state.registry.get(&channel) {
        Ok(q) => q,
        Err(e) => return Frame::new(verbs::ACK_ACK, e.to_string().into_bytes()),
    };
    match queue.ack(&msg_id).await {
        Ok(()) => {
            queue.update_consumer(session.id(), ConsumerStatus::Idle).await;
            Frame::new(verbs::ACK_ACK, b"OK".to_vec())
        }
        Err(e) => {
            debug!(channel = %channel, msg_id = %msg_id, error = %e, "ack failed");
            Frame::new(verbs::ACK_ACK, b"error".to_vec())
        }
    }
}

/// Unlike ack/nack, a missing message id is not an error — `Queue::reject`
/// is a silent no-op on an unknown id, and the consumer still returns to
/// `IDLE` so it is not stuck waiting on a message that is already gone.
async fn reject(data: Vec<u8>, session: &Arc<dyn Sendable>, state: &AppState) -> Frame {
    let Some((channel_raw, rest)) = split_first_space(&data) else {
        return Frame::new(verbs::REJECT_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let (Some(channel), Some(msg_id)) = (channel_name(channel_raw), token(rest)) else {
        return Frame::new(verbs::REJECT_ACK, MALFORMED_CHANNEL_MSGID.to_vec());
    };
    let queue = match state.registry.get(&channel) {
        Ok(q) => q,
        Err(e) => return Frame::new(verbs::REJECT_ACK, e.to_string().into_bytes()),
    };
    if let Err(e) = queue.reject(&msg_id).await {
        warn!(channel = %channel, msg_id = %msg_id, error = %e, "reject failed to persist");
        return Frame::new(verbs::REJECT_ACK, format!("error: {e}").into_bytes());
    }
    queue.update_consumer(session.id(), ConsumerStatus::Idle).await;
    Frame::new(verbs::REJECT_ACK, b"OK".to_vec())
}

async fn channel_create(data: Vec<u8>, state: &AppState) -> Frame {
    let Some(channel) = channel_name(&data) else {
        return Frame::new(verbs::CHANNEL_CREATE_ACK, MALFORMED_CHANNEL.to_vec());
    };
    match state.registry.create(&channel) {
        Ok(_) => Frame::new(verbs::CHANNEL_CREATE_ACK, b"OK".to_vec()),
        Err(e) => Frame::new(verbs::CHANNEL_CREATE_ACK, e.to_string().into_bytes()),
    }
}

async fn channel_join(data: Vec<u8>, state: &AppState) -> Frame {
    let Some(channel) = channel_name(&data) else {
        return Frame::new(verbs::CHANNEL_JOIN_ACK, MALFORMED_CHANNEL.to_vec());
    };
    match state.registry.get_or_create(&channel) {
        Ok(_) => Frame::new(verbs::CHANNEL_JOIN_ACK, b"OK".to_vec()),
        Err(e) => Frame::new(verbs::CHANNEL_JOIN_ACK, e.to_string().into_bytes()),
    }
}

async fn register_consumer(data: Vec<u8>, session: &Arc<dyn Sendable>, state: &AppState) -> Frame {
    let Some(channel) = channel_name(&data) else {
        return Frame::new(verbs::REGISTER_CONSUMER_ACK, MALFORMED_CHANNEL.to_vec());
    };
    match state.registry.get_or_create(&channel) {
        Ok(queue) => {
            queue.register_consumer(session.clone()).await;
            debug!(channel = %channel, session_id = session.id(), "consumer registered");
            Frame::new(verbs::REGISTER_CONSUMER_ACK, session.id().to_string().into_bytes())
        }
        Err(e) => Frame::new(verbs::REGISTER_CONSUMER_ACK, e.to_string().into_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker_protocol::Frame;

    struct FakeSession {
        id: u64,
        sent: std::sync::Mutex<Vec<Frame>>,
    }

    impl Sendable for FakeSession {
        fn id(&self) -> u64 {
            self.id
        }
        fn remote(&self) -> String {
            "127.0.0.1:1".to_owned()
        }
        fn send(&self, frame: Frame) -> bool {
            self.sent.lock().unwrap().push(frame);
            true
        }
    }

    fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = crate::config::Config::default();
        config.data_dir = dir.path().to_path_buf();
        (AppState::new(config), dir)
    }

    fn session(id: u64) -> Arc<dyn Sendable> {
        Arc::new(FakeSession {
            id,
            sent: std::sync::Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn publish_then_ack_round_trip() {
        let (state, _dir) = state();
        let sess = session(1);

        let publish_ack = dispatch(Frame::new(verbs::PUBLISH_REQ, b"general hello".to_vec()), &sess, &state)
            .await
            .unwrap();
        assert_eq!(publish_ack.msg_id, verbs::PUBLISH_ACK);
        let id = String::from_utf8(publish_ack.data).unwrap();
        assert_eq!(id.len(), 28);

        let ack_body = format!("GENERAL {id}").into_bytes();
        let ack_ack = dispatch(Frame::new(verbs::ACK_REQ, ack_body), &sess, &state).await.unwrap();
        assert_eq!(ack_ack.msg_id, verbs::ACK_ACK);
        assert_eq!(ack_ack.data, b"OK");
    }

    #[tokio::test]
    async fn ack_unknown_channel_reports_queue_not_found() {
        let (state, _dir) = state();
        let sess = session(1);
        let resp = dispatch(Frame::new(verbs::ACK_REQ, b"NOPE someid".to_vec()), &sess, &state)
            .await
            .unwrap();
        assert_eq!(resp.msg_id, verbs::ACK_ACK);
        assert!(String::from_utf8(resp.data).unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn ack_unknown_message_id_reports_error() {
        let (state, _dir) = state();
        let sess = session(1);
        dispatch(Frame::new(verbs::CHANNEL_CREATE_REQ, b"GENERAL".to_vec()), &sess, &state)
            .await
            .unwrap();
        let resp = dispatch(Frame::new(verbs::ACK_REQ, b"GENERAL bogus".to_vec()), &sess, &state)
            .await
            .unwrap();
        assert_eq!(resp.data, b"error");
    }

    #[tokio::test]
    async fn reject_unknown_message_id_is_still_ok() {
        let (state, _dir) = state();
        let sess = session(1);
        dispatch(Frame::new(verbs::CHANNEL_CREATE_REQ, b"GENERAL".to_vec()), &sess, &state)
            .await
            .unwrap();
        let resp = dispatch(Frame::new(verbs::REJECT_REQ, b"GENERAL bogus".to_vec()), &sess, &state)
            .await
            .unwrap();
        assert_eq!(resp.data, b"OK");
    }

    #[tokio::test]
    async fn register_consumer_returns_session_id() {
        let (state, _dir) = state();
        let sess = session(42);
        let resp = dispatch(
            Frame::new(verbs::REGISTER_CONSUMER_REQ, b"GENERAL".to_vec()),
            &sess,
            &state,
        )
        .await
        .unwrap();
        assert_eq!(resp.data, b"42");
    }

    #[tokio::test]
    async fn malformed_publish_reports_error_without_touching_registry() {
        let (state, _dir) = state();
        let sess = session(1);
        let resp = dispatch(Frame::new(verbs::PUBLISH_REQ, b"nospacehere".to_vec()), &sess, &state)
            .await
            .unwrap();
        assert_eq!(resp.msg_id, verbs::PUBLISH_ACK);
        assert!(String::from_utf8(resp.data).unwrap().starts_with("error"));
    }

    #[tokio::test]
    async fn unknown_verb_gets_no_response() {
        let (state, _dir) = state();
        let sess = session(1);
        assert!(dispatch(Frame::new(verbs::NEXT_REQ, Vec::new()), &sess, &state)
            .await
            .is_none());
    }
}
