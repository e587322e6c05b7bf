//! A single named queue: message storage, consumer roster, and the mutex
//! that serializes every mutation against it.

use crate::consumer::{Consumer, ConsumerStatus, Sendable};
use crate::error::QueueError;
use crate::message::{now_nanos, Message, MessageStatus};
use crate::persistence;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

struct QueueState {
    order: Vec<String>,
    storage: HashMap<String, Message>,
    consumers: Vec<Consumer>,
}

impl QueueState {
    fn messages_in_order(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(move |id| self.storage.get(id))
    }
}

/// Point-in-time counts for the introspection snapshot (`[qc]` HTTP endpoint).
pub struct QueueInfo {
    pub name: String,
    pub total_messages: usize,
    pub ack_messages: usize,
    pub un_ack_messages: usize,
    pub rejected_messages: usize,
    pub consumers: Vec<(String, ConsumerStatus)>,
    pub memory_size: usize,
}

pub struct Queue {
    pub name: String,
    data_dir: PathBuf,
    persistence_lock: Arc<Mutex<()>>,
    state: Mutex<QueueState>,
}

impl Queue {
    /// Create a queue, replaying any existing persistence file for `name`
    /// under `data_dir`. Replayed messages always come back `Ready`.
    pub fn load(
        name: impl Into<String>,
        data_dir: PathBuf,
        persistence_lock: Arc<Mutex<()>>,
    ) -> Result<Self, QueueError> {
        let name = name.into();
        let replayed = persistence::replay(&data_dir, &name)?;
        let mut order = Vec::with_capacity(replayed.len());
        let mut storage = HashMap::with_capacity(replayed.len());
        for msg in replayed {
            order.push(msg.id.clone());
            storage.insert(msg.id.clone(), msg);
        }
        Ok(Self {
            name,
            data_dir,
            persistence_lock,
            state: Mutex::new(QueueState {
                order,
                storage,
                consumers: Vec::new(),
            }),
        })
    }

    async fn snapshot(&self, state: &QueueState) -> Result<(), QueueError> {
        let _guard = self.persistence_lock.lock().await;
        persistence::write_snapshot(&self.data_dir, &self.name, state.messages_in_order())
    }

    pub async fn publish(&self, data: Vec<u8>) -> Result<String, QueueError> {
        let mut state = self.state.lock().await;
        let msg = Message::new(self.name.clone(), data);
        let id = msg.id.clone();
        state.order.push(id.clone());
        state.storage.insert(id.clone(), msg);
        self.snapshot(&state).await?;
        Ok(id)
    }

    /// First `Ready` message in publish order, without transitioning it.
    /// The distributor (`dispatch_tick`) is the only path that advances a
    /// message out of `Ready`.
    pub async fn next_ready(&self) -> Result<Message, QueueError> {
        let state = self.state.lock().await;
        state
            .messages_in_order()
            .find(|m| m.status == MessageStatus::Ready)
            .cloned()
            .ok_or_else(|| QueueError::QueueEmpty(self.name.clone()))
    }

    pub async fn ack(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if !state.storage.contains_key(id) {
            return Err(QueueError::MessageNotFound(id.to_owned()));
        }
        state.storage.remove(id);
        state.order.retain(|x| x != id);
        self.snapshot(&state).await?;
        Ok(())
    }

    pub async fn unack(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let msg = state
            .storage
            .get_mut(id)
            .ok_or_else(|| QueueError::MessageNotFound(id.to_owned()))?;
        msg.status = MessageStatus::Unack;
        self.snapshot(&state).await?;
        Ok(())
    }

    /// Unlike `ack`/`unack`, a missing id is not an error — matching the
    /// original handler's silent-success behavior on REJECT.
    pub async fn reject(&self, id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        if let Some(msg) = state.storage.get_mut(id) {
            msg.status = MessageStatus::Rejected;
            state.order.retain(|x| x != id);
            self.snapshot(&state).await?;
        }
        Ok(())
    }

    pub async fn register_consumer(&self, session: Arc<dyn Sendable>) {
        let mut state = self.state.lock().await;
        state.consumers.push(Consumer::new(session));
    }

    pub async fn update_consumer(&self, session_id: u64, status: ConsumerStatus) {
        let mut state = self.state.lock().await;
        if let Some(c) = state.consumers.iter_mut().find(|c| c.session_id() == session_id) {
            c.status = status;
        }
    }

    pub async fn unregister_consumer(&self, session_id: u64) {
        self.update_consumer(session_id, ConsumerStatus::Unregistered).await;
    }

    /// Restore any `WaitingAck` message whose redelivery timer has expired
    /// back to `Ready`. Does not touch the corresponding consumer's status —
    /// a consumer that never responds stays `WaitingNack` until it sends an
    /// ACK/REJECT or its session closes (see design notes on this tradeoff).
    pub async fn check_expired(&self, max_wait_ns: i64) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        let now = now_nanos();
        let mut any_expired = false;
        for msg in state.storage.values_mut() {
            if msg.status == MessageStatus::WaitingAck && now - msg.timestamp >= max_wait_ns {
                msg.status = MessageStatus::Ready;
                any_expired = true;
            }
        }
        if any_expired {
            self.snapshot(&state).await?;
        }
        Ok(())
    }

    /// One distributor pass over this queue: for every `Idle` consumer (in
    /// registration order), claim the next `Ready` message and transition
    /// both to their in-flight states. Stops scanning consumers as soon as
    /// no `Ready` message remains, matching the original distributor's
    /// early-break behavior. Returns the (message, session) pairs to send —
    /// sending happens outside the lock so a slow consumer can't stall the
    /// whole queue.
    pub async fn dispatch_tick(&self) -> Vec<(Message, Arc<dyn Sendable>)> {
        let mut state = self.state.lock().await;
        let mut dispatched = Vec::new();
        let now = now_nanos();
        for i in 0..state.consumers.len() {
            if state.consumers[i].status != ConsumerStatus::Idle {
                continue;
            }
            let ready_id = state
                .order
                .iter()
                .find(|id| matches!(state.storage.get(id.as_str()).map(|m| m.status), Some(MessageStatus::Ready)))
                .cloned();
            let Some(id) = ready_id else {
                break;
            };
            let msg = {
                let m = state
                    .storage
                    .get_mut(&id)
                    .expect("id present in order must be present in storage");
                m.status = MessageStatus::WaitingAck;
                m.timestamp = now;
                m.clone()
            };
            state.consumers[i].status = ConsumerStatus::WaitingNack;
            state.consumers[i].last_message = Some(id);
            dispatched.push((msg, state.consumers[i].session.clone()));
        }
        if !dispatched.is_empty() {
            // Best-effort: a snapshot failure here shouldn't crash the
            // distributor loop, only get logged by the caller.
            let _ = self.snapshot(&state).await;
        }
        dispatched
    }

    pub async fn info(&self) -> QueueInfo {
        let state = self.state.lock().await;
        let mut ack_messages = 0;
        let mut un_ack_messages = 0;
        let mut rejected_messages = 0;
        let mut memory_size = 0;
        for msg in state.storage.values() {
            memory_size += msg.data.len();
            match msg.status {
                MessageStatus::Ack => ack_messages += 1,
                MessageStatus::Unack => un_ack_messages += 1,
                MessageStatus::Rejected => rejected_messages += 1,
                _ => {}
            }
        }
        let consumers = state
            .consumers
            .iter()
            .map(|c| (c.session.remote(), c.status))
            .collect();
        QueueInfo {
            name: self.name.clone(),
            total_messages: state.storage.len(),
            ack_messages,
            un_ack_messages,
            rejected_messages,
            consumers,
            memory_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Sendable;
    use broker_protocol::Frame;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSession {
        id: u64,
        sent: std::sync::Mutex<Vec<Frame>>,
    }

    impl Sendable for RecordingSession {
        fn id(&self) -> u64 {
            self.id
        }
        fn remote(&self) -> String {
            format!("consumer-{}", self.id)
        }
        fn send(&self, frame: Frame) -> bool {
            self.sent.lock().unwrap().push(frame);
            true
        }
    }

    fn queue(dir: &std::path::Path) -> Queue {
        Queue::load("GENERAL", dir.to_path_buf(), Arc::new(Mutex::new(()))).unwrap()
    }

    #[tokio::test]
    async fn publish_then_ack_removes_from_order_and_storage() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        let id = q.publish(b"payload".to_vec()).await.unwrap();
        q.ack(&id).await.unwrap();
        assert!(matches!(
            q.next_ready().await,
            Err(QueueError::QueueEmpty(_))
        ));
    }

    #[tokio::test]
    async fn ack_unknown_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        let err = q.ack("does-not-exist").await.unwrap_err();
        assert!(matches!(err, QueueError::MessageNotFound(_)));
    }

    #[tokio::test]
    async fn reject_unknown_id_is_silently_ok() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        q.reject("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_tick_pairs_ready_message_with_idle_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        let id = q.publish(b"hello".to_vec()).await.unwrap();
        let session = Arc::new(RecordingSession {
            id: 1,
            sent: std::sync::Mutex::new(Vec::new()),
        });
        q.register_consumer(session.clone()).await;

        let dispatched = q.dispatch_tick().await;
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].0.id, id);

        // A second tick with no new messages and the consumer no longer idle
        // dispatches nothing.
        let dispatched_again = q.dispatch_tick().await;
        assert!(dispatched_again.is_empty());
    }

    #[tokio::test]
    async fn dispatch_tick_stops_scanning_once_no_ready_messages_remain() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        q.publish(b"only one".to_vec()).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        struct CountingSession {
            id: u64,
            calls: Arc<AtomicUsize>,
        }
        impl Sendable for CountingSession {
            fn id(&self) -> u64 {
                self.id
            }
            fn remote(&self) -> String {
                "x".to_owned()
            }
            fn send(&self, _f: Frame) -> bool {
                self.calls.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
        q.register_consumer(Arc::new(CountingSession { id: 1, calls: calls.clone() }))
            .await;
        q.register_consumer(Arc::new(CountingSession { id: 2, calls: calls.clone() }))
            .await;

        let dispatched = q.dispatch_tick().await;
        assert_eq!(dispatched.len(), 1, "only one ready message for two idle consumers");
    }

    #[tokio::test]
    async fn check_expired_restores_waiting_ack_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let q = queue(dir.path());
        let id = q.publish(b"data".to_vec()).await.unwrap();
        let session = Arc::new(RecordingSession {
            id: 1,
            sent: std::sync::Mutex::new(Vec::new()),
        });
        q.register_consumer(session).await;
        q.dispatch_tick().await;

        // Not yet expired with a generous window.
        q.check_expired(60_000_000_000).await.unwrap();
        assert!(matches!(q.next_ready().await, Err(QueueError::QueueEmpty(_))));

        // Expire immediately with a zero window.
        q.check_expired(0).await.unwrap();
        let ready = q.next_ready().await.unwrap();
        assert_eq!(ready.id, id);
    }

    #[tokio::test]
    async fn persists_and_replays_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let lock = Arc::new(Mutex::new(()));
        let id = {
            let q = Queue::load("GENERAL", dir.path().to_path_buf(), lock.clone()).unwrap();
            q.publish(b"durable".to_vec()).await.unwrap()
        };
        let reloaded = Queue::load("GENERAL", dir.path().to_path_buf(), lock).unwrap();
        let msg = reloaded.next_ready().await.unwrap();
        assert_eq!(msg.id, id);
        assert_eq!(msg.data, b"durable");
    }
}
