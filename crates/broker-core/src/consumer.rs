//! Consumer roster entries and the narrow capability used to reach a session.

use broker_protocol::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerStatus {
    Idle,
    Working,
    WaitingNack,
    Unregistered,
}

/// The only thing a queue needs from a session: an id to key consumer
/// records by, a remote address for introspection, and a way to push a
/// frame out. Keeping this as a trait instead of a concrete session handle
/// avoids a queue -> session -> broker -> queue reference cycle.
pub trait Sendable: Send + Sync {
    fn id(&self) -> u64;
    fn remote(&self) -> String;
    /// Enqueue `frame` on the session's outbound channel. Returns `false` if
    /// the session has already gone away; the caller should not treat that
    /// as fatal for the queue itself.
    fn send(&self, frame: Frame) -> bool;
}

pub struct Consumer {
    pub session: std::sync::Arc<dyn Sendable>,
    pub status: ConsumerStatus,
    pub last_message: Option<String>,
}

impl Consumer {
    pub fn new(session: std::sync::Arc<dyn Sendable>) -> Self {
        Self {
            session,
            status: ConsumerStatus::Idle,
            last_message: None,
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct FakeSession {
        id: u64,
        sent: AtomicBool,
    }

    impl Sendable for FakeSession {
        fn id(&self) -> u64 {
            self.id
        }
        fn remote(&self) -> String {
            "127.0.0.1:0".to_owned()
        }
        fn send(&self, _frame: Frame) -> bool {
            self.sent.store(true, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn consumer_starts_idle() {
        let session = Arc::new(FakeSession {
            id: 1,
            sent: AtomicBool::new(false),
        });
        let consumer = Consumer::new(session);
        assert_eq!(consumer.status, ConsumerStatus::Idle);
        assert_eq!(consumer.session_id(), 1);
    }
}
