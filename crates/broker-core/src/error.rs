use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue {0} has no ready message")]
    QueueEmpty(String),
    #[error("message {0} not found")]
    MessageNotFound(String),
    #[error("queue {0} already exists")]
    QueueAlreadyExists(String),
    #[error("persistence i/o error for queue {queue}: {source}")]
    PersistenceIo {
        queue: String,
        #[source]
        source: std::io::Error,
    },
    #[error("persistence record for queue {queue} is corrupt: {reason}")]
    PersistenceCorrupt { queue: String, reason: String },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("queue {0} not found")]
    QueueNotFound(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
}
