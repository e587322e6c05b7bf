//! Process-wide name -> queue mapping.

use crate::error::{QueueError, RegistryError};
use crate::queue::Queue;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

pub struct Registry {
    data_dir: PathBuf,
    persistence_lock: Arc<AsyncMutex<()>>,
    queues: std::sync::Mutex<HashMap<String, Arc<Queue>>>,
}

impl Registry {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            persistence_lock: Arc::new(AsyncMutex::new(())),
            queues: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Explicit create; errors if `name` is already registered. The core
    /// handlers never call this — they always use `get_or_create` — but it
    /// is kept as its own operation for the `CHANNEL CREATE` wire verb.
    pub fn create(&self, name: &str) -> Result<Arc<Queue>, RegistryError> {
        let mut queues = self.queues.lock().expect("registry lock poisoned");
        if queues.contains_key(name) {
            return Err(RegistryError::Queue(QueueError::QueueAlreadyExists(name.to_owned())));
        }
        let queue = Arc::new(Queue::load(name, self.data_dir.clone(), self.persistence_lock.clone())?);
        queues.insert(name.to_owned(), queue.clone());
        Ok(queue)
    }

    pub fn get_or_create(&self, name: &str) -> Result<Arc<Queue>, RegistryError> {
        let mut queues = self.queues.lock().expect("registry lock poisoned");
        if let Some(q) = queues.get(name) {
            return Ok(q.clone());
        }
        let queue = Arc::new(Queue::load(name, self.data_dir.clone(), self.persistence_lock.clone())?);
        queues.insert(name.to_owned(), queue.clone());
        Ok(queue)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Queue>, RegistryError> {
        self.queues
            .lock()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::QueueNotFound(name.to_owned()))
    }

    /// Snapshot of currently registered queue names, for the distributor's
    /// per-tick scan and the HTTP introspection endpoint.
    pub fn list(&self) -> Vec<Arc<Queue>> {
        self.queues
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Mark `session_id` unregistered on every queue it may be a consumer
    /// of. Called once when a session closes; cheaper than tracking which
    /// queues a session joined since registrations are rare relative to
    /// message traffic.
    pub async fn unregister_consumer_everywhere(&self, session_id: u64) {
        for queue in self.list() {
            queue.unregister_consumer(session_id).await;
        }
    }
}
