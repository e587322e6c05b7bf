//! Shared process state handed to every session and to the HTTP introspection
//! endpoint.

use crate::config::Config;
use broker_core::Registry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<Config>,
    next_session_id: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        Self {
            registry: Arc::new(Registry::new(config.data_dir.clone())),
            config,
            next_session_id: Arc::new(AtomicU64::new(1)),
            started_at: Instant::now(),
        }
    }

    /// Monotonically increasing session id, unique for the life of the process.
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::SeqCst)
    }
}
