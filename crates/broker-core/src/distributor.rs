//! The background distribution loop: pairs ready messages with idle
//! consumers and expires stale in-flight deliveries.

use crate::registry::Registry;
use base64::Engine as _;
use broker_protocol::{verbs, Frame};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct DistributorConfig {
    /// Grace period before the first tick, to let the listener finish binding.
    pub startup_grace: Duration,
    /// Sleep between full passes over every queue.
    pub tick_interval: Duration,
    /// How long a message may sit `WaitingAck` before it is restored to `Ready`.
    pub max_distribute_ack: Duration,
}

impl Default for DistributorConfig {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(5),
            tick_interval: Duration::from_millis(300),
            max_distribute_ack: Duration::from_secs(30),
        }
    }
}

/// Run the distribution loop until `shutdown` is set to `true`. Intended to
/// be spawned as its own task; `await`s the task handle on shutdown to let
/// an in-flight tick finish and its snapshot flush before the process exits.
pub async fn run(
    registry: Arc<Registry>,
    config: DistributorConfig,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    debug!("distributor starting, waiting out startup grace period");
    tokio::select! {
        () = tokio::time::sleep(config.startup_grace) => {}
        _ = shutdown.changed() => return,
    }

    let max_wait_ns = config.max_distribute_ack.as_nanos() as i64;
    loop {
        if *shutdown.borrow() {
            return;
        }
        for queue in registry.list() {
            if let Err(e) = queue.check_expired(max_wait_ns).await {
                warn!(queue = %queue.name, error = %e, "failed to expire stale deliveries");
            }

            let dispatched = queue.dispatch_tick().await;
            for (msg, session) in dispatched {
                let body = format!(
                    "{} {}",
                    msg.id,
                    base64::engine::general_purpose::STANDARD.encode(&msg.data)
                );
                let frame = Frame::new(verbs::DISTRIBUTE, body.into_bytes());
                debug!(queue = %queue.name, msg_id = %msg.id, consumer = %session.id(), "distributing message");
                if !session.send(frame) {
                    warn!(queue = %queue.name, msg_id = %msg.id, consumer = %session.id(), "consumer session gone, message remains waiting-ack until redelivery timer fires");
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(config.tick_interval) => {}
            _ = shutdown.changed() => return,
        }
    }
}
