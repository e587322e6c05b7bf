//! Per-connection read/write tasks and dispatch into the handler layer.

use crate::handlers;
use crate::state::AppState;
use broker_core::Sendable;
use broker_protocol::{read_frame, Frame};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub struct TcpSession {
    id: u64,
    remote: String,
    outbound: mpsc::UnboundedSender<Frame>,
}

impl Sendable for TcpSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn remote(&self) -> String {
        self.remote.clone()
    }

    fn send(&self, frame: Frame) -> bool {
        self.outbound.send(frame).is_ok()
    }
}

/// Drive one accepted connection until EOF, a protocol error, or shutdown.
/// Unregisters the session from every queue it joined as a consumer before
/// returning.
pub async fn run(stream: TcpStream, remote: SocketAddr, state: AppState, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let id = state.next_session_id();
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();
    let session: Arc<dyn Sendable> = Arc::new(TcpSession {
        id,
        remote: remote.to_string(),
        outbound: tx,
    });

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = frame.write_to(&mut writer).await {
                warn!(session_id = id, error = %e, "failed writing frame, closing session");
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    info!(session_id = id, remote = %remote, "session accepted");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!(session_id = id, "session loop exiting on shutdown signal");
                break;
            }
            result = read_frame(&mut reader, state.config.max_frame_data) => {
                match result {
                    Ok(frame) => {
                        let ack = handlers::dispatch(frame, &session, &state).await;
                        if let Some(ack) = ack {
                            if !session.send(ack) {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        debug!(session_id = id, error = %e, "session read ended");
                        break;
                    }
                }
            }
        }
    }

    writer_task.abort();
    state.registry.unregister_consumer_everywhere(id).await;
    info!(session_id = id, "session closed");
}
