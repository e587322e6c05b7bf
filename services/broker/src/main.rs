use broker::config::Config;
use broker::state::AppState;
use broker::{http, session};
use broker_core::distributor::{self, DistributorConfig};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    std::fs::create_dir_all(&config.data_dir).unwrap_or_else(|e| {
        panic!("failed to create data directory {}: {e}", config.data_dir.display());
    });

    let state = AppState::new(config);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let distributor_handle = tokio::spawn(distributor::run(
        state.registry.clone(),
        DistributorConfig {
            max_distribute_ack: state.config.max_distribute_ack,
            ..Default::default()
        },
        shutdown_rx.clone(),
    ));

    let http_listener = TcpListener::bind(&state.config.http_addr)
        .await
        .expect("failed to bind http introspection listener");
    info!(addr = %state.config.http_addr, "http introspection listening");
    let http_handle = {
        let router = http::router(state.clone());
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let serve = axum::serve(http_listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "http introspection server exited with error");
            }
        })
    };

    let tcp_listener = TcpListener::bind(&state.config.listen_addr)
        .await
        .expect("failed to bind tcp listener");
    info!(addr = %state.config.listen_addr, "broker listening");

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let mut accept_shutdown = shutdown_rx.clone();
    let mut sessions = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = accept_shutdown.changed() => {
                info!("accept loop exiting on shutdown signal");
                break;
            }
            accepted = tcp_listener.accept() => {
                match accepted {
                    Ok((stream, remote)) => {
                        let session_state = state.clone();
                        let session_shutdown = shutdown_rx.clone();
                        sessions.push(tokio::spawn(session::run(stream, remote, session_state, session_shutdown)));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                }
            }
        }
    }

    for task in sessions {
        let _ = task.await;
    }
    let _ = distributor_handle.await;
    let _ = http_handle.await;
    info!("broker shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
