//! Read-only HTTP introspection surface: `GET /qc` (JSON snapshot of every
//! queue) and `GET /healthz` (liveness). Rebuilt on `axum` to match the
//! rest of the workspace's HTTP stack; the original broker served the same
//! `/qc` shape off a Gin router instead.

use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use broker_core::ConsumerStatus;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct ServerInfo {
    instance_name: String,
    server_addr: String,
    memory_alloc: u64,
    memory_total: u64,
    memory_sys: u64,
    memory_gc: u64,
}

#[derive(Serialize)]
struct ConsumerSnapshot {
    ip: String,
    status: &'static str,
}

#[derive(Serialize)]
struct QueueSnapshot {
    name: String,
    total_messages: usize,
    ack_messages: usize,
    un_ack_messages: usize,
    rejected_messages: usize,
    consumers: Vec<ConsumerSnapshot>,
    memory_size: usize,
}

#[derive(Serialize)]
struct WebInfo {
    #[serde(rename = "serverInfo")]
    server_info: ServerInfo,
    queues: BTreeMap<String, QueueSnapshot>,
}

fn consumer_status_name(status: ConsumerStatus) -> &'static str {
    match status {
        ConsumerStatus::Idle => "idle",
        ConsumerStatus::Working => "working",
        ConsumerStatus::WaitingNack => "waiting_nack",
        ConsumerStatus::Unregistered => "unregistered",
    }
}

/// Resident/virtual memory in MB, read from `/proc/self/status`. Rust has
/// no equivalent of Go's `runtime.MemStats`, so this is an approximation —
/// zeros on any platform or parse failure, matched by the original's own
/// `bToMb` rounding.
fn memory_snapshot() -> (u64, u64, u64) {
    let Ok(contents) = std::fs::read_to_string("/proc/self/status") else {
        return (0, 0, 0);
    };
    let mut vm_rss_kb = 0u64;
    let mut vm_size_kb = 0u64;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            vm_rss_kb = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("VmSize:") {
            vm_size_kb = parse_kb(rest);
        }
    }
    (vm_rss_kb / 1024, vm_size_kb / 1024, vm_size_kb * 1024)
}

fn parse_kb(field: &str) -> u64 {
    field.trim().trim_end_matches(" kB").trim().parse().unwrap_or(0)
}

async fn get_qc(State(state): State<AppState>) -> Json<WebInfo> {
    let (memory_alloc, memory_total, memory_sys) = memory_snapshot();
    let server_info = ServerInfo {
        instance_name: state.config.instance_name.clone(),
        server_addr: format!("tcp://{}", state.config.listen_addr),
        memory_alloc,
        memory_total,
        memory_sys,
        memory_gc: 0,
    };
    let mut queues = BTreeMap::new();
    for queue in state.registry.list() {
        let info = queue.info().await;
        queues.insert(
            info.name.clone(),
            QueueSnapshot {
                name: info.name,
                total_messages: info.total_messages,
                ack_messages: info.ack_messages,
                un_ack_messages: info.un_ack_messages,
                rejected_messages: info.rejected_messages,
                consumers: info
                    .consumers
                    .into_iter()
                    .filter(|(ip, _)| !ip.is_empty())
                    .map(|(ip, status)| ConsumerSnapshot {
                        ip,
                        status: consumer_status_name(status),
                    })
                    .collect(),
                memory_size: info.memory_size,
            },
        );
    }
    Json(WebInfo { server_info, queues })
}

async fn get_healthz() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/qc", get(get_qc))
        .route("/healthz", get(get_healthz))
        .with_state(state)
}
