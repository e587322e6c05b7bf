//! Environment-driven configuration. Every option has a default; there is no
//! config file — the option set is small and flat enough that env vars with
//! defaults (as `server`'s own `main.rs` reads `LOG_LEVEL`/`DATABASE_URL`)
//! are a better fit here than a TOML layer.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub max_distribute_ack: Duration,
    pub listen_addr: String,
    pub http_addr: String,
    pub max_frame_data: u32,
    pub log_level: String,
    /// Shown in the `/qc` introspection snapshot's `serverInfo.instance_name`.
    pub instance_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_distribute_ack: Duration::from_secs(30),
            listen_addr: "0.0.0.0:5896".to_owned(),
            http_addr: "0.0.0.0:15896".to_owned(),
            max_frame_data: broker_protocol::DEFAULT_MAX_FRAME_DATA,
            log_level: "info".to_owned(),
            instance_name: "instance".to_owned(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            max_distribute_ack: std::env::var("MAX_TIME_DISTRIBUTED_ACK")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.max_distribute_ack),
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            http_addr: std::env::var("HTTP_ADDR").unwrap_or(defaults.http_addr),
            max_frame_data: std::env::var("MAX_FRAME_DATA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_frame_data),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            instance_name: std::env::var("INSTANCE_NAME").unwrap_or(defaults.instance_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:5896");
        assert_eq!(cfg.http_addr, "0.0.0.0:15896");
        assert_eq!(cfg.max_distribute_ack, Duration::from_secs(30));
        assert_eq!(cfg.max_frame_data, broker_protocol::DEFAULT_MAX_FRAME_DATA);
    }
}
