//! Per-binary configuration, loaded from environment variables (or
//! flags of the same name) with the defaults each service shipped
//! with. One `clap::Parser` derive struct per binary.

use clap::Parser;

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::peer_directory::DEFAULT_STALE_TIMEOUT_SECS;
use crate::replication::DEFAULT_REPLICATION_FACTOR;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "DHT-style peer directory and chunk tracker")]
pub struct TrackerConfig {
    #[arg(long, env = "DHT_TRACKER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "DHT_TRACKER_PORT", default_value_t = 8500)]
    pub port: u16,

    #[arg(long, env = "NODE_STALE_TIMEOUT", default_value_t = DEFAULT_STALE_TIMEOUT_SECS)]
    pub node_stale_timeout: u64,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Content-addressed chunk store and proof-of-retrievability peer")]
pub struct StorageNodeConfig {
    #[arg(long, env = "STORAGE_NODE_PORT", default_value_t = 9000)]
    pub port: u16,

    #[arg(long, env = "STORAGE_DATA_DIR", default_value = "./data/chunks")]
    pub data_dir: String,

    #[arg(long, env = "DHT_TRACKER_URL", default_value = "http://localhost:8500")]
    pub dht_tracker_url: String,

    #[arg(long, env = "NODE_ID", default_value = "node-default")]
    pub node_id: String,

    #[arg(long, env = "NODE_ADVERTISE_URL", default_value = "http://localhost:9000")]
    pub node_advertise_url: String,

    #[arg(long, env = "HEARTBEAT_INTERVAL", default_value_t = 15)]
    pub heartbeat_interval_secs: u64,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Upload/download gateway orchestrating chunking, encryption, and replication")]
pub struct GatewayConfig {
    #[arg(long, env = "GATEWAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "GATEWAY_PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "DHT_TRACKER_URL", default_value = "http://localhost:8500")]
    pub dht_tracker_url: String,

    #[arg(long, env = "CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    #[arg(long, env = "REPLICATION_FACTOR", default_value_t = DEFAULT_REPLICATION_FACTOR)]
    pub replication_factor: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_config_applies_defaults_with_no_args() {
        let cfg = TrackerConfig::parse_from(["tracker"]);
        assert_eq!(cfg.port, 8500);
        assert_eq!(cfg.node_stale_timeout, DEFAULT_STALE_TIMEOUT_SECS);
    }

    #[test]
    fn storage_node_config_accepts_overrides() {
        let cfg = StorageNodeConfig::parse_from([
            "storage-node",
            "--port",
            "9100",
            "--node-id",
            "node-a",
        ]);
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.node_id, "node-a");
        assert_eq!(cfg.heartbeat_interval_secs, 15);
    }

    #[test]
    fn gateway_config_applies_defaults_with_no_args() {
        let cfg = GatewayConfig::parse_from(["gateway"]);
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.replication_factor, DEFAULT_REPLICATION_FACTOR);
    }
}
