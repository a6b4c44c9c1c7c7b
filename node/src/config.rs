// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-node settings.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Display name the node registers in the directory.
    pub name: String,
    pub track_log_path: PathBuf,
    pub error_log_path: PathBuf,
    pub dedup_ledger_path: PathBuf,
    /// Bound on each wait for a counterparty message during signing and queries.
    pub session_timeout: Duration,
    /// Bound on the wait for durability at the counterparty.
    pub finality_timeout: Duration,
    /// How often a quarantined flow is re-run from its last checkpoint.
    pub hospital_max_retries: u32,
    pub hospital_backoff: Duration,
}

impl NodeConfig {
    /// Config for `name` with its files under `data_dir/<name>/`.
    pub fn for_node(name: impl Into<String>, data_dir: impl AsRef<Path>) -> Self {
        let name = name.into();
        let dir = data_dir.as_ref().join(&name);
        Self {
            track_log_path: dir.join("track-data.txt"),
            error_log_path: dir.join("track-errors.txt"),
            dedup_ledger_path: dir.join("seen.txt"),
            name,
            ..Default::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "PartyA".to_string(),
            track_log_path: PathBuf::from("track-data.txt"),
            error_log_path: PathBuf::from("track-errors.txt"),
            dedup_ledger_path: PathBuf::from("seen.txt"),
            session_timeout: Duration::from_secs(30),
            finality_timeout: Duration::from_secs(30),
            hospital_max_retries: 3,
            hospital_backoff: Duration::from_millis(200),
        }
    }
}

/// Settings for the `cosign-node` binary, which hosts an in-process network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub nodes: Vec<String>,
    pub notary_name: String,
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
    pub session_timeout: Duration,
    pub finality_timeout: Duration,
    pub hospital_max_retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["PartyA".to_string(), "PartyB".to_string()],
            notary_name: "Notary".to_string(),
            data_dir: PathBuf::from("cosign-data"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            auth_token: None,
            session_timeout: Duration::from_secs(30),
            finality_timeout: Duration::from_secs(30),
            hospital_max_retries: 3,
        }
    }
}

impl NetworkConfig {
    /// Defaults overridden by `COSIGN_*` environment variables. Unparsable values
    /// are ignored with a warning.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(nodes) = std::env::var("COSIGN_NODES") {
            let nodes: Vec<String> = nodes
                .split(',')
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect();
            if !nodes.is_empty() {
                cfg.nodes = nodes;
            }
        }
        if let Ok(name) = std::env::var("COSIGN_NOTARY") {
            cfg.notary_name = name;
        }
        if let Ok(dir) = std::env::var("COSIGN_DATA_DIR") {
            cfg.data_dir = PathBuf::from(dir);
        }
        if let Some(addr) = parse_env::<SocketAddr>("COSIGN_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        if let Ok(token) = std::env::var("COSIGN_AUTH_TOKEN") {
            cfg.auth_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(ms) = parse_env::<u64>("COSIGN_SESSION_TIMEOUT_MS") {
            cfg.session_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_env::<u64>("COSIGN_FINALITY_TIMEOUT_MS") {
            cfg.finality_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_env::<u32>("COSIGN_HOSPITAL_RETRIES") {
            cfg.hospital_max_retries = n;
        }

        cfg
    }

    pub fn node_config(&self, name: &str) -> NodeConfig {
        NodeConfig {
            session_timeout: self.session_timeout,
            finality_timeout: self.finality_timeout,
            hospital_max_retries: self.hospital_max_retries,
            ..NodeConfig::for_node(name, &self.data_dir)
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_files_live_under_node_dir() {
        let cfg = NodeConfig::for_node("PartyB", "/tmp/cosign");
        assert_eq!(cfg.name, "PartyB");
        assert_eq!(cfg.track_log_path, PathBuf::from("/tmp/cosign/PartyB/track-data.txt"));
        assert_eq!(cfg.dedup_ledger_path, PathBuf::from("/tmp/cosign/PartyB/seen.txt"));
    }

    #[test]
    fn test_network_config_propagates_timeouts() {
        let net = NetworkConfig {
            session_timeout: Duration::from_millis(5),
            hospital_max_retries: 0,
            ..Default::default()
        };
        let cfg = net.node_config("PartyA");
        assert_eq!(cfg.session_timeout, Duration::from_millis(5));
        assert_eq!(cfg.hospital_max_retries, 0);
        assert_eq!(cfg.finality_timeout, net.finality_timeout);
    }
}
