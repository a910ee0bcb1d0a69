//! src/config.rs
//!
//! Defines the strongly-typed `Config` struct for all runtime parameters,
//! loaded from a config file and environment variables via `figment`, then
//! overridden by CLI flags in `main.rs`.

use crate::domain::Endpoint;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level struct holding all application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub node_id: String,
    pub endpoint: Endpoint,
    pub bootstrap_peers: Vec<Endpoint>,

    pub gossip_interval_ms: u64,

    pub heartbeat_interval_ms: u64,
    pub miss_threshold: u32,
    pub grace_period: u32,

    pub choking_interval_ms: u64,
    pub max_unchoked: usize,
    pub optimistic_interval: u32,

    pub reputation_interval_ms: u64,

    pub content_catalog: Vec<String>,
    pub publish_interval_ms: u64,
    pub audit_interval_ms: u64,

    /// Local observability surface. Disabled when absent.
    pub status_addr: Option<SocketAddr>,
}

impl Config {
    /// Loads configuration from `config.toml` and `OVERLAY_`-prefixed
    /// environment variables, layered on top of `Default`.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("OVERLAY_"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            endpoint: String::new(),
            bootstrap_peers: Vec::new(),

            gossip_interval_ms: 15_000,

            heartbeat_interval_ms: 10_000,
            miss_threshold: 3,
            grace_period: 2,

            choking_interval_ms: 30_000,
            max_unchoked: 4,
            optimistic_interval: 3,

            reputation_interval_ms: 30_000,

            content_catalog: vec![
                "show:midnight-run".to_string(),
                "show:neon-drift".to_string(),
                "show:binary-sunset".to_string(),
            ],
            publish_interval_ms: 15_000,
            audit_interval_ms: 45_000,

            status_addr: None,
        }
    }
}
