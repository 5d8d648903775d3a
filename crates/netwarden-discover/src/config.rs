//! Configuration for the netwarden-discover engine.

use serde::Deserialize;

/// Engine tunables.
///
/// Loaded from `netwarden.toml` `[discover]` section or
/// `NETWARDEN_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Directory for the JSON store (default: "./netwarden-data").
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Worker-pool bound for concurrent host probes.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Liveness probe timeout in milliseconds.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,

    /// Per-port TCP connect timeout in milliseconds.
    #[serde(default = "default_port_timeout")]
    pub port_timeout_ms: u64,

    /// Overall budget for one host's port sweep in milliseconds.
    #[serde(default = "default_port_budget")]
    pub port_budget_ms: u64,

    /// Timeout for each name-resolution attempt in milliseconds.
    #[serde(default = "default_name_timeout")]
    pub name_timeout_ms: u64,

    /// Base URL of the MAC-prefix vendor lookup service.
    #[serde(default = "default_vendor_url")]
    pub vendor_url: String,

    /// Vendor lookup timeout in milliseconds.
    #[serde(default = "default_vendor_timeout")]
    pub vendor_timeout_ms: u64,
}

fn default_data_dir() -> String {
    "./netwarden-data".to_string()
}

fn default_worker_limit() -> usize {
    16
}

fn default_ping_timeout() -> u64 {
    1000
}

fn default_port_timeout() -> u64 {
    500
}

fn default_port_budget() -> u64 {
    4000
}

fn default_name_timeout() -> u64 {
    1500
}

fn default_vendor_url() -> String {
    "https://api.macvendors.com".to_string()
}

fn default_vendor_timeout() -> u64 {
    3000
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            worker_limit: default_worker_limit(),
            ping_timeout_ms: default_ping_timeout(),
            port_timeout_ms: default_port_timeout(),
            port_budget_ms: default_port_budget(),
            name_timeout_ms: default_name_timeout(),
            vendor_url: default_vendor_url(),
            vendor_timeout_ms: default_vendor_timeout(),
        }
    }
}

impl DiscoverConfig {
    /// Clamp the worker bound to a sane window. The pool protects the local
    /// network and OS socket limits, not CPU.
    pub fn effective_worker_limit(&self) -> usize {
        self.worker_limit.clamp(1, 64)
    }
}
