//! gatebridge/src/config.rs
//! Gateway bridge configuration.

use serde::{Deserialize, Serialize};

/// Default outbound gateway port (spec §6).
pub const DEFAULT_GATEWAY_PORT: u16 = 25333;
/// Default inbound callback port (spec §6).
pub const DEFAULT_CALLBACK_PORT: u16 = 25334;
/// Default bounded pool size (spec §4.C).
pub const DEFAULT_MAX_POOL_SIZE: usize = 4;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Host of the outbound gateway this client connects to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the outbound gateway.
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Host the inbound callback server binds to.
    #[serde(default = "default_host")]
    pub callback_host: String,
    /// Port the inbound callback server binds to. `0` means ephemeral; the
    /// actual bound port is reported after bind.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// Optional auth token sent during the connect handshake (spec §4.B).
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Maximum number of live connections the pool will open.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}

fn default_callback_port() -> u16 {
    DEFAULT_CALLBACK_PORT
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            host: default_host(),
            port: default_gateway_port(),
            callback_host: default_host(),
            callback_port: default_callback_port(),
            auth_token: None,
            max_pool_size: default_max_pool_size(),
        }
    }
}

impl GateConfig {
    /// Parse a `GateConfig` from a JSON string, filling in defaults for any
    /// field the caller omits.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn callback_addr(&self) -> String {
        format!("{}:{}", self.callback_host, self.callback_port)
    }
}
