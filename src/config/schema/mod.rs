mod loader;
#[cfg(test)]
mod test_env;
mod tunnel;

pub use loader::{bindu_dir, default_server_address, default_tunnel_domain, global};
pub use tunnel::{Protocol, TunnelConfig};

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings read from `~/.bindu/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tunnel: TunnelSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelSettings {
    /// Relay control plane, `host:port`
    #[serde(default = "default_server_address_setting")]
    pub server_address: String,
    /// Base domain public URLs are built on
    #[serde(default = "default_tunnel_domain_setting")]
    pub tunnel_domain: String,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_frpc_version")]
    pub frpc_version: String,
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,
    /// Expected SHA-256 of the downloaded client, lowercase hex.
    #[serde(default)]
    pub binary_sha256: Option<String>,
}

fn default_server_address_setting() -> String {
    "tunnel.getbindu.com:7000".into()
}

fn default_tunnel_domain_setting() -> String {
    "tunnel.getbindu.com".into()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_stop_grace_secs() -> u64 {
    5
}

fn default_frpc_version() -> String {
    "0.61.0".into()
}

fn default_download_base_url() -> String {
    "https://github.com/getbindu/frpc/releases/download".into()
}

impl Default for TunnelSettings {
    fn default() -> Self {
        Self {
            server_address: default_server_address_setting(),
            tunnel_domain: default_tunnel_domain_setting(),
            startup_timeout_secs: default_startup_timeout_secs(),
            stop_grace_secs: default_stop_grace_secs(),
            frpc_version: default_frpc_version(),
            download_base_url: default_download_base_url(),
            binary_sha256: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tunnel.validate()
    }
}

impl TunnelSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server_address(&self.server_address)?;
        if self.tunnel_domain.trim().is_empty() {
            return Err(ConfigError::InvalidDomain(self.tunnel_domain.clone()));
        }
        if self.startup_timeout_secs == 0 {
            return Err(ConfigError::InvalidStartupTimeout);
        }
        Ok(())
    }
}

/// `host:port` with a non-empty host and a numeric port.
pub fn validate_server_address(address: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidServerAddress(address.to_string());
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(invalid());
    }
    Ok(())
}
