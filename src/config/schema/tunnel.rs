use super::loader::{default_server_address, default_tunnel_domain};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Relay protocol understood by the `frpc` client.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    #[default]
    Http,
    Https,
    Tcp,
    Udp,
    Stcp,
    Xtcp,
}

impl Protocol {
    /// Whether the relay routes this protocol by subdomain.
    pub fn uses_subdomain(self) -> bool {
        matches!(self, Self::Http | Self::Https)
    }
}

/// Desired tunnel parameters.
///
/// `tunnel_domain` and `server_address` fall back to the process-wide
/// settings when not given explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default = "default_local_host")]
    pub local_host: String,
    #[serde(default)]
    pub local_port: Option<u16>,
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default = "default_tunnel_domain")]
    pub tunnel_domain: String,
    #[serde(default = "default_server_address")]
    pub server_address: String,
}

fn default_local_host() -> String {
    "127.0.0.1".into()
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protocol: Protocol::default(),
            use_tls: false,
            local_host: default_local_host(),
            local_port: None,
            subdomain: None,
            tunnel_domain: default_tunnel_domain(),
            server_address: default_server_address(),
        }
    }
}

impl TunnelConfig {
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    /// Range-check a port that arrived as a wider integer (CLI, JSON).
    pub fn local_port_from(value: u32) -> Result<u16, ConfigError> {
        match u16::try_from(value) {
            Ok(port) if port != 0 => Ok(port),
            _ => Err(ConfigError::InvalidPort(value)),
        }
    }

    /// `https://{subdomain}.{tunnel_domain}`, regardless of the local scheme.
    pub fn get_public_url(&self) -> Result<String, ConfigError> {
        let subdomain = self
            .subdomain
            .as_deref()
            .ok_or(ConfigError::MissingSubdomain)?;
        Ok(format!("https://{subdomain}.{}", self.tunnel_domain))
    }
}
