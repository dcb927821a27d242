use super::Settings;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static GLOBAL: LazyLock<Settings> = LazyLock::new(Settings::load_or_default);

/// Process-wide settings, loaded once on first use.
pub fn global() -> &'static Settings {
    &GLOBAL
}

/// Relay control plane used when a `TunnelConfig` does not override it.
pub fn default_server_address() -> String {
    global().tunnel.server_address.clone()
}

/// Base domain used when a `TunnelConfig` does not override it.
pub fn default_tunnel_domain() -> String {
    global().tunnel.tunnel_domain.clone()
}

/// `~/.bindu`, home of the settings file and the cached client binary.
pub fn bindu_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".bindu"))
}

impl Settings {
    /// Load `~/.bindu/config.toml` (defaults when absent), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = bindu_dir()?.join("config.toml");
        let mut settings = Self::load_from(&config_path)?;
        settings.apply_env_overrides();
        settings.validate()?;
        Ok(settings)
    }

    /// [`Settings::load`], logging a broken settings file and using
    /// defaults instead. The CLI and [`global`] share this policy.
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Falling back to default tunnel settings: {e:#}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("BINDU_TUNNEL_SERVER_ADDRESS")
            && !address.is_empty()
        {
            self.tunnel.server_address = address;
        }

        if let Ok(domain) = std::env::var("BINDU_TUNNEL_DOMAIN")
            && !domain.is_empty()
        {
            self.tunnel.tunnel_domain = domain;
        }

        if let Ok(secs) = std::env::var("BINDU_TUNNEL_STARTUP_TIMEOUT_SECS")
            && let Ok(secs) = secs.parse::<u64>()
            && secs > 0
        {
            self.tunnel.startup_timeout_secs = secs;
        }
    }
}
