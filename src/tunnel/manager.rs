use super::{Lifecycle, Scoped, Tunnel};
use crate::config::TunnelConfig;
use crate::error::{Result, TunnelError};
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_SUBDOMAIN_LENGTH: usize = 12;

const SUBDOMAIN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Builds the tunnel for a resolved config.
pub type TunnelFactory = Arc<dyn Fn(TunnelConfig) -> Box<dyn Lifecycle> + Send + Sync>;

/// Owns at most one active tunnel.
///
/// `create_tunnel` and scope exit both take the same lock, so concurrent
/// callers can never end up with two live tunnels on one manager.
pub struct TunnelManager {
    active_tunnel: Mutex<Option<Box<dyn Lifecycle>>>,
    factory: TunnelFactory,
}

impl TunnelManager {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(|config| {
            Box::new(Tunnel::new(config)) as Box<dyn Lifecycle>
        }))
    }

    pub fn with_factory(factory: TunnelFactory) -> Self {
        Self {
            active_tunnel: Mutex::new(None),
            factory,
        }
    }

    /// Start a tunnel for `local_port` and return its public URL.
    ///
    /// Without `config` a default one is built with a random subdomain. A
    /// supplied config keeps all its fields; only a missing port (and, for
    /// subdomain-routed protocols, a missing subdomain) is filled in.
    pub async fn create_tunnel(
        &self,
        local_port: u16,
        config: Option<TunnelConfig>,
    ) -> Result<String> {
        let mut active = self.active_tunnel.lock().await;
        if active.is_some() {
            return Err(TunnelError::AlreadyActive);
        }

        let config = Self::resolve_config(local_port, config);
        let mut tunnel = (self.factory)(config);
        let url = tunnel.start().await?;
        *active = Some(tunnel);
        Ok(url)
    }

    fn resolve_config(local_port: u16, config: Option<TunnelConfig>) -> TunnelConfig {
        let mut config = config.unwrap_or_else(|| TunnelConfig {
            enabled: true,
            ..TunnelConfig::default()
        });
        if config.local_port.is_none() {
            config.local_port = Some(local_port);
        }
        if config.subdomain.is_none() && config.protocol.uses_subdomain() {
            config.subdomain = Some(Self::generate_subdomain(DEFAULT_SUBDOMAIN_LENGTH));
        }
        config
    }

    /// Stop the active tunnel, if any. State is cleared even when stopping
    /// reports an error.
    pub async fn stop_tunnel(&self) -> Result<()> {
        let taken = self.active_tunnel.lock().await.take();
        match taken {
            Some(mut tunnel) => tunnel.stop().await,
            None => Ok(()),
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active_tunnel.lock().await.is_some()
    }

    pub async fn public_url(&self) -> Option<String> {
        self.active_tunnel
            .lock()
            .await
            .as_ref()
            .and_then(|t| t.public_url())
    }

    /// Random DNS-label-safe name from `[a-z0-9]`.
    pub fn generate_subdomain(length: usize) -> String {
        let mut rng = rand::rng();
        (0..length)
            .map(|_| char::from(SUBDOMAIN_CHARSET[rng.random_range(0..SUBDOMAIN_CHARSET.len())]))
            .collect()
    }
}

impl Default for TunnelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Scoped for TunnelManager {
    fn exit(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut active = self.active_tunnel.lock().await;
            if let Some(mut tunnel) = active.take()
                && let Err(e) = tunnel.stop().await
            {
                tracing::warn!("Tunnel cleanup on scope exit failed: {e}");
            }
        })
    }
}
