use super::{Cli, Commands};
use anyhow::{Context, Result};
use bindu_tunnel::config::{Settings, TunnelConfig, validate_server_address};
use bindu_tunnel::tunnel::{
    BinaryResolver, FrpcBinary, Lifecycle, StaticBinary, Tunnel, TunnelManager, scope,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn dispatch(cli: Cli, settings: &Settings) -> Result<()> {
    match cli.command {
        Commands::Expose {
            port,
            host,
            subdomain,
            protocol,
            tls,
            server_address,
            domain,
            binary,
        } => {
            let mut config = TunnelConfig {
                enabled: true,
                protocol,
                use_tls: tls,
                local_host: host,
                local_port: Some(port),
                subdomain,
                tunnel_domain: settings.tunnel.tunnel_domain.clone(),
                server_address: settings.tunnel.server_address.clone(),
            };
            if let Some(address) = server_address {
                validate_server_address(&address)?;
                config.server_address = address;
            }
            if let Some(domain) = domain {
                config.tunnel_domain = domain;
            }

            let resolver: Arc<dyn BinaryResolver> = match binary {
                Some(path) => Arc::new(StaticBinary(path)),
                None => Arc::new(FrpcBinary::from_settings(&settings.tunnel)?),
            };
            expose(port, config, resolver, settings).await
        }
        Commands::Install => {
            let path = FrpcBinary::from_settings(&settings.tunnel)?
                .resolve()
                .await
                .context("Failed to install the tunnel client")?;
            println!("{}", path.display());
            Ok(())
        }
        Commands::Url { subdomain, domain } => {
            let config = TunnelConfig {
                tunnel_domain: domain.unwrap_or_else(|| settings.tunnel.tunnel_domain.clone()),
                ..TunnelConfig::default()
            }
            .with_subdomain(subdomain);
            println!("{}", config.get_public_url()?);
            Ok(())
        }
    }
}

async fn expose(
    port: u16,
    config: TunnelConfig,
    resolver: Arc<dyn BinaryResolver>,
    settings: &Settings,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(settings.tunnel.startup_timeout_secs);
    let stop_grace = Duration::from_secs(settings.tunnel.stop_grace_secs);
    let manager = TunnelManager::with_factory(Arc::new(move |config| {
        Box::new(
            Tunnel::new(config)
                .with_resolver(Arc::clone(&resolver))
                .with_startup_timeout(startup_timeout)
                .with_stop_grace(stop_grace),
        ) as Box<dyn Lifecycle>
    }));

    scope(&manager, |manager| async move {
        let url = manager.create_tunnel(port, Some(config)).await?;
        println!("✓ Tunnel active: {url}");
        println!("  Forwarding to local port {port}. Press Ctrl-C to stop.");

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Shutting down tunnel");
        Ok::<(), anyhow::Error>(())
    })
    .await
}
