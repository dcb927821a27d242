use bindu_tunnel::config::{default_server_address, default_tunnel_domain};
use bindu_tunnel::error::ConfigError;
use bindu_tunnel::tunnel::TunnelManager;
use bindu_tunnel::{Settings, TunnelConfig};
use tempfile::TempDir;

#[test]
fn subdomain_on_default_domain_without_settings_file() {
    let home = TempDir::new().unwrap();
    let settings = Settings::load_from(&home.path().join(".bindu/config.toml")).unwrap();
    let config = TunnelConfig {
        tunnel_domain: settings.tunnel.tunnel_domain,
        server_address: settings.tunnel.server_address,
        ..TunnelConfig::default()
    }
    .with_subdomain("myapp");

    assert_eq!(config.server_address, "tunnel.getbindu.com:7000");
    assert_eq!(
        config.get_public_url().unwrap(),
        "https://myapp.tunnel.getbindu.com"
    );
}

#[test]
fn subdomain_on_custom_domain() {
    let config = TunnelConfig {
        subdomain: Some("test".into()),
        tunnel_domain: "custom.example.com".into(),
        ..TunnelConfig::default()
    };

    assert_eq!(
        config.get_public_url().unwrap(),
        "https://test.custom.example.com"
    );
}

#[test]
fn missing_subdomain_never_yields_a_partial_url() {
    let config = TunnelConfig {
        enabled: true,
        tunnel_domain: "custom.example.com".into(),
        ..TunnelConfig::default()
    };

    assert!(matches!(
        config.get_public_url(),
        Err(ConfigError::MissingSubdomain)
    ));
}

#[test]
fn settings_defaults_feed_config_defaults() {
    let address = default_server_address();
    let (host, port) = address
        .rsplit_once(':')
        .expect("server address should be host:port");
    assert!(!host.is_empty());
    assert!(port.parse::<u16>().is_ok());
    assert!(!default_tunnel_domain().is_empty());

    let config = TunnelConfig::default();
    assert_eq!(config.server_address, address);
    assert_eq!(config.tunnel_domain, default_tunnel_domain());
}

#[test]
fn generated_subdomain_round_trips_into_url() {
    let subdomain = TunnelManager::generate_subdomain(12);
    let url = TunnelConfig::default()
        .with_subdomain(subdomain.clone())
        .get_public_url()
        .unwrap();

    assert!(url.starts_with("https://"));
    assert!(url.contains(&subdomain));
    assert!(url.ends_with(&format!(".{}", default_tunnel_domain())));
}
