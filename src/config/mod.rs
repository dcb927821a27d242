pub mod schema;

pub use schema::{
    Protocol, Settings, TunnelConfig, TunnelSettings, bindu_dir, default_server_address,
    default_tunnel_domain, validate_server_address,
};
