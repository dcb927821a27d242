use bindu_tunnel::config::Protocol;
use clap::{Parser, Subcommand};

pub mod dispatch;

/// `bindu-tunnel` - expose a local service through the Bindu relay.
#[derive(Parser, Debug)]
#[command(name = "bindu-tunnel")]
#[command(version)]
#[command(about = "Expose a local port through the Bindu tunnel relay.", long_about = None)]
pub struct Cli {
    /// Log every line the tunnel client prints
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a tunnel to a local port and keep it up until Ctrl-C
    Expose {
        /// Local port to expose
        #[arg(short, long)]
        port: u16,

        /// Local interface the service listens on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Requested subdomain (random when omitted)
        #[arg(short, long)]
        subdomain: Option<String>,

        /// Relay protocol: http, https, tcp, udp, stcp, xtcp
        #[arg(long, default_value = "http", value_parser = parse_protocol)]
        protocol: Protocol,

        /// Encrypt the client-relay connection
        #[arg(long)]
        tls: bool,

        /// Relay control plane (host:port)
        #[arg(long)]
        server_address: Option<String>,

        /// Base domain for the public URL
        #[arg(long)]
        domain: Option<String>,

        /// Use an already-installed frpc instead of downloading one
        #[arg(long)]
        binary: Option<std::path::PathBuf>,
    },

    /// Download the tunnel client if needed and print its path
    Install,

    /// Print the public URL a subdomain maps to
    Url {
        #[arg(short, long)]
        subdomain: String,

        #[arg(long)]
        domain: Option<String>,
    },
}

fn parse_protocol(value: &str) -> Result<Protocol, String> {
    value
        .parse::<Protocol>()
        .map_err(|_| bindu_tunnel::error::ConfigError::UnknownProtocol(value.to_string()).to_string())
}
