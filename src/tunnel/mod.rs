//! Lifecycle of the `frpc` reverse-tunnel client.
//!
//! [`TunnelManager`] keeps at most one [`Tunnel`] alive, [`Tunnel`] owns the
//! child process and turns its log output into a start/fail outcome, and
//! [`scope`] guarantees the tunnel is torn down when the caller is done.

pub mod binary;
mod frpc;
mod guard;
mod manager;
pub mod output;
mod process;
mod traits;


pub use binary::{BinaryResolver, FrpcBinary, StaticBinary};
pub use frpc::{Tunnel, TunnelState, UrlSource, build_args};
pub use guard::scope;
pub use manager::{DEFAULT_SUBDOMAIN_LENGTH, TunnelFactory, TunnelManager};
pub use output::{Classifier, LineEvent, classify_line};
pub use traits::{Lifecycle, Scoped};
