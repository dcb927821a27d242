use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the tunnel subsystem.
///
/// Each collaborator defines its own error type. Callers can match on these
/// to decide whether a retry makes sense; settings loading and the CLI use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum TunnelError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Manager invariant ───────────────────────────────────────────────
    #[error("a tunnel is already active on this manager; stop it first")]
    AlreadyActive,

    // ── Tunnel invariant ────────────────────────────────────────────────
    #[error("tunnel process is already running")]
    AlreadyRunning,

    // ── Binary resolution ───────────────────────────────────────────────
    #[error("binary: {0}")]
    Binary(#[from] BinaryError),

    // ── Process startup ─────────────────────────────────────────────────
    #[error("tunnel startup failed: {0}")]
    Startup(#[from] StartupFailure),

    // ── Process shutdown ────────────────────────────────────────────────
    #[error("tunnel stop failed: {0}")]
    Stop(String),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("local port must be set before starting a tunnel")]
    MissingLocalPort,

    #[error("subdomain must be set to build a public URL")]
    MissingSubdomain,

    #[error("invalid local port {0}: must be in 1..=65535")]
    InvalidPort(u32),

    #[error("invalid server address {0:?}: expected host:port")]
    InvalidServerAddress(String),

    #[error("invalid tunnel domain {0:?}")]
    InvalidDomain(String),

    #[error("startup timeout must be at least one second")]
    InvalidStartupTimeout,

    #[error("unknown tunnel protocol {0:?}")]
    UnknownProtocol(String),
}

// ─── Binary errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BinaryError {
    #[error("no frpc build for platform {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("download failed: {0}")]
    Download(String),

    #[error("download from {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BinaryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Download(err.to_string())
    }
}

// ─── Startup failures ────────────────────────────────────────────────────────

/// Why `Tunnel::start` gave up. The child is always reaped before one of
/// these reaches the caller.
#[derive(Debug, Error)]
pub enum StartupFailure {
    #[error("could not spawn tunnel client: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("tunnel client reported failure: {line}")]
    FailureMarker { line: String },

    #[error("tunnel client exited before the tunnel was established ({status})")]
    Exited { status: String },

    #[error("tunnel was not established within {timeout:?}")]
    Timeout { timeout: std::time::Duration },

    #[error("relay assigned the tunnel but printed no public URL")]
    MissingUrl,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, TunnelError>;
