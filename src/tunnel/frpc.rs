use super::binary::{BinaryResolver, FrpcBinary};
use super::output::{Classifier, LineEvent, classify_line};
use super::process::{merge_output, reap, terminate};
use super::Lifecycle;
use crate::config::{TunnelConfig, schema};
use crate::error::{ConfigError, Result, StartupFailure, TunnelError};
use std::future::Future;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Where a started tunnel's public URL comes from, decided before spawning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlSource {
    /// Caller chose the subdomain; the URL follows from the config.
    Configured(String),
    /// The relay picks the host; the URL is read from the success line.
    Reported,
}

impl UrlSource {
    pub fn for_config(config: &TunnelConfig) -> std::result::Result<Self, ConfigError> {
        match config.subdomain {
            Some(_) => Ok(Self::Configured(config.get_public_url()?)),
            None => Ok(Self::Reported),
        }
    }

    fn finish(self, reported: Option<String>) -> std::result::Result<String, StartupFailure> {
        match self {
            Self::Configured(url) => {
                if let Some(other) = reported
                    && other != url
                {
                    tracing::warn!("Relay reported {other}, keeping configured {url}");
                }
                Ok(url)
            }
            Self::Reported => reported.ok_or(StartupFailure::MissingUrl),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TunnelState {
    Idle,
    Starting,
    Running,
    Stopped,
    Failed,
}

/// One `frpc` client process exposing a local port through the relay.
pub struct Tunnel {
    config: TunnelConfig,
    proc: Option<Child>,
    /// Process group the client was spawned into (its own pid).
    pgid: Option<u32>,
    public_url: Option<String>,
    state: TunnelState,
    resolver: Option<Arc<dyn BinaryResolver>>,
    classifier: Classifier,
    startup_timeout: Duration,
    stop_grace: Duration,
}

impl Tunnel {
    pub fn new(config: TunnelConfig) -> Self {
        let settings = &schema::global().tunnel;
        Self {
            config,
            proc: None,
            pgid: None,
            public_url: None,
            state: TunnelState::Idle,
            resolver: None,
            classifier: classify_line,
            startup_timeout: Duration::from_secs(settings.startup_timeout_secs),
            stop_grace: Duration::from_secs(settings.stop_grace_secs),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn BinaryResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    pub fn public_url(&self) -> Option<&str> {
        self.public_url.as_deref()
    }

    /// OS pid of the client while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.proc.as_ref().and_then(Child::id)
    }

    pub fn has_process(&self) -> bool {
        self.proc.is_some()
    }

    /// Whether the client process is still alive.
    pub fn is_running(&mut self) -> bool {
        self.proc
            .as_mut()
            .is_some_and(|child| matches!(child.try_wait(), Ok(None)))
    }

    /// Spawn the client and wait until it reports the tunnel is up.
    ///
    /// On any failure the child has been killed and reaped before the error
    /// is returned, and the tunnel holds no process.
    pub async fn start(&mut self) -> Result<String> {
        if self.proc.is_some() {
            return Err(TunnelError::AlreadyRunning);
        }
        let port = self.config.local_port.ok_or(ConfigError::MissingLocalPort)?;
        let source = UrlSource::for_config(&self.config)?;

        let resolver = match &self.resolver {
            Some(resolver) => Arc::clone(resolver),
            None => Arc::new(FrpcBinary::from_settings(&schema::global().tunnel)?),
        };
        let binary = resolver.resolve().await?;

        self.state = TunnelState::Starting;
        let args = build_args(&self.config, port);
        tracing::info!(
            "Starting tunnel {}:{port} via {}",
            self.config.local_host,
            self.config.server_address
        );

        let mut command = Command::new(&binary);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // own group, so stop and cleanup also reach anything frpc forks
        #[cfg(unix)]
        command.process_group(0);
        let spawned = command.spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.state = TunnelState::Failed;
                return Err(StartupFailure::Spawn(e).into());
            }
        };

        let pgid = child.id();
        let mut lines = merge_output(&mut child);
        let scan = await_established(
            &mut child,
            &mut lines,
            source,
            self.classifier,
            self.startup_timeout,
        );
        match scan.await {
            Ok(url) => {
                tracing::info!("Tunnel established: {url}");
                self.proc = Some(child);
                self.pgid = pgid;
                self.public_url = Some(url.clone());
                self.state = TunnelState::Running;
                Ok(url)
            }
            Err(failure) => {
                let status = reap(&mut child, pgid).await;
                tracing::warn!("Tunnel startup failed ({failure}); client reaped with {status:?}");
                self.state = TunnelState::Failed;
                Err(failure.into())
            }
        }
    }

    /// Terminate the client (SIGTERM, bounded wait, SIGKILL) and clear the
    /// tunnel's process and URL. A no-op when nothing is running.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(mut child) = self.proc.take() else {
            return Ok(());
        };
        let pid = self.pgid.take();
        let result = terminate(&mut child, pid, self.stop_grace).await;
        self.public_url = None;
        self.state = TunnelState::Stopped;

        match result {
            Ok(()) => {
                tracing::info!("Tunnel client stopped (pid {pid:?})");
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to stop tunnel client (pid {pid:?}): {e}");
                Err(TunnelError::Stop(e.to_string()))
            }
        }
    }
}

impl Lifecycle for Tunnel {
    fn start(&mut self) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(Tunnel::start(self))
    }

    fn stop(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(Tunnel::stop(self))
    }

    fn public_url(&self) -> Option<String> {
        self.public_url.clone()
    }
}

/// How long lines written just before the client exited are still read,
/// so a failure marker beats a bare exit status.
const EXIT_DRAIN: Duration = Duration::from_millis(500);

enum Next {
    Line(Option<String>),
    Exited(std::io::Result<ExitStatus>),
}

/// Read merged output until a marker, the client's exit, or the deadline.
async fn await_established(
    child: &mut Child,
    lines: &mut mpsc::Receiver<String>,
    source: UrlSource,
    classifier: Classifier,
    startup_timeout: Duration,
) -> std::result::Result<String, StartupFailure> {
    let deadline = Instant::now() + startup_timeout;
    loop {
        let next = tokio::time::timeout_at(deadline, async {
            tokio::select! {
                biased;
                line = lines.recv() => Next::Line(line),
                status = child.wait() => Next::Exited(status),
            }
        })
        .await;

        let line = match next {
            Ok(Next::Line(Some(line))) => line,
            Ok(Next::Line(None)) => {
                let status = tokio::time::timeout(Duration::from_secs(1), child.wait())
                    .await
                    .ok()
                    .and_then(std::result::Result::ok);
                return Err(exited(status));
            }
            Ok(Next::Exited(status)) => {
                let drain_until = deadline.min(Instant::now() + EXIT_DRAIN);
                while let Ok(Some(line)) = tokio::time::timeout_at(drain_until, lines.recv()).await {
                    if let LineEvent::Failure(line) = classifier(&line) {
                        return Err(StartupFailure::FailureMarker { line });
                    }
                }
                return Err(exited(status.ok()));
            }
            Err(_) => {
                return Err(StartupFailure::Timeout {
                    timeout: startup_timeout,
                });
            }
        };

        match classifier(&line) {
            LineEvent::Success(reported) => return source.finish(reported),
            LineEvent::Failure(line) => return Err(StartupFailure::FailureMarker { line }),
            LineEvent::Unrecognized => {}
        }
    }
}

fn exited(status: Option<ExitStatus>) -> StartupFailure {
    StartupFailure::Exited {
        status: status.map_or_else(|| "output closed".to_string(), |s| s.to_string()),
    }
}

/// `frpc` command line for `config`.
pub fn build_args(config: &TunnelConfig, local_port: u16) -> Vec<String> {
    let proxy_name = config
        .subdomain
        .clone()
        .unwrap_or_else(|| format!("bindu-{local_port}"));

    let mut args = vec![
        config.protocol.to_string(),
        "-n".into(),
        proxy_name,
        "-l".into(),
        local_port.to_string(),
        "-i".into(),
        config.local_host.clone(),
    ];
    if config.protocol.uses_subdomain()
        && let Some(subdomain) = &config.subdomain
    {
        args.push("--sd".into());
        args.push(subdomain.clone());
    }
    args.push("--server_addr".into());
    args.push(config.server_address.clone());
    args.push("--disable_log_color".into());
    if config.use_tls {
        args.push("--tls_enable".into());
    }
    args
}
