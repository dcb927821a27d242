use std::process::ExitStatus;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

const LINE_BUFFER: usize = 64;

/// Merge the child's stdout and stderr into one line stream.
///
/// Each pipe gets a forwarder task that logs every line and hands it to the
/// returned receiver. Once the receiver is dropped the forwarders keep
/// draining into the log, so a long-running child never blocks on a full
/// pipe. The receiver yields `None` after both pipes have closed.
pub(crate) fn merge_output(child: &mut Child) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    if let Some(stdout) = child.stdout.take() {
        spawn_forwarder(stdout, "stdout", tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_forwarder(stderr, "stderr", tx);
    }
    rx
}

fn spawn_forwarder<R>(stream: R, stream_name: &'static str, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        let mut tx = Some(tx);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    // frpc output is not guaranteed to be UTF-8
                    let line = decode_line(&buf);
                    tracing::debug!(target: "frpc", stream = stream_name, "{line}");
                    if let Some(sender) = &tx
                        && sender.send(line).await.is_err()
                    {
                        tx = None;
                    }
                }
                Err(e) => {
                    tracing::debug!(target: "frpc", stream = stream_name, "read error: {e}");
                    break;
                }
            }
        }
    });
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Kill the child (and its process group) immediately and collect its
/// exit status.
pub(crate) async fn reap(child: &mut Child, pgid: Option<u32>) -> Option<ExitStatus> {
    kill_group(pgid);
    if let Ok(Some(status)) = child.try_wait() {
        return Some(status);
    }
    if let Err(e) = child.start_kill()
        && e.kind() != std::io::ErrorKind::InvalidInput
    {
        tracing::warn!("Failed to kill tunnel client: {e}");
    }
    child.wait().await.ok()
}

/// Terminate the child: SIGTERM, wait up to `grace`, then SIGKILL. With a
/// `pgid` the signals go to the whole group, and leftovers in the group are
/// killed once the child is gone.
///
/// A child that has already exited is not an error.
pub(crate) async fn terminate(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> std::io::Result<()> {
    let result = terminate_child(child, pgid, grace).await;
    kill_group(pgid);
    result
}

async fn terminate_child(
    child: &mut Child,
    pgid: Option<u32>,
    grace: Duration,
) -> std::io::Result<()> {
    if let Ok(Some(_)) = child.try_wait() {
        return Ok(());
    }

    #[cfg(unix)]
    send_sigterm(child, pgid);
    // no polite signal off unix
    #[cfg(not(unix))]
    let grace = Duration::ZERO;

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => {
            tracing::warn!("Waiting for tunnel client failed: {e}; sending SIGKILL");
            force_kill(child).await
        }
        Err(_) => {
            tracing::warn!(
                "Tunnel client still alive after {}s grace period, sending SIGKILL",
                grace.as_secs()
            );
            force_kill(child).await
        }
    }
}

/// SIGKILL every process left in `pgid`. A no-op without a group or off
/// unix.
#[cfg(unix)]
pub(crate) fn kill_group(pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        signal_group(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pgid: Option<u32>) {}

#[cfg(unix)]
fn signal_group(pgid: u32, signal: libc::c_int) {
    #[allow(unsafe_code, clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(-(pgid as i32), signal) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, signal, error = %err, "Failed to signal tunnel process group");
        }
    }
}

#[cfg(unix)]
fn send_sigterm(child: &Child, pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        signal_group(pgid, libc::SIGTERM);
        return;
    }
    let Some(pid) = child.id() else {
        return;
    };
    #[allow(unsafe_code, clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pid, error = %err, "Failed to send SIGTERM");
        }
    }
}

async fn force_kill(child: &mut Child) -> std::io::Result<()> {
    match child.kill().await {
        Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
        other => other,
    }
}
