#![cfg(unix)]

use crate::support::{fake_frpc, manager_for, pid_alive, read_pid};
use bindu_tunnel::config::default_tunnel_domain;
use bindu_tunnel::error::StartupFailure;
use bindu_tunnel::{TunnelError, scope};
use tempfile::TempDir;

fn recording_client(dir: &TempDir, log_line: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let pid_file = dir.path().join("pid");
    let body = format!(
        "echo $$ > '{}'\necho 'try to connect to server...'\necho '{log_line}'\nexec sleep 30",
        pid_file.display()
    );
    (fake_frpc(dir, &body), pid_file)
}

#[tokio::test]
async fn create_tunnel_exposes_generated_subdomain() {
    let dir = TempDir::new().unwrap();
    let (binary, pid_file) = recording_client(&dir, "[I] [proxy] start proxy success");
    let manager = manager_for(binary);

    let url = manager.create_tunnel(3773, None).await.unwrap();

    assert!(url.starts_with("https://"));
    assert!(url.ends_with(&format!(".{}", default_tunnel_domain())));
    assert!(manager.is_active().await);
    assert_eq!(manager.public_url().await.as_deref(), Some(url.as_str()));
    assert!(pid_alive(read_pid(&pid_file)));

    manager.stop_tunnel().await.unwrap();
    assert!(!manager.is_active().await);
    assert!(!pid_alive(read_pid(&pid_file)));
}

#[tokio::test]
async fn rejected_login_leaves_no_client_behind() {
    let dir = TempDir::new().unwrap();
    let (binary, pid_file) =
        recording_client(&dir, "[E] login to the server failed: authorization failed");
    let manager = manager_for(binary);

    let err = manager.create_tunnel(3773, None).await.unwrap_err();

    assert!(matches!(
        err,
        TunnelError::Startup(StartupFailure::FailureMarker { .. })
    ));
    assert!(!manager.is_active().await);
    assert!(!pid_alive(read_pid(&pid_file)));
}

#[tokio::test]
async fn scope_tears_down_the_client_when_the_body_fails() {
    let dir = TempDir::new().unwrap();
    let (binary, pid_file) = recording_client(&dir, "start proxy success");
    let manager = manager_for(binary);

    let result: anyhow::Result<()> = scope(&manager, |m| async move {
        m.create_tunnel(3773, None).await?;
        let second = m.create_tunnel(3774, None).await;
        assert!(matches!(second, Err(TunnelError::AlreadyActive)));
        anyhow::bail!("agent stopped serving")
    })
    .await;

    assert_eq!(result.unwrap_err().to_string(), "agent stopped serving");
    assert!(!manager.is_active().await);
    assert!(!pid_alive(read_pid(&pid_file)));
}
