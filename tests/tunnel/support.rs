#![allow(dead_code)]

use bindu_tunnel::tunnel::{BinaryResolver, Lifecycle, StaticBinary, Tunnel, TunnelManager};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Write an executable `/bin/sh` script standing in for `frpc`.
#[cfg(unix)]
pub fn fake_frpc(dir: &TempDir, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.path().join("frpc");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Manager whose tunnels run `binary` instead of the downloaded client.
pub fn manager_for(binary: PathBuf) -> TunnelManager {
    let resolver: Arc<dyn BinaryResolver> = Arc::new(StaticBinary(binary));
    TunnelManager::with_factory(Arc::new(move |config| {
        Box::new(
            Tunnel::new(config)
                .with_resolver(Arc::clone(&resolver))
                .with_startup_timeout(Duration::from_secs(10))
                .with_stop_grace(Duration::from_secs(2)),
        ) as Box<dyn Lifecycle>
    }))
}

#[cfg(unix)]
pub fn pid_alive(pid: u32) -> bool {
    #[allow(unsafe_code, clippy::cast_possible_wrap)]
    let ret = unsafe { libc::kill(pid as i32, 0) };
    ret == 0
}

pub fn read_pid(path: &std::path::Path) -> u32 {
    std::fs::read_to_string(path)
        .expect("fake client should record its pid")
        .trim()
        .parse()
        .expect("pid file should hold a number")
}
