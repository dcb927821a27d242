use crate::config::{TunnelSettings, bindu_dir};
use crate::error::BinaryError;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::sync::Mutex;

/// Locates the tunnel client executable, installing it on first use.
pub trait BinaryResolver: Send + Sync {
    /// Path to a ready-to-run executable. Repeated calls return the same
    /// path without doing the work again.
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<PathBuf, BinaryError>> + Send + '_>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Os {
    Linux,
    Darwin,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Arch {
    #[strum(serialize = "amd64")]
    Amd64,
    #[strum(serialize = "arm64")]
    Arm64,
    #[strum(serialize = "arm")]
    Arm,
    #[strum(serialize = "386")]
    I386,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn current() -> Result<Self, BinaryError> {
        Self::from_consts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Map Rust's `target_os`/`target_arch` names to release names.
    pub fn from_consts(os: &str, arch: &str) -> Result<Self, BinaryError> {
        let unsupported = || BinaryError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };
        let os_kind = match os {
            "linux" => Os::Linux,
            "macos" => Os::Darwin,
            "windows" => Os::Windows,
            _ => return Err(unsupported()),
        };
        let arch_kind = match arch {
            "x86_64" => Arch::Amd64,
            "aarch64" => Arch::Arm64,
            "arm" => Arch::Arm,
            "x86" => Arch::I386,
            _ => return Err(unsupported()),
        };
        Ok(Self {
            os: os_kind,
            arch: arch_kind,
        })
    }

    pub const fn exe_suffix(self) -> &'static str {
        match self.os {
            Os::Windows => ".exe",
            _ => "",
        }
    }
}

/// The `frpc` client, cached under `~/.bindu/frpc`.
pub struct FrpcBinary {
    folder: PathBuf,
    base_url: String,
    version: String,
    expected_sha256: Option<String>,
    platform: Platform,
    client: reqwest::Client,
    install_lock: Mutex<()>,
}

impl FrpcBinary {
    pub fn new(
        folder: impl Into<PathBuf>,
        base_url: impl Into<String>,
        version: impl Into<String>,
    ) -> Result<Self, BinaryError> {
        Ok(Self {
            folder: folder.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            version: version.into(),
            expected_sha256: None,
            platform: Platform::current()?,
            client: reqwest::Client::new(),
            install_lock: Mutex::new(()),
        })
    }

    pub fn from_settings(settings: &TunnelSettings) -> Result<Self, BinaryError> {
        let bin = Self::new(
            default_folder(),
            settings.download_base_url.clone(),
            settings.frpc_version.clone(),
        )?;
        Ok(bin.with_sha256(settings.binary_sha256.clone()))
    }

    pub fn with_sha256(mut self, expected: Option<String>) -> Self {
        self.expected_sha256 = expected.map(|s| s.trim().to_ascii_lowercase());
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Name of the asset on the download server.
    pub fn remote_name(&self) -> String {
        format!(
            "frpc_{}_{}{}",
            self.platform.os,
            self.platform.arch,
            self.platform.exe_suffix()
        )
    }

    /// Versioned file name in the cache folder.
    pub fn file_name(&self) -> String {
        format!(
            "frpc_{}_{}_v{}{}",
            self.platform.os,
            self.platform.arch,
            self.version,
            self.platform.exe_suffix()
        )
    }

    pub fn binary_path(&self) -> PathBuf {
        self.folder.join(self.file_name())
    }

    pub fn download_url(&self) -> String {
        format!("{}/v{}/{}", self.base_url, self.version, self.remote_name())
    }

    async fn install(&self) -> Result<PathBuf, BinaryError> {
        let _guard = self.install_lock.lock().await;

        let path = self.binary_path();
        if path.is_file() {
            return Ok(path);
        }

        tokio::fs::create_dir_all(&self.folder).await?;
        let url = self.download_url();
        tracing::info!("Downloading tunnel client from {url}");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BinaryError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(BinaryError::Download(format!("{url} returned an empty body")));
        }

        let actual = hex::encode(Sha256::digest(&bytes));
        match &self.expected_sha256 {
            Some(expected) if *expected != actual => {
                return Err(BinaryError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            Some(_) => tracing::debug!("Tunnel client checksum verified"),
            None => tracing::info!("Tunnel client sha256 {actual} (no expected digest configured)"),
        }

        let partial = self.folder.join(format!("{}.part", self.file_name()));
        tokio::fs::write(&partial, &bytes).await?;
        make_executable(&partial).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::info!("Installed tunnel client at {}", path.display());
        Ok(path)
    }
}

impl BinaryResolver for FrpcBinary {
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<PathBuf, BinaryError>> + Send + '_>> {
        Box::pin(self.install())
    }
}

/// A client installed out of band, used as-is.
#[derive(Debug, Clone)]
pub struct StaticBinary(pub PathBuf);

impl BinaryResolver for StaticBinary {
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<PathBuf, BinaryError>> + Send + '_>> {
        Box::pin(async move {
            if self.0.is_file() {
                Ok(self.0.clone())
            } else {
                Err(BinaryError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("tunnel client not found at {}", self.0.display()),
                )))
            }
        })
    }
}

/// `~/.bindu/frpc`, or a relative `.bindu/frpc` without a home directory.
pub fn default_folder() -> PathBuf {
    bindu_dir()
        .unwrap_or_else(|_| PathBuf::from(".bindu"))
        .join("frpc")
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await
}

#[cfg(not(unix))]
#[allow(clippy::unused_async)]
async fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
