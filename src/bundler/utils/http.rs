//! Electron release downloads.
//!
//! Release archives are fetched from GitHub (or a mirror), verified against
//! the release's `SHASUMS256.txt` and cached per version.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::settings::DownloadOptions;
use crate::bundler::targets::{Arch, Platform};
use async_trait::async_trait;
use futures::StreamExt;
use semver::Version;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Default location of Electron release assets.
pub const DEFAULT_MIRROR: &str = "https://github.com/electron/electron/releases/download/";

/// Environment variable overriding the download mirror.
pub const MIRROR_ENV: &str = "ELECTRON_MIRROR";

/// One release artifact to fetch.
#[derive(Debug, Clone)]
pub struct DownloadSpec {
    /// Target platform
    pub platform: Platform,
    /// Target architecture
    pub arch: Arch,
    /// Electron version
    pub version: Version,
    /// Artifact prefix, `electron` for the runtime itself
    pub artifact_name: String,
}

impl DownloadSpec {
    /// Spec for the Electron runtime archive.
    pub fn electron(platform: Platform, arch: Arch, version: Version) -> Self {
        Self {
            platform,
            arch,
            version,
            artifact_name: "electron".to_string(),
        }
    }

    /// Architecture name used in release file names.
    ///
    /// Releases before 1.0.0 called armv7l `arm`.
    pub fn release_arch(&self) -> &str {
        if self.arch == Arch::Armv7l && self.version < Version::new(1, 0, 0) {
            "arm"
        } else {
            self.arch.as_str()
        }
    }

    /// `<artifact>-v<version>-<platform>-<arch>.zip`
    pub fn file_name(&self) -> String {
        format!(
            "{}-v{}-{}-{}.zip",
            self.artifact_name,
            self.version,
            self.platform.as_str(),
            self.release_arch()
        )
    }
}

/// Source of Electron release archives.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns a local path to the archive described by `spec`.
    async fn download(&self, spec: &DownloadSpec, options: &DownloadOptions) -> Result<PathBuf>;
}

/// Downloads over HTTPS with a local cache.
#[derive(Debug, Clone, Default)]
pub struct ElectronDownloader {
    client: reqwest::Client,
}

impl ElectronDownloader {
    /// Creates a downloader with a fresh HTTP client.
    pub fn new() -> Self {
        Self::default()
    }

    async fn fetch_checksums(&self, release_url: &url::Url) -> Result<String> {
        let url = release_url.join("SHASUMS256.txt")?;
        log::debug!("Fetching checksums from {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_to(&self, url: url::Url, dest: &Path) -> Result<String> {
        log::info!("Downloading {}", url);
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .fs_context("creating file", dest)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .fs_context("writing file", dest)?;
        }
        file.flush().await.fs_context("writing file", dest)?;

        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl Downloader for ElectronDownloader {
    async fn download(&self, spec: &DownloadSpec, options: &DownloadOptions) -> Result<PathBuf> {
        let file_name = spec.file_name();
        let cache_dir = cache_root(options)?.join(spec.version.to_string());
        let cached = cache_dir.join(&file_name);

        if !options.force && tokio::fs::try_exists(&cached).await.unwrap_or(false) {
            log::debug!("Using cached {}", cached.display());
            return Ok(cached);
        }

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .fs_context("creating directory", &cache_dir)?;

        let release_url = release_url(options, &spec.version)?;
        let partial = cache_dir.join(format!("{file_name}.part"));
        let actual = self.fetch_to(release_url.join(&file_name)?, &partial).await?;

        if !options.unsafely_disable_checksums {
            let sums = self.fetch_checksums(&release_url).await?;
            let expected = checksum_for(&sums, &file_name).ok_or_else(|| {
                Error::GenericError(format!("No checksum found for {file_name} in SHASUMS256.txt"))
            })?;
            if !actual.eq_ignore_ascii_case(expected) {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(Error::HashMismatch {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&partial, &cached)
            .await
            .fs_context("moving download", &partial)?;
        Ok(cached)
    }
}

fn cache_root(options: &DownloadOptions) -> Result<PathBuf> {
    match &options.cache_root {
        Some(root) => Ok(root.clone()),
        None => dirs::cache_dir()
            .map(|dir| dir.join("electron"))
            .ok_or_else(|| Error::GenericError("Could not determine cache directory".into())),
    }
}

/// `<mirror>/v<version>/`, honouring `ELECTRON_MIRROR`.
pub fn release_url(options: &DownloadOptions, version: &Version) -> Result<url::Url> {
    let mut mirror = options
        .mirror
        .clone()
        .or_else(|| std::env::var(MIRROR_ENV).ok())
        .unwrap_or_else(|| DEFAULT_MIRROR.to_string());
    if !mirror.ends_with('/') {
        mirror.push('/');
    }
    Ok(url::Url::parse(&mirror)?.join(&format!("v{version}/"))?)
}

/// Finds the hash for `file_name` in `SHASUMS256.txt` contents.
fn checksum_for<'a>(sums: &'a str, file_name: &str) -> Option<&'a str> {
    sums.lines().find_map(|line| {
        let (hash, name) = line.trim().split_once(char::is_whitespace)?;
        let name = name.trim_start().trim_start_matches('*');
        (name == file_name).then_some(hash)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(arch: Arch, version: &str) -> DownloadSpec {
        DownloadSpec::electron(Platform::Linux, arch, Version::parse(version).unwrap())
    }

    #[test]
    fn file_names_follow_release_layout() {
        assert_eq!(
            spec(Arch::X64, "27.1.0").file_name(),
            "electron-v27.1.0-linux-x64.zip"
        );
        assert_eq!(
            spec(Arch::Armv7l, "0.37.8").file_name(),
            "electron-v0.37.8-linux-arm.zip"
        );
        assert_eq!(
            spec(Arch::Armv7l, "1.0.0").file_name(),
            "electron-v1.0.0-linux-armv7l.zip"
        );
    }

    #[test]
    fn mirror_option_is_used() {
        let options = DownloadOptions {
            mirror: Some("https://mirror.example.com/electron".into()),
            ..Default::default()
        };
        let url = release_url(&options, &Version::new(27, 0, 0)).unwrap();
        assert_eq!(url.as_str(), "https://mirror.example.com/electron/v27.0.0/");
    }

    #[test]
    fn checksums_are_parsed() {
        let sums = "abc123 *electron-v27.0.0-darwin-x64.zip\n\
                    def456  electron-v27.0.0-linux-x64.zip\n";
        assert_eq!(checksum_for(sums, "electron-v27.0.0-linux-x64.zip"), Some("def456"));
        assert_eq!(checksum_for(sums, "electron-v27.0.0-darwin-x64.zip"), Some("abc123"));
        assert_eq!(checksum_for(sums, "electron-v27.0.0-win32-x64.zip"), None);
    }

    #[tokio::test]
    async fn cached_archive_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let options = DownloadOptions {
            cache_root: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let spec = spec(Arch::X64, "27.0.0");
        let cached = tmp.path().join("27.0.0").join(spec.file_name());
        std::fs::create_dir_all(cached.parent().unwrap()).unwrap();
        std::fs::write(&cached, b"zip").unwrap();

        let path = ElectronDownloader::new().download(&spec, &options).await.unwrap();
        assert_eq!(path, cached);
    }
}
