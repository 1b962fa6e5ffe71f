//! Windows code signing integration.
//!
//! Adapts [`WindowsSignOptions`] to the kodegen_sign Authenticode API.

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::WindowsSignOptions;
use async_trait::async_trait;
use std::path::Path;

/// Timestamp server used when none is configured.
pub const DEFAULT_TIMESTAMP_URL: &str = "http://timestamp.digicert.com";

/// Signs Windows executables.
#[async_trait]
pub trait WindowsSigner: Send + Sync {
    /// Signs `exe` in place.
    async fn sign(&self, exe: &Path, app_name: &str, options: &WindowsSignOptions) -> Result<()>;
}

/// [`WindowsSigner`] backed by `kodegen_bundler_sign`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KodegenWindowsSigner;

#[async_trait]
impl WindowsSigner for KodegenWindowsSigner {
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    async fn sign(&self, exe: &Path, app_name: &str, options: &WindowsSignOptions) -> Result<()> {
        log::info!("Signing {} with Authenticode", exe.display());

        let config = kodegen_bundler_sign::windows::SignConfig {
            cert_path: options.cert_path.clone(),
            key_path: options.key_path.clone(),
            password: options.password.clone(),
            timestamp_url: options
                .timestamp_url
                .clone()
                .or_else(|| Some(DEFAULT_TIMESTAMP_URL.to_string())),
            app_name: Some(app_name.to_string()),
            app_url: options.app_url.clone(),
        };

        kodegen_bundler_sign::windows::sign_binary(exe, &config)
            .await
            .map_err(|e| Error::Sign(format!("Windows code signing failed: {e}")))?;

        let hash = kodegen_bundler_sign::windows::generate_integrity_hash(exe)
            .await
            .map_err(|e| Error::Sign(format!("hash generation failed: {e}")))?;
        log::info!(
            "Signed {} (SHA-256: {})",
            exe.display(),
            hash.get(..16).unwrap_or(&hash)
        );
        Ok(())
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    async fn sign(&self, exe: &Path, _app_name: &str, _options: &WindowsSignOptions) -> Result<()> {
        Err(Error::Sign(format!(
            "Authenticode signing of {} is not supported on this host",
            exe.display()
        )))
    }
}
