//! macOS code signing and notarization integration.
//!
//! [`KodegenMacSigner`] adapts [`MacSignOptions`] to the kodegen_sign API.
//! [`sign_and_notarize`] applies the packaging policy around any
//! [`MacSigner`]: unsigned `mas` builds warn, failed signing is a warning
//! unless `continue_on_error` is off, and notarization only follows a
//! configured signature.

use crate::bundler::error::{Error, Result};
use crate::bundler::settings::{Combo, MacSignOptions};
use crate::bundler::targets::Platform;
use crate::output::OutputManager;
use async_trait::async_trait;
use std::path::Path;

/// Identity used when none is configured.
pub const AD_HOC_IDENTITY: &str = "-";

/// Signs and notarizes macOS app bundles.
#[async_trait]
pub trait MacSigner: Send + Sync {
    /// Signs `app` for `platform` (`darwin` or `mas`).
    async fn sign(&self, app: &Path, platform: &Platform, options: &MacSignOptions) -> Result<()>;

    /// Notarizes a signed `app` and staples the ticket.
    async fn notarize(&self, app: &Path) -> Result<()>;
}

/// [`MacSigner`] backed by `kodegen_bundler_sign`.
///
/// Notarization credentials are read from the environment:
///
/// **API Key (Recommended):**
/// - `APPLE_API_KEY` - Key ID from App Store Connect
/// - `APPLE_API_ISSUER` - Issuer ID from App Store Connect
/// - `APPLE_API_KEY_PATH` - Path to AuthKey_*.p8 file (optional, auto-searched)
///
/// **Apple ID (Legacy):**
/// - `APPLE_ID` - Your Apple ID email
/// - `APPLE_PASSWORD` - App-specific password
/// - `APPLE_TEAM_ID` - Your team ID
#[derive(Debug, Default, Clone, Copy)]
pub struct KodegenMacSigner;

#[cfg(target_os = "macos")]
#[async_trait]
impl MacSigner for KodegenMacSigner {
    async fn sign(&self, app: &Path, platform: &Platform, options: &MacSignOptions) -> Result<()> {
        let identity = options.identity.as_deref().unwrap_or(AD_HOC_IDENTITY);
        log::info!(
            "Signing {} ({}) with identity '{}'",
            app.display(),
            platform,
            identity
        );

        kodegen_bundler_sign::macos::sign_with_entitlements(
            app,
            identity,
            options.entitlements.as_deref(),
            options.hardened_runtime,
        )
        .await
        .map_err(|e| Error::Sign(e.to_string()))?;

        log::info!("Signed {}", app.display());
        Ok(())
    }

    async fn notarize(&self, app: &Path) -> Result<()> {
        log::info!("Notarizing {}", app.display());

        // A key written from APPLE_API_KEY_CONTENT is used by path directly.
        let auth = match kodegen_bundler_sign::macos::ensure_api_key_file()
            .await
            .map_err(|e| Error::Notarize(format!("failed to write API key file: {e}")))?
        {
            Some(key_path) => {
                let key_id = std::env::var("APPLE_API_KEY")
                    .map_err(|_| Error::Notarize("APPLE_API_KEY not set".to_string()))?;
                let issuer_id = std::env::var("APPLE_API_ISSUER")
                    .map_err(|_| Error::Notarize("APPLE_API_ISSUER not set".to_string()))?;
                kodegen_bundler_sign::macos::NotarizationAuth::ApiKey {
                    key_id,
                    issuer_id,
                    key_path,
                }
            }
            None => kodegen_bundler_sign::macos::NotarizationAuth::from_env()
                .await
                .map_err(|e| {
                    Error::Notarize(format!("failed to load notarization credentials: {e}"))
                })?,
        };

        kodegen_bundler_sign::macos::notarize(app, &auth, true)
            .await
            .map_err(|e| Error::Notarize(e.to_string()))?;

        log::info!("Notarized {}", app.display());
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
#[async_trait]
impl MacSigner for KodegenMacSigner {
    async fn sign(&self, app: &Path, _platform: &Platform, _options: &MacSignOptions) -> Result<()> {
        Err(Error::Sign(format!(
            "{} can only be signed on a macOS host",
            app.display()
        )))
    }

    async fn notarize(&self, app: &Path) -> Result<()> {
        Err(Error::Notarize(format!(
            "{} can only be notarized on a macOS host",
            app.display()
        )))
    }
}

/// What [`sign_and_notarize`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignReport {
    /// The signer succeeded
    pub signed: bool,
    /// Notarization ran and succeeded
    pub notarized: bool,
    /// Warnings printed along the way
    pub warnings: Vec<String>,
}

impl SignReport {
    fn warn(&mut self, output: &OutputManager, message: String) {
        let _ = output.warn(&message);
        self.warnings.push(message);
    }
}

/// Signs and notarizes `app` as configured for `combo`.
pub async fn sign_and_notarize(
    signer: &dyn MacSigner,
    app: &Path,
    combo: &Combo,
    output: &OutputManager,
) -> Result<SignReport> {
    let mut report = SignReport::default();
    let mac = &combo.options().mac;
    let Some(sign) = &mac.sign else {
        if *combo.platform() == Platform::Mas {
            report.warn(
                output,
                "signing is required for mas builds. Provide the osx-sign option, \
                 or manually sign the app later."
                    .to_string(),
            );
        }
        return Ok(report);
    };

    match signer.sign(app, combo.platform(), sign).await {
        Ok(()) => report.signed = true,
        Err(err) if sign.continue_on_error => {
            log::debug!("Signing {} failed: {}", app.display(), err);
            report.warn(output, format!("Code sign failed; please retry manually. {err}"));
        }
        Err(err) => return Err(err),
    }

    if mac.notarize {
        signer.notarize(app).await?;
        report.notarized = true;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::settings::{Options, ResolvedOptions};
    use crate::bundler::targets::{Arch, Target};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeSigner {
        fail_sign: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl MacSigner for FakeSigner {
        async fn sign(&self, _app: &Path, _platform: &Platform, _options: &MacSignOptions) -> Result<()> {
            self.calls.lock().unwrap().push("sign");
            if self.fail_sign {
                return Err(Error::Sign("no identity".into()));
            }
            Ok(())
        }

        async fn notarize(&self, _app: &Path) -> Result<()> {
            self.calls.lock().unwrap().push("notarize");
            Ok(())
        }
    }

    fn combo(platform: Platform, configure: impl FnOnce(&mut Options)) -> Combo {
        let mut options = Options::new("/src/app");
        configure(&mut options);
        let resolved = ResolvedOptions {
            name: "Shiny".into(),
            electron_version: semver::Version::new(27, 1, 3),
            app_version: None,
            win32_metadata: Default::default(),
            dir: "/src/app".into(),
            out: "/out".into(),
            cwd: "/src".into(),
            options,
        };
        Combo::new(Arc::new(resolved), Target::new(platform, Arch::X64))
    }

    fn quiet() -> OutputManager {
        OutputManager::new(false, true)
    }

    #[tokio::test]
    async fn unsigned_mas_build_warns() {
        let signer = FakeSigner::default();
        let report = sign_and_notarize(&signer, Path::new("/a.app"), &combo(Platform::Mas, |_| {}), &quiet())
            .await
            .unwrap();
        assert!(!report.signed);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("signing is required for mas builds"));
        assert!(signer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsigned_darwin_build_is_silent_and_skips_notarization() {
        let signer = FakeSigner::default();
        let combo = combo(Platform::Darwin, |o| o.mac.notarize = true);
        let report = sign_and_notarize(&signer, Path::new("/a.app"), &combo, &quiet())
            .await
            .unwrap();
        assert_eq!(report, SignReport::default());
        assert!(signer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_signing_is_a_warning_by_default() {
        assert!(MacSignOptions::default().continue_on_error);
        let signer = FakeSigner {
            fail_sign: true,
            ..Default::default()
        };
        let combo = combo(Platform::Darwin, |o| o.mac.sign = Some(MacSignOptions::default()));
        let report = sign_and_notarize(&signer, Path::new("/a.app"), &combo, &quiet())
            .await
            .unwrap();
        assert!(!report.signed);
        assert!(report.warnings[0].starts_with("Code sign failed"));
        assert!(report.warnings[0].contains("no identity"));
    }

    #[tokio::test]
    async fn failed_signing_propagates_without_continue_on_error() {
        let signer = FakeSigner {
            fail_sign: true,
            ..Default::default()
        };
        let combo = combo(Platform::Darwin, |o| {
            o.mac.sign = Some(MacSignOptions {
                continue_on_error: false,
                ..Default::default()
            });
            o.mac.notarize = true;
        });
        let err = sign_and_notarize(&signer, Path::new("/a.app"), &combo, &quiet())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sign(_)));
        assert_eq!(*signer.calls.lock().unwrap(), ["sign"]);
    }

    #[tokio::test]
    async fn notarization_follows_signing() {
        let signer = FakeSigner::default();
        let combo = combo(Platform::Darwin, |o| {
            o.mac.sign = Some(MacSignOptions::default());
            o.mac.notarize = true;
        });
        let report = sign_and_notarize(&signer, Path::new("/a.app"), &combo, &quiet())
            .await
            .unwrap();
        assert!(report.signed && report.notarized);
        assert!(report.warnings.is_empty());
        assert_eq!(*signer.calls.lock().unwrap(), ["sign", "notarize"]);
    }
}
