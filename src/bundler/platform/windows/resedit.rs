//! Executable resource editing with rcedit.

use crate::bundler::error::{Error, Result};
use crate::bundler::utils::process;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Environment variable pointing at an rcedit executable.
pub const RCEDIT_ENV: &str = "RCEDIT_PATH";

/// Resource changes applied to a Windows executable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceEdits {
    /// `VERSIONINFO` strings such as `CompanyName`
    pub version_strings: BTreeMap<String, String>,
    /// Binary file version
    pub file_version: Option<String>,
    /// Binary product version
    pub product_version: Option<String>,
    /// `.ico` written as the main icon
    pub icon: Option<PathBuf>,
    /// Manifest `requestedExecutionLevel`
    pub requested_execution_level: Option<String>,
    /// Manifest replacing the embedded one
    pub application_manifest: Option<PathBuf>,
}

impl ResourceEdits {
    /// Command line arguments understood by rcedit, after the executable.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.version_strings {
            args.extend(["--set-version-string".into(), key.clone(), value.clone()]);
        }
        if let Some(version) = &self.file_version {
            args.extend(["--set-file-version".into(), version.clone()]);
        }
        if let Some(version) = &self.product_version {
            args.extend(["--set-product-version".into(), version.clone()]);
        }
        if let Some(icon) = &self.icon {
            args.extend(["--set-icon".into(), icon.display().to_string()]);
        }
        if let Some(level) = &self.requested_execution_level {
            args.extend(["--set-requested-execution-level".into(), level.clone()]);
        }
        if let Some(manifest) = &self.application_manifest {
            args.extend(["--application-manifest".into(), manifest.display().to_string()]);
        }
        args
    }
}

/// Writes resources into a Windows executable.
#[async_trait]
pub trait ResourceEditor: Send + Sync {
    /// Applies `edits` to `exe` in place.
    async fn edit(&self, exe: &Path, edits: &ResourceEdits) -> Result<()>;
}

/// [`ResourceEditor`] backed by the rcedit tool, run through wine on
/// non-Windows hosts.
#[derive(Debug, Default, Clone)]
pub struct RceditEditor {
    rcedit: Option<PathBuf>,
}

impl RceditEditor {
    /// Editor using an explicit rcedit executable.
    pub fn with_path(rcedit: impl Into<PathBuf>) -> Self {
        Self {
            rcedit: Some(rcedit.into()),
        }
    }

    fn locate(&self) -> Result<PathBuf> {
        if let Some(path) = &self.rcedit {
            return Ok(path.clone());
        }
        if let Some(path) = std::env::var_os(RCEDIT_ENV) {
            return Ok(PathBuf::from(path));
        }
        ["rcedit", "rcedit-x64.exe", "rcedit.exe"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                Error::GenericError(format!(
                    "Could not find rcedit. Install it on your PATH or set {RCEDIT_ENV}."
                ))
            })
    }
}

#[async_trait]
impl ResourceEditor for RceditEditor {
    async fn edit(&self, exe: &Path, edits: &ResourceEdits) -> Result<()> {
        let rcedit = self.locate()?;
        let mut command = if cfg!(windows) {
            Command::new(&rcedit)
        } else {
            let wine = which::which("wine").map_err(|_| Error::WineMissing)?;
            let mut command = Command::new(wine);
            command.arg(&rcedit);
            command
        };
        command.arg(exe).args(edits.to_args());

        log::debug!("Editing resources of {}", exe.display());
        match process::run(&mut command, "rcedit").await {
            Ok(_) => Ok(()),
            Err(Error::CommandStatus { stderr, .. }) if stderr.contains("Could not find \"wine\"") => {
                Err(Error::WineMissing)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_follow_rcedit_syntax() {
        let mut edits = ResourceEdits {
            file_version: Some("1.2.3.4".into()),
            product_version: Some("1.2.3".into()),
            icon: Some(PathBuf::from("icon.ico")),
            requested_execution_level: Some("asInvoker".into()),
            ..Default::default()
        };
        edits.version_strings.insert("CompanyName".into(), "Acme".into());

        assert_eq!(
            edits.to_args(),
            [
                "--set-version-string",
                "CompanyName",
                "Acme",
                "--set-file-version",
                "1.2.3.4",
                "--set-product-version",
                "1.2.3",
                "--set-icon",
                "icon.ico",
                "--set-requested-execution-level",
                "asInvoker",
            ]
        );
    }
}
