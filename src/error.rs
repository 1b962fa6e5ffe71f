//! Top-level error types for the packager binary and library callers.
//!
//! [`PackagerError`] wraps the bundler's errors together with the ones raised
//! while reading configuration and offers actionable recovery suggestions.

use crate::bundler::Error as BundlerError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for packager operations
pub type Result<T> = std::result::Result<T, PackagerError>;

/// Main error type for packager runs
#[derive(Error, Debug)]
pub enum PackagerError {
    /// Packaging errors
    #[error("{0}")]
    Bundler(#[from] BundlerError),

    /// CLI argument and configuration errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error in {path}: {source}")]
    Toml {
        /// Config file being parsed
        path: PathBuf,
        /// Parser error
        #[source]
        source: toml::de::Error,
    },
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Arguments that parse but cannot be used
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// What is wrong with them
        reason: String,
    },

    /// Config file given with `--config` does not exist
    #[error("Config file not found: {}", path.display())]
    ConfigNotFound {
        /// Path that was given
        path: PathBuf,
    },
}

impl PackagerError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        match self {
            PackagerError::Bundler(BundlerError::Metadata(_)) => vec![
                "Run from the app directory or pass it as the first argument".to_string(),
                "Install electron as a devDependency: npm install --save-dev electron".to_string(),
                "Or pass --electron-version and a name explicitly".to_string(),
            ],
            PackagerError::Bundler(BundlerError::InvalidPlatform { supported, .. }) => vec![
                format!("Use one of: {supported}"),
                "Set --download-mirror to build unofficial platforms".to_string(),
            ],
            PackagerError::Bundler(BundlerError::InvalidArch { supported, .. }) => vec![
                format!("Use one of: {supported}"),
                "Set --download-mirror to build unofficial architectures".to_string(),
            ],
            PackagerError::Bundler(BundlerError::ZipNotFound(path)) => vec![
                format!("Place the Electron release zip at {}", path.display()),
                "Or drop --electron-zip-dir to download it".to_string(),
            ],
            PackagerError::Bundler(BundlerError::WineMissing) => vec![
                "Install wine and make sure it is on your PATH".to_string(),
                "Or package Windows targets on a Windows host".to_string(),
            ],
            PackagerError::Bundler(BundlerError::IncompatibleHook { hook }) => vec![
                format!("Remove the {hook} hook or stop using --prebuilt-asar"),
            ],
            PackagerError::Bundler(BundlerError::HashMismatch { .. }) => vec![
                "Delete the cached Electron zip and retry".to_string(),
                "Check that your download mirror serves official release files".to_string(),
            ],
            PackagerError::Bundler(BundlerError::ReservedAppName) => vec![
                "Rename the app so it does not end in \" Helper\"".to_string(),
            ],
            PackagerError::Cli(CliError::InvalidArguments { .. }) => vec![
                "Pass the directory that contains your app's package.json".to_string(),
            ],
            PackagerError::Toml { path, .. } => vec![format!(
                "Fix the syntax of {} or remove it",
                path.display()
            )],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }
}
