//! Errors raised while packaging.
//!
//! Configuration mistakes and missing inputs get their own variants so
//! callers of [`package`](crate::bundler::package) can match on them. I/O
//! failures carry the path involved via [`ErrorExt::fs_context`], other
//! failures can be wrapped with a message via [`Context`], and `bail!`
//! returns a message-only error early.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_electron::bundler::{Context, ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<serde_json::Value> {
//!     let contents = std::fs::read_to_string(path)
//!         .fs_context("reading manifest", path)?;
//!
//!     let manifest = serde_json::from_str(&contents)
//!         .map_err(kodegen_bundler_electron::bundler::Error::from)
//!         .context("parsing package.json")?;
//!
//!     Ok(manifest)
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the packager.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading manifest")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// Child process execution error.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// A child process ran but exited unsuccessfully.
    #[error("{command} exited with {status}: {stderr}")]
    CommandStatus {
        /// Command that failed
        command: String,
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Image processing error (icon conversion, resizing).
    #[error("{0}")]
    ImageError(#[from] image::ImageError),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// JSON serialization/deserialization error.
    #[error("{0}")]
    JsonError(#[from] serde_json::error::Error),

    /// Property list (plist) parsing/writing error.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Invalid ignore pattern.
    #[error("{0}")]
    RegexError(#[from] regex::Error),

    /// Invalid asar unpack glob.
    #[error("{0}")]
    GlobPattern(#[from] glob::PatternError),

    /// HTTP client error (downloading Electron releases).
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("{0}")]
    UrlParse(#[from] url::ParseError),

    /// Hash mismatch for downloaded files.
    #[error("hash mismatch of downloaded file: expected {expected}, got {actual}")]
    HashMismatch {
        /// Expected hash value
        expected: String,
        /// Actual hash value
        actual: String,
    },

    /// Binary parsing error (Mach-O analysis).
    #[error("binary parse error: {0}")]
    BinaryParseError(#[from] goblin::error::Error),

    /// Semantic version parsing error.
    #[error("{0}")]
    SemverError(#[from] semver::Error),

    /// A requested platform is not an official Electron platform.
    #[error("Unsupported platform={value} (only {supported} are supported)")]
    InvalidPlatform {
        /// The literal the caller passed
        value: String,
        /// Comma separated list of supported values
        supported: String,
    },

    /// A requested architecture is not an official Electron architecture.
    #[error("Unsupported arch={value} (only {supported} are supported)")]
    InvalidArch {
        /// The literal the caller passed
        value: String,
        /// Comma separated list of supported values
        supported: String,
    },

    /// A lifecycle hook was combined with an option that makes it meaningless.
    #[error("{hook} is incompatible with prebuilt_asar")]
    IncompatibleHook {
        /// Hook slot name
        hook: &'static str,
    },

    /// The prebuilt asar path exists but is not a regular file.
    #[error("prebuilt_asar must be an asar file: {0}")]
    PrebuiltAsarNotFile(PathBuf),

    /// The application name collides with macOS helper naming.
    #[error("Application names cannot end in \" Helper\" due to limitations on macOS")]
    ReservedAppName,

    /// `package.json` missing from the copied application.
    #[error(
        "Application manifest was not found. Make sure \"{}\" exists and does not get ignored by your ignore option",
        .0.display()
    )]
    ManifestNotFound(PathBuf),

    /// The `main` entry point missing from the copied application.
    #[error(
        "The main entry point to your app was not found. Make sure \"{}\" exists and does not get ignored by your ignore option",
        .0.display()
    )]
    EntryPointNotFound(PathBuf),

    /// `electron_zip_dir` was configured but the expected archive is absent.
    #[error("The specified Electron ZIP file does not exist: {}", .0.display())]
    ZipNotFound(PathBuf),

    /// A required property could not be inferred from package.json.
    #[error("{0}")]
    Metadata(String),

    /// A required production dependency is not installed.
    #[error("Cannot find module '{module}' required by '{required_by}'")]
    MissingModule {
        /// Module that could not be resolved
        module: String,
        /// Module whose manifest declares it
        required_by: String,
    },

    /// `wine` is required for resource editing on non-Windows hosts.
    #[error(
        "Could not find \"wine\" on your system.\n\n\
         Wine is required to use the app_copyright, app_version, build_version, icon, and \n\
         win32_metadata parameters for Windows targets.\n\n\
         Make sure that the \"wine\" executable is in your PATH.\n\n\
         Alternatively, package the app on a Windows host or leave those options unset."
    )]
    WineMissing,

    /// A user lifecycle hook failed.
    #[error("hook {slot} failed: {source}")]
    Hook {
        /// Hook slot name
        slot: &'static str,
        /// Error returned by the hook
        #[source]
        source: anyhow::Error,
    },

    /// A spawned task failed to complete.
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Application signing failed (all platforms).
    #[error("failed to sign app: {0}")]
    Sign(String),

    /// macOS notarization failed.
    #[error("failed to notarize app: {0}")]
    Notarize(String),

    /// Universal merge failed.
    #[error("failed to create universal app: {0}")]
    Universal(String),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

/// Result with the packager's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Wraps an error (or a missing value) with a message.
///
/// On `Option`, `None` becomes [`Error::GenericError`] holding the message.
pub trait Context<T> {
    /// Wrap with `context`.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap with the message built by `f`, only on failure.
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Attaches the operation and path to I/O errors.
pub trait ErrorExt<T> {
    /// Turns an I/O error into [`Error::Fs`].
    ///
    /// `context` reads as a verb phrase: "reading manifest", "moving bundle".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

/// Returns early with an [`Error::GenericError`].
///
/// ```ignore
/// bail!("{} is not a directory", path.display());
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::bundler::Error::GenericError($msg.into()))
    };
    ($err:expr $(,)?) => {
        return Err($crate::bundler::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($fmt, $($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_context_keeps_path() {
        let err: Result<()> = Err(io::Error::from(io::ErrorKind::NotFound))
            .fs_context("reading manifest", "/tmp/app/package.json");
        let message = err.unwrap_err().to_string();
        assert!(message.starts_with("reading manifest /tmp/app/package.json"));
    }

    #[test]
    fn option_context_becomes_generic_error() {
        let value: Option<u8> = None;
        let err = value.context("no value").unwrap_err();
        assert!(matches!(err, Error::GenericError(ref m) if m == "no value"));
    }

    #[test]
    fn manifest_error_names_original_path() {
        let err = Error::ManifestNotFound(PathBuf::from("/src/app/package.json"));
        assert!(err.to_string().contains("\"/src/app/package.json\" exists"));
    }
}
