//! Electron application packager.
//!
//! Turns an application source directory plus an Electron release archive
//! into one ready-to-run bundle per requested platform and architecture.
//!
//! # Configuration
//!
//! Packaging is configured with [`Options`]. Anything left unset that can be
//! read from the app's `package.json` (name, app version, Electron version,
//! Windows company name) is inferred.
//!
//! # Supported Targets
//!
//! | Platform | Architectures | Bundle |
//! |----------|---------------|--------|
//! | `darwin`, `mas` | x64, arm64, universal | `<Name>.app` |
//! | `linux` | x64, ia32, armv7l, arm64, mips64el | flat directory |
//! | `win32` | ia32, x64, arm64 | flat directory with `<name>.exe` |
//!
//! With a custom download mirror, unofficial platforms and architectures
//! are accepted and assembled like linux.
//!
//! # Integration
//!
//! ```no_run
//! use kodegen_bundler_electron::bundler::{package, Options};
//!
//! # async fn example() -> kodegen_bundler_electron::bundler::Result<()> {
//! let mut options = Options::new("./my-app");
//! options.overwrite = true;
//! let bundles = package(options).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Code Signing
//!
//! See [`kodegen_sign`](https://docs.rs/kodegen_bundler_sign) for code signing setup:
//! - macOS: Developer ID signing and notarization
//! - Windows: Authenticode via osslsigncode

#![warn(missing_docs)]

pub mod asar;
mod builder;
pub mod collaborators;
pub mod copy_filter;
mod error;
pub mod hooks;
pub mod platform;
pub mod prune;
mod resources;
pub mod settings;
pub mod targets;
pub mod utils;

// Public re-exports
pub use builder::{BuildOutcome, Packager, SkipReason, package, package_with};
pub use collaborators::Collaborators;
pub use copy_filter::IgnoreRule;
pub use error::{Context, Error, ErrorExt, Result};
pub use hooks::{Done, Hook, HookArgs, Hooks, TargetHook, serial};
pub use settings::{
    Combo,
    DownloadOptions,
    // Platform-specific settings
    MacOsSettings,
    MacSignOptions,
    // Main configuration types
    Options,
    PlistSource,
    Protocol,
    ResolvedOptions,
    TempDirPolicy,
    UniversalOptions,
    Win32Metadata,
    WindowsSettings,
    WindowsSignOptions,
};
pub use targets::{Arch, Platform, Selector, Target, TargetFilter};
