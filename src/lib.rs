//! # kodegen_bundler_electron
//!
//! Packages an Electron application source directory into ready-to-run
//! bundles, one per platform and architecture.
//!
//! ## Features
//!
//! - **Target expansion**: `all`, comma lists and host defaults, with
//!   official-target filtering unless a download mirror is set
//! - **App copy**: ignore rules, junk filtering and devDependency pruning
//! - **asar**: archive creation with unpack globs and integrity hashes
//! - **macOS**: Info.plist rewriting, helper renaming, icons, signing,
//!   notarization and universal (x64 + arm64) merges
//! - **Windows**: executable renaming, rcedit resource edits and Authenticode
//! - **Hooks**: async callbacks at every stage of a build
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_electron ./my-app --platform=darwin,linux --arch=x64
//! kodegen_bundler_electron ./my-app "My App" --all --out dist --overwrite
//! kodegen_bundler_electron ./my-app --arch=universal --asar
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod bundler;
pub mod cli;
pub mod error;
pub mod metadata;
pub mod output;

// Re-export main types for public API
pub use bundler::{Options, package};
pub use cli::Args;
pub use error::{CliError, PackagerError, Result};
pub use output::OutputManager;
