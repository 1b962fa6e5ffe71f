//! macOS and Mac App Store bundle assembly.
//!
//! - [`app`]: Info.plist rewriting, helper and bundle renaming
//! - [`icon`]: PNG to ICNS conversion
//! - [`sign`]: code signing and notarization through kodegen_sign
//! - [`universal`]: x64 + arm64 merges through `lipo`
//!
//! # Signing
//!
//! Signing requires a macOS host with `codesign` and a Developer ID
//! identity (or `-` for ad-hoc). `mas` builds that are not signed print a
//! warning; the bundle is still produced.

pub mod app;
pub mod icon;
pub mod sign;
pub mod universal;

pub use app::MacApp;
