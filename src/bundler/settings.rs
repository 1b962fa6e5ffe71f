//! Configuration structures for packaging operations.
//!
//! [`Options`] is what callers hand to [`package`](crate::bundler::package).
//! Metadata inference turns it into [`ResolvedOptions`], and target
//! expansion narrows that into one [`Combo`] per platform and architecture.
//! Each stage produces a new value; none mutates the previous one.

use crate::bundler::asar::AsarOptions;
use crate::bundler::copy_filter::IgnoreRule;
use crate::bundler::hooks::{HookArgs, Hooks};
use crate::bundler::targets::{Arch, Platform, Selector, Target, TargetFilter};
use crate::bundler::utils::naming;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where builds are staged before being moved to their final path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TempDirPolicy {
    /// `<system temp>/electron-bundler`
    #[default]
    System,
    /// `<dir>/electron-bundler`
    Custom(PathBuf),
    /// Build directly in the final output directory
    Disabled,
}

impl TempDirPolicy {
    /// Staging base directory, or `None` when staging is disabled.
    pub fn base_dir(&self) -> Option<PathBuf> {
        match self {
            Self::System => Some(naming::base_temp_dir(None)),
            Self::Custom(dir) => Some(naming::base_temp_dir(Some(dir.as_path()))),
            Self::Disabled => None,
        }
    }
}

/// Electron release download configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadOptions {
    /// Base URL replacing the GitHub releases location.
    ///
    /// A mirror also lifts the restriction to official platforms and
    /// architectures.
    ///
    /// Default: None (`ELECTRON_MIRROR` or GitHub)
    pub mirror: Option<String>,

    /// Cache directory for downloaded archives.
    ///
    /// Default: None (`<user cache>/electron`)
    pub cache_root: Option<PathBuf>,

    /// Re-download even when the archive is cached.
    ///
    /// Default: false
    pub force: bool,

    /// Skip SHASUMS256 verification.
    ///
    /// Default: false
    pub unsafely_disable_checksums: bool,
}

/// A property list supplied either as a file or inline.
#[derive(Clone, Debug, PartialEq)]
pub enum PlistSource {
    /// Path to a `.plist` file
    File(PathBuf),
    /// Inline dictionary
    Dictionary(plist::Dictionary),
}

impl PlistSource {
    /// Loads the dictionary.
    pub async fn load(&self) -> crate::bundler::Result<plist::Dictionary> {
        match self {
            Self::Dictionary(dict) => Ok(dict.clone()),
            Self::File(path) => {
                let path = path.clone();
                tokio::task::spawn_blocking(move || -> crate::bundler::Result<plist::Dictionary> {
                    plist::Value::from_file(&path)?
                        .into_dictionary()
                        .ok_or_else(|| {
                            crate::bundler::Error::GenericError(format!(
                                "{} does not contain a dictionary",
                                path.display()
                            ))
                        })
                })
                .await?
            }
        }
    }
}

/// A URL scheme the app registers (`CFBundleURLTypes`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    /// `CFBundleURLName`
    pub name: String,
    /// `CFBundleURLSchemes`
    pub schemes: Vec<String>,
}

/// macOS code signing configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MacSignOptions {
    /// Code signing identity.
    ///
    /// Example: "Developer ID Application: Your Name (TEAMID)"
    ///
    /// Default: None (`-`, ad-hoc)
    pub identity: Option<String>,

    /// Path to an entitlements plist.
    ///
    /// Default: None
    pub entitlements: Option<PathBuf>,

    /// Sign with the hardened runtime (required for notarization).
    ///
    /// Default: true
    pub hardened_runtime: bool,

    /// Downgrade signing failures to a warning.
    ///
    /// Default: true
    pub continue_on_error: bool,
}

impl Default for MacSignOptions {
    fn default() -> Self {
        Self {
            identity: None,
            entitlements: None,
            hardened_runtime: true,
            continue_on_error: true,
        }
    }
}

/// Options for the universal (x64 + arm64) merge.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UniversalOptions {
    /// Glob of files allowed to exist in only one slice.
    ///
    /// Default: None
    pub x64_arch_files: Option<String>,
}

/// macOS and Mac App Store bundle configuration.
#[derive(Clone, Debug, Default)]
pub struct MacOsSettings {
    /// `CFBundleIdentifier` of the app.
    ///
    /// Default: None (`com.electron.<name>`)
    pub app_bundle_id: Option<String>,

    /// Base `CFBundleIdentifier` of helper apps.
    ///
    /// Default: None (`<app_bundle_id>.helper`)
    pub helper_bundle_id: Option<String>,

    /// `LSApplicationCategoryType`
    ///
    /// Default: None
    pub app_category_type: Option<String>,

    /// Opt out of forced light mode (`NSRequiresAquaSystemAppearance = false`).
    ///
    /// Default: None (key left untouched)
    pub dark_mode_support: Option<bool>,

    /// Extra keys merged into the app's Info.plist.
    pub extend_info: Vec<PlistSource>,

    /// Extra keys merged into every helper's Info.plist.
    pub extend_helper_info: Vec<PlistSource>,

    /// URL schemes registered by the app.
    pub protocols: Vec<Protocol>,

    /// `NS<Name>UsageDescription` strings, keyed by `<Name>`.
    pub usage_description: BTreeMap<String, String>,

    /// Code signing.
    ///
    /// Default: None (unsigned; a warning is printed for mas builds)
    pub sign: Option<MacSignOptions>,

    /// Notarize after signing. Credentials come from the environment.
    ///
    /// Default: false
    pub notarize: bool,

    /// Universal merge tuning.
    pub universal: UniversalOptions,
}

/// Windows `VERSIONINFO` strings and manifest options.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Win32Metadata {
    /// `CompanyName` (inferred from the package author if unset)
    #[serde(rename = "CompanyName")]
    pub company_name: Option<String>,
    /// `FileDescription`
    #[serde(rename = "FileDescription")]
    pub file_description: Option<String>,
    /// `OriginalFilename`
    #[serde(rename = "OriginalFilename")]
    pub original_filename: Option<String>,
    /// `ProductName`
    #[serde(rename = "ProductName")]
    pub product_name: Option<String>,
    /// `InternalName`
    #[serde(rename = "InternalName")]
    pub internal_name: Option<String>,
    /// `asInvoker`, `highestAvailable` or `requireAdministrator`
    pub requested_execution_level: Option<String>,
    /// Path to a manifest embedded in the executable
    pub application_manifest: Option<PathBuf>,
}

impl Win32Metadata {
    /// Whether nothing was set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Authenticode signing configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowsSignOptions {
    /// Path to certificate file (.pem, .crt, .pfx).
    pub cert_path: PathBuf,

    /// Path to private key file (.pem, .key).
    ///
    /// Not needed for PKCS#12 (.pfx) files which contain both cert and key.
    ///
    /// Default: None
    pub key_path: Option<PathBuf>,

    /// Password for encrypted key or PKCS#12 file.
    ///
    /// Default: None
    pub password: Option<String>,

    /// Timestamp server URL.
    ///
    /// Default: None (`http://timestamp.digicert.com`)
    pub timestamp_url: Option<String>,

    /// Publisher URL embedded in the signature
    pub app_url: Option<String>,
}

/// Windows bundle configuration.
#[derive(Clone, Debug, Default)]
pub struct WindowsSettings {
    /// Version strings and manifest options written with rcedit.
    pub win32_metadata: Win32Metadata,

    /// Authenticode signing.
    ///
    /// Default: None (unsigned)
    pub sign: Option<WindowsSignOptions>,
}

/// Packaging configuration.
///
/// # Examples
///
/// ```no_run
/// use kodegen_bundler_electron::bundler::{Options, Selector};
///
/// let mut options = Options::new("./my-app");
/// options.platform = Some(Selector::parse("linux,win32"));
/// options.overwrite = true;
/// ```
#[derive(Clone)]
pub struct Options {
    /// Application source directory (must contain package.json).
    pub dir: PathBuf,

    /// Application name.
    ///
    /// Default: None (`productName` or `name` from package.json)
    pub name: Option<String>,

    /// Platforms to build.
    ///
    /// Default: None (host platform)
    pub platform: Option<Selector>,

    /// Architectures to build.
    ///
    /// Default: None (host architecture)
    pub arch: Option<Selector>,

    /// Build every official platform and architecture.
    ///
    /// Default: false
    pub all: bool,

    /// Electron version to package.
    ///
    /// Default: None (installed or declared `electron` package)
    pub electron_version: Option<String>,

    /// Application version.
    ///
    /// Default: None (`version` from package.json)
    pub app_version: Option<String>,

    /// Build version (`CFBundleVersion`, Windows file version).
    ///
    /// Default: None (`app_version`)
    pub build_version: Option<String>,

    /// Human-readable copyright line.
    pub app_copyright: Option<String>,

    /// Name of the executable, without extension.
    ///
    /// Default: None (`name`)
    pub executable_name: Option<String>,

    /// Pack the app into an asar archive.
    ///
    /// Default: None (loose `resources/app` directory)
    pub asar: Option<AsarOptions>,

    /// Ship this asar archive instead of copying `dir`.
    pub prebuilt_asar: Option<PathBuf>,

    /// Output directory.
    ///
    /// Default: None (current directory)
    pub out: Option<PathBuf>,

    /// Staging policy.
    pub tmpdir: TempDirPolicy,

    /// Replace existing output directories.
    ///
    /// Default: false (existing targets are skipped)
    pub overwrite: bool,

    /// Drop devDependencies from the copied `node_modules`.
    ///
    /// Default: true
    pub prune: bool,

    /// Skip junk files such as `.DS_Store` and `Thumbs.db`.
    ///
    /// Default: true
    pub junk: bool,

    /// Copy the targets of symlinks instead of the links.
    ///
    /// Default: true
    pub deref_symlinks: bool,

    /// Files to leave out of the copied app.
    ///
    /// Default: None (default ignore patterns only)
    pub ignore: Option<IgnoreRule>,

    /// Files copied into the bundle's resources directory.
    pub extra_resource: Vec<PathBuf>,

    /// Icon path; the extension is replaced per platform.
    pub icon: Option<PathBuf>,

    /// Directory holding pre-downloaded Electron archives.
    pub electron_zip_dir: Option<PathBuf>,

    /// Download configuration.
    pub download: DownloadOptions,

    /// Suppress informational and warning output.
    ///
    /// Default: false
    pub quiet: bool,

    /// Drops targets for which the filter returns false.
    pub target_filter: Option<TargetFilter>,

    /// Lifecycle hooks.
    pub hooks: Hooks,

    /// `darwin` and `mas` settings.
    pub mac: MacOsSettings,

    /// `win32` settings.
    pub windows: WindowsSettings,
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("dir", &self.dir)
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("arch", &self.arch)
            .field("all", &self.all)
            .field("electron_version", &self.electron_version)
            .field("app_version", &self.app_version)
            .field("asar", &self.asar)
            .field("prebuilt_asar", &self.prebuilt_asar)
            .field("out", &self.out)
            .field("tmpdir", &self.tmpdir)
            .field("overwrite", &self.overwrite)
            .field("prune", &self.prune)
            .field("ignore", &self.ignore)
            .field("target_filter", &self.target_filter.is_some())
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Options for the app in `dir` with every default.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            name: None,
            platform: None,
            arch: None,
            all: false,
            electron_version: None,
            app_version: None,
            build_version: None,
            app_copyright: None,
            executable_name: None,
            asar: None,
            prebuilt_asar: None,
            out: None,
            tmpdir: TempDirPolicy::default(),
            overwrite: false,
            prune: true,
            junk: true,
            deref_symlinks: true,
            ignore: None,
            extra_resource: Vec::new(),
            icon: None,
            electron_zip_dir: None,
            download: DownloadOptions::default(),
            quiet: false,
            target_filter: None,
            hooks: Hooks::default(),
            mac: MacOsSettings::default(),
            windows: WindowsSettings::default(),
        }
    }

    /// Whether a download mirror lifts the official-target restriction.
    pub fn uses_mirror(&self) -> bool {
        self.download.mirror.is_some()
    }
}

/// Options after metadata inference.
#[derive(Clone, Debug)]
pub struct ResolvedOptions {
    /// Application name
    pub name: String,
    /// Electron version being packaged
    pub electron_version: Version,
    /// Application version, if known
    pub app_version: Option<String>,
    /// Win32 metadata with `CompanyName` filled from the package author
    pub win32_metadata: Win32Metadata,
    /// Absolute source directory
    pub dir: PathBuf,
    /// Absolute output directory
    pub out: PathBuf,
    /// Working directory at the time of the call
    pub cwd: PathBuf,
    /// The caller's options, unchanged
    pub options: Options,
}

impl ResolvedOptions {
    /// `<out>/<name>-<platform>-<arch>`
    pub fn final_path(&self, target: &Target) -> PathBuf {
        naming::final_path(
            &self.out,
            &self.name,
            target.platform.as_str(),
            target.arch.as_str(),
        )
    }
}

/// Options narrowed to one target.
#[derive(Clone, Debug)]
pub struct Combo {
    /// Target being built
    pub target: Target,
    /// Shared resolved options
    pub resolved: Arc<ResolvedOptions>,
    /// Where the finished bundle goes
    pub final_path: PathBuf,
    /// Sign and notarize after platform steps (false for universal slices)
    pub codesign: bool,
}

impl Combo {
    /// Combo for `target`, writing its bundle under the resolved `out`.
    pub fn new(resolved: Arc<ResolvedOptions>, target: Target) -> Self {
        let final_path = resolved.final_path(&target);
        Self {
            target,
            resolved,
            final_path,
            codesign: true,
        }
    }

    /// Same target written under a different output directory.
    pub fn with_out_dir(&self, out: &Path) -> Self {
        Self {
            final_path: naming::final_path(
                out,
                &self.resolved.name,
                self.target.platform.as_str(),
                self.target.arch.as_str(),
            ),
            ..self.clone()
        }
    }

    /// The caller's options.
    pub fn options(&self) -> &Options {
        &self.resolved.options
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.resolved.name
    }

    /// Executable name before sanitization.
    pub fn executable_name(&self) -> &str {
        self.options()
            .executable_name
            .as_deref()
            .unwrap_or(&self.resolved.name)
    }

    /// Target platform.
    pub fn platform(&self) -> &Platform {
        &self.target.platform
    }

    /// Target architecture.
    pub fn arch(&self) -> &Arch {
        &self.target.arch
    }

    /// Build version, falling back to the app version.
    pub fn build_version(&self) -> Option<&str> {
        self.options()
            .build_version
            .as_deref()
            .or(self.resolved.app_version.as_deref())
    }

    /// Arguments for a per-target hook.
    pub fn hook_args(&self, path: &Path) -> HookArgs {
        HookArgs {
            path: path.to_path_buf(),
            electron_version: self.resolved.electron_version.to_string(),
            platform: self.target.platform.clone(),
            arch: self.target.arch.clone(),
        }
    }
}
