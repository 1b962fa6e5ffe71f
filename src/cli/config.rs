//! `packager.toml` loading.
//!
//! Keys use the same camelCase names as the JSON-style option objects
//! (`electronVersion`, `appBundleId`, ...). Relative paths are resolved
//! against the directory holding the config file.
//!
//! ```toml
//! name = "My App"
//! platform = ["darwin", "linux"]
//! asar = { unpack = "*.node" }
//! tmpdir = false
//!
//! [mac]
//! appBundleId = "com.example.myapp"
//! protocols = [{ name = "My App", schemes = ["myapp"] }]
//!
//! [windows.win32metadata]
//! CompanyName = "Example Inc."
//! ```

use crate::bundler::asar::AsarOptions;
use crate::bundler::{
    DownloadOptions, IgnoreRule, MacSignOptions, Options, PlistSource, Protocol, Selector,
    TempDirPolicy, UniversalOptions, Win32Metadata, WindowsSignOptions,
};
use crate::error::{CliError, PackagerError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the config file looked up in the app directory.
pub const CONFIG_FILE_NAME: &str = "packager.toml";

/// One value or a list of values.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StringList {
    /// `"darwin,linux"` or `"all"`
    One(String),
    /// `["darwin", "linux"]`
    Many(Vec<String>),
}

impl StringList {
    fn into_selector(self) -> Selector {
        match self {
            StringList::One(value) => Selector::parse(&value),
            StringList::Many(values) => Selector::from_list(values),
        }
    }
}

/// `asar = true` or `asar = { unpack = "..." }`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AsarSetting {
    /// Enable or disable with default options
    Enabled(bool),
    /// Enable with options
    Options(AsarOptions),
}

/// `tmpdir = false` or `tmpdir = "path"`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TmpdirSetting {
    /// `false` builds in place, `true` uses the system temp directory
    Enabled(bool),
    /// Custom staging base
    Path(PathBuf),
}

/// `[mac]` table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MacConfig {
    pub app_bundle_id: Option<String>,
    pub helper_bundle_id: Option<String>,
    pub app_category_type: Option<String>,
    pub dark_mode_support: Option<bool>,
    /// Plist files merged into the app's Info.plist
    pub extend_info: Vec<PathBuf>,
    /// Plist files merged into every helper's Info.plist
    pub extend_helper_info: Vec<PathBuf>,
    pub protocols: Vec<Protocol>,
    pub usage_description: BTreeMap<String, String>,
    pub sign: Option<MacSignOptions>,
    pub notarize: bool,
    pub universal: UniversalOptions,
}

/// `[windows]` table.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WindowsConfig {
    #[serde(rename = "win32metadata", alias = "win32Metadata")]
    pub win32_metadata: Win32Metadata,
    pub sign: Option<WindowsSignOptions>,
}

/// Parsed contents of a config file.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileConfig {
    pub name: Option<String>,
    pub platform: Option<StringList>,
    pub arch: Option<StringList>,
    pub all: bool,
    pub electron_version: Option<String>,
    pub app_version: Option<String>,
    pub build_version: Option<String>,
    pub app_copyright: Option<String>,
    pub executable_name: Option<String>,
    pub asar: Option<AsarSetting>,
    pub prebuilt_asar: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub tmpdir: Option<TmpdirSetting>,
    pub overwrite: bool,
    pub prune: Option<bool>,
    pub junk: Option<bool>,
    pub deref_symlinks: Option<bool>,
    pub ignore: Vec<String>,
    pub extra_resource: Vec<PathBuf>,
    pub icon: Option<PathBuf>,
    pub electron_zip_dir: Option<PathBuf>,
    pub download: DownloadOptions,
    pub quiet: bool,
    pub mac: MacConfig,
    pub windows: WindowsConfig,
}

/// A config file and the directory its relative paths are resolved against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// File that was read
    pub path: PathBuf,
    /// Parsed contents
    pub config: FileConfig,
}

/// Reads `explicit`, or `<dir>/packager.toml` when it exists.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub async fn load(explicit: Option<&Path>, dir: &Path) -> Result<Option<LoadedConfig>> {
    let path = match explicit {
        Some(path) => {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(CliError::ConfigNotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
            path.to_path_buf()
        }
        None => {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if !tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(None);
            }
            candidate
        }
    };

    let contents = tokio::fs::read_to_string(&path).await?;
    let config = parse(&path, &contents)?;
    log::debug!("Loaded config from {}", path.display());
    Ok(Some(LoadedConfig { path, config }))
}

/// Parses config file contents; `path` is only used in errors.
pub fn parse(path: &Path, contents: &str) -> Result<FileConfig> {
    toml::from_str(contents).map_err(|source| PackagerError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

impl LoadedConfig {
    /// Turns the file into options for the app in `dir`.
    pub fn into_options(self, dir: &Path) -> Result<Options> {
        let base = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let rebase = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };
        let c = self.config;

        let mut options = Options::new(dir);
        options.name = c.name;
        options.platform = c.platform.map(StringList::into_selector);
        options.arch = c.arch.map(StringList::into_selector);
        options.all = c.all;
        options.electron_version = c.electron_version;
        options.app_version = c.app_version;
        options.build_version = c.build_version;
        options.app_copyright = c.app_copyright;
        options.executable_name = c.executable_name;
        options.asar = match c.asar {
            Some(AsarSetting::Enabled(true)) => Some(AsarOptions::default()),
            Some(AsarSetting::Options(asar)) => Some(asar),
            Some(AsarSetting::Enabled(false)) | None => None,
        };
        options.prebuilt_asar = c.prebuilt_asar.map(rebase);
        options.out = c.out.map(rebase);
        options.tmpdir = match c.tmpdir {
            Some(TmpdirSetting::Enabled(false)) => TempDirPolicy::Disabled,
            Some(TmpdirSetting::Path(path)) => TempDirPolicy::Custom(rebase(path)),
            Some(TmpdirSetting::Enabled(true)) | None => TempDirPolicy::System,
        };
        options.overwrite = c.overwrite;
        options.prune = c.prune.unwrap_or(true);
        options.junk = c.junk.unwrap_or(true);
        options.deref_symlinks = c.deref_symlinks.unwrap_or(true);
        if !c.ignore.is_empty() {
            options.ignore = Some(IgnoreRule::patterns(&c.ignore)?);
        }
        options.extra_resource = c.extra_resource.into_iter().map(rebase).collect();
        options.icon = c.icon.map(rebase);
        options.electron_zip_dir = c.electron_zip_dir.map(rebase);
        options.download = DownloadOptions {
            cache_root: c.download.cache_root.map(rebase),
            ..c.download
        };
        options.quiet = c.quiet;

        let mac = c.mac;
        options.mac.app_bundle_id = mac.app_bundle_id;
        options.mac.helper_bundle_id = mac.helper_bundle_id;
        options.mac.app_category_type = mac.app_category_type;
        options.mac.dark_mode_support = mac.dark_mode_support;
        options.mac.extend_info = mac
            .extend_info
            .into_iter()
            .map(|p| PlistSource::File(rebase(p)))
            .collect();
        options.mac.extend_helper_info = mac
            .extend_helper_info
            .into_iter()
            .map(|p| PlistSource::File(rebase(p)))
            .collect();
        options.mac.protocols = mac.protocols;
        options.mac.usage_description = mac.usage_description;
        options.mac.sign = mac.sign.map(|sign| MacSignOptions {
            entitlements: sign.entitlements.map(rebase),
            ..sign
        });
        options.mac.notarize = mac.notarize;
        options.mac.universal = mac.universal;

        let windows = c.windows;
        options.windows.win32_metadata = Win32Metadata {
            application_manifest: windows.win32_metadata.application_manifest.map(rebase),
            ..windows.win32_metadata
        };
        options.windows.sign = windows.sign.map(|sign| WindowsSignOptions {
            cert_path: rebase(sign.cert_path),
            key_path: sign.key_path.map(rebase),
            ..sign
        });
        Ok(options)
    }
}
