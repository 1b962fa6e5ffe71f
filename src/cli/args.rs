//! Command line argument parsing.
//!
//! Flags mirror [`Options`]; anything richer (signing, plist extensions,
//! protocols, Windows metadata) lives in the config file. Flags win over
//! file values.

use crate::bundler::asar::AsarOptions;
use crate::bundler::{IgnoreRule, Options, Result, Selector, TempDirPolicy};
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

/// Package an Electron app into per-platform bundles
#[derive(Parser, Debug, Default)]
#[command(
    name = "kodegen_bundler_electron",
    version,
    about = "Package an Electron app into per-platform bundles",
    long_about = "Package an Electron app into per-platform, per-architecture bundles.

Usage:
  kodegen_bundler_electron <sourcedir> [appname] --platform=<platform> --arch=<arch>
  kodegen_bundler_electron ./my-app --all --out dist
  kodegen_bundler_electron ./my-app \"My App\" --platform darwin --arch universal --asar

Paths of the written bundles are printed to stdout, one per line."
)]
pub struct Args {
    /// App source directory containing package.json
    #[arg(index = 1, value_name = "SOURCEDIR")]
    pub dir: PathBuf,

    /// App name (default: productName or name from package.json)
    #[arg(index = 2, value_name = "APPNAME")]
    pub name: Option<String>,

    /// Platforms to build: darwin, linux, mas, win32 or all (comma separated)
    #[arg(long)]
    pub platform: Option<String>,

    /// Architectures to build: ia32, x64, armv7l, arm64, mips64el, universal or all
    #[arg(long)]
    pub arch: Option<String>,

    /// Build every official platform and architecture
    #[arg(long)]
    pub all: bool,

    /// Electron version (default: the installed electron package)
    #[arg(long, value_name = "VERSION")]
    pub electron_version: Option<String>,

    /// Output directory (default: current directory)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Replace existing output directories
    #[arg(long)]
    pub overwrite: bool,

    /// Keep devDependencies in the packaged node_modules
    #[arg(long)]
    pub no_prune: bool,

    /// Pack the app into an asar archive
    #[arg(long)]
    pub asar: bool,

    /// Glob of files left outside the asar archive (implies --asar)
    #[arg(long, value_name = "GLOB")]
    pub asar_unpack: Option<String>,

    /// Glob of directories left outside the asar archive (implies --asar)
    #[arg(long, value_name = "GLOB")]
    pub asar_unpack_dir: Option<String>,

    /// Ship this asar archive instead of copying the source directory
    #[arg(long, value_name = "FILE")]
    pub prebuilt_asar: Option<PathBuf>,

    /// Staging directory base (default: system temp)
    #[arg(long, conflicts_with = "no_tmpdir")]
    pub tmpdir: Option<PathBuf>,

    /// Build directly in the output directory
    #[arg(long)]
    pub no_tmpdir: bool,

    /// Icon path; the extension is replaced per platform (.icns, .ico)
    #[arg(long)]
    pub icon: Option<PathBuf>,

    /// File or directory copied into the bundle's resources (repeatable)
    #[arg(long, value_name = "PATH")]
    pub extra_resource: Vec<PathBuf>,

    /// App version (default: version from package.json)
    #[arg(long)]
    pub app_version: Option<String>,

    /// Build version (default: app version)
    #[arg(long)]
    pub build_version: Option<String>,

    /// Human-readable copyright line
    #[arg(long)]
    pub app_copyright: Option<String>,

    /// macOS CFBundleIdentifier
    #[arg(long)]
    pub app_bundle_id: Option<String>,

    /// macOS helper CFBundleIdentifier
    #[arg(long)]
    pub helper_bundle_id: Option<String>,

    /// macOS LSApplicationCategoryType
    #[arg(long)]
    pub app_category_type: Option<String>,

    /// Executable name without extension (default: app name)
    #[arg(long)]
    pub executable_name: Option<String>,

    /// Directory with pre-downloaded Electron release zips
    #[arg(long, value_name = "DIR")]
    pub electron_zip_dir: Option<PathBuf>,

    /// Base URL for Electron downloads; lifts the official target restriction
    #[arg(long, value_name = "URL")]
    pub download_mirror: Option<String>,

    /// Regular expression of source paths to leave out (repeatable)
    #[arg(long, value_name = "REGEX")]
    pub ignore: Vec<String>,

    /// Copy junk files such as .DS_Store and Thumbs.db
    #[arg(long)]
    pub no_junk: bool,

    /// Copy symlinks as links instead of their targets
    #[arg(long)]
    pub no_deref_symlinks: bool,

    /// Show extra detail such as where each Electron zip came from
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Suppress informational and warning output
    #[arg(long, short = 'q', env = "ELECTRON_BUNDLER_QUIET")]
    pub quiet: bool,

    /// TOML config file (default: packager.toml in the source directory)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies every flag that was given on top of `options`.
    ///
    /// `--ignore` patterns are appended to pattern rules from the config
    /// file and fail here if they are not valid regular expressions.
    pub fn apply(&self, mut options: Options) -> Result<Options> {
        options.dir = self.dir.clone();
        if let Some(name) = &self.name {
            options.name = Some(name.clone());
        }
        if let Some(platform) = &self.platform {
            options.platform = Some(Selector::parse(platform));
        }
        if let Some(arch) = &self.arch {
            options.arch = Some(Selector::parse(arch));
        }
        options.all |= self.all;
        set(&mut options.electron_version, &self.electron_version);
        set(&mut options.out, &self.out);
        options.overwrite |= self.overwrite;
        if self.no_prune {
            options.prune = false;
        }

        if self.asar || self.asar_unpack.is_some() || self.asar_unpack_dir.is_some() {
            let asar = options.asar.get_or_insert_with(AsarOptions::default);
            set(&mut asar.unpack, &self.asar_unpack);
            set(&mut asar.unpack_dir, &self.asar_unpack_dir);
        }
        set(&mut options.prebuilt_asar, &self.prebuilt_asar);

        if self.no_tmpdir {
            options.tmpdir = TempDirPolicy::Disabled;
        } else if let Some(tmpdir) = &self.tmpdir {
            options.tmpdir = TempDirPolicy::Custom(tmpdir.clone());
        }

        set(&mut options.icon, &self.icon);
        options.extra_resource.extend(self.extra_resource.iter().cloned());
        set(&mut options.app_version, &self.app_version);
        set(&mut options.build_version, &self.build_version);
        set(&mut options.app_copyright, &self.app_copyright);
        set(&mut options.mac.app_bundle_id, &self.app_bundle_id);
        set(&mut options.mac.helper_bundle_id, &self.helper_bundle_id);
        set(&mut options.mac.app_category_type, &self.app_category_type);
        set(&mut options.executable_name, &self.executable_name);
        set(&mut options.electron_zip_dir, &self.electron_zip_dir);
        set(&mut options.download.mirror, &self.download_mirror);

        if !self.ignore.is_empty() {
            let flags = self
                .ignore
                .iter()
                .map(|p| Regex::new(p))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let patterns = match options.ignore.take() {
                Some(IgnoreRule::Patterns(mut existing)) => {
                    existing.extend(flags);
                    existing
                }
                _ => flags,
            };
            options.ignore = Some(IgnoreRule::Patterns(patterns));
        }
        if self.no_junk {
            options.junk = false;
        }
        if self.no_deref_symlinks {
            options.deref_symlinks = false;
        }
        options.quiet |= self.quiet;
        Ok(options)
    }
}

fn set<T: Clone>(target: &mut Option<T>, flag: &Option<T>) {
    if let Some(value) = flag {
        *target = Some(value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn flags_override_file_values() {
        let args = parse(&[
            "kodegen_bundler_electron",
            "./app",
            "Shiny",
            "--platform",
            "linux,win32",
            "--no-prune",
            "--asar-unpack",
            "*.node",
            "--ignore",
            "^/docs",
        ]);
        let mut from_file = Options::new(".");
        from_file.name = Some("From File".into());
        from_file.app_version = Some("1.0.0".into());

        let options = args.apply(from_file).unwrap();
        assert_eq!(options.dir, PathBuf::from("./app"));
        assert_eq!(options.name.as_deref(), Some("Shiny"));
        assert_eq!(options.app_version.as_deref(), Some("1.0.0"));
        assert!(!options.prune);
        assert_eq!(
            options.asar.and_then(|a| a.unpack).as_deref(),
            Some("*.node")
        );
        assert!(matches!(
            options.ignore,
            Some(IgnoreRule::Patterns(p)) if p.len() == 1 && p[0].as_str() == "^/docs"
        ));
    }

    #[test]
    fn invalid_ignore_pattern_is_rejected() {
        let args = parse(&["x", "./app", "--ignore", "("]);
        assert!(args.apply(Options::new(".")).is_err());
    }

    #[test]
    fn tmpdir_flags_conflict() {
        assert!(
            Args::try_parse_from(["x", "./app", "--tmpdir", "/tmp/a", "--no-tmpdir"]).is_err()
        );
        let options = parse(&["x", "./app", "--no-tmpdir"])
            .apply(Options::new("."))
            .unwrap();
        assert_eq!(options.tmpdir, TempDirPolicy::Disabled);
    }
}
