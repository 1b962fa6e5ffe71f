//! Packaging orchestration.
//!
//! The [`Packager`] turns [`Options`] into finished bundles:
//!
//! 1. Validates the platform and arch selectors
//! 2. Infers missing metadata from `package.json`
//! 3. Expands the selectors into targets and runs `after_finalize_targets`
//! 4. Builds every target concurrently and collects the produced paths
//!
//! Each target build resolves an Electron zip (local directory or download),
//! extracts it into a template directory and hands it to the platform
//! builder. Universal mac targets build an x64 and an arm64 slice and merge
//! them.
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_electron::bundler::{package, Options, Selector};
//!
//! # async fn example() -> kodegen_bundler_electron::bundler::Result<()> {
//! let mut options = Options::new("./my-app");
//! options.platform = Some(Selector::parse("linux"));
//! options.arch = Some(Selector::parse("x64,arm64"));
//!
//! for path in package(options).await? {
//!     println!("Wrote {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::bundler::collaborators::Collaborators;
use crate::bundler::error::{Error, Result};
use crate::bundler::hooks::run_hooks;
use crate::bundler::platform::macos::{app as mac_app, sign as mac_sign};
use crate::bundler::platform::{Layout, StagedApp, builder_for};
use crate::bundler::settings::{Combo, Options};
use crate::bundler::targets::{
    Arch, Platform, Target, TargetRequest, expand_targets, resolve_archs, resolve_platforms,
};
use crate::bundler::utils::http::DownloadSpec;
use crate::bundler::utils::{archive, fs, naming};
use crate::metadata;
use crate::output::OutputManager;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Why a target produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The final path exists and `overwrite` is off
    OutputExists,
    /// Mac bundles need symlinks and the host cannot create them
    SymlinksUnavailable,
}

/// Result of one target build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// The bundle was written to this path
    Built(PathBuf),
    /// Nothing was written
    Skipped(SkipReason),
}

/// Packages one set of [`Options`] into bundles.
#[derive(Debug)]
pub struct Packager {
    collaborators: Arc<Collaborators>,
    output: OutputManager,
    can_symlink: OnceCell<bool>,
}

impl Packager {
    /// Packager delegating to `collaborators` and reporting to `output`.
    pub fn new(collaborators: Collaborators, output: OutputManager) -> Self {
        Self {
            collaborators: Arc::new(collaborators),
            output,
            can_symlink: OnceCell::new(),
        }
    }

    /// Builds every requested target and returns the paths written.
    ///
    /// Skipped targets are left out; the first error aborts the run.
    pub async fn package(&self, options: Options) -> Result<Vec<PathBuf>> {
        log::debug!("Packager options: {:?}", options);
        log::debug!(
            "Host: {}/{} ({})",
            Platform::host(),
            Arch::host(),
            std::env::consts::OS
        );

        let (platforms, archs) = {
            let request = target_request(&options);
            (resolve_platforms(&request)?, resolve_archs(&request)?)
        };

        let resolved = Arc::new(metadata::infer(options, &platforms).await?);
        if resolved.name.ends_with(" Helper") {
            return Err(Error::ReservedAppName);
        }

        let options = &resolved.options;
        let targets = expand_targets(
            &target_request(options),
            &platforms,
            &archs,
            &resolved.electron_version,
            options.target_filter.as_ref(),
            &self.output,
        );
        log::debug!(
            "Targets: {}",
            targets.iter().map(Target::to_string).collect::<Vec<_>>().join(", ")
        );
        run_hooks(
            "after_finalize_targets",
            &options.hooks.after_finalize_targets,
            targets.clone(),
        )
        .await?;

        let builds = targets
            .into_iter()
            .map(|target| self.package_for_platform(Combo::new(Arc::clone(&resolved), target)));

        let mut paths = Vec::new();
        for outcome in join_all(builds).await {
            if let BuildOutcome::Built(path) = outcome? {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Builds one target.
    pub async fn package_for_platform(&self, combo: Combo) -> Result<BuildOutcome> {
        if combo.target.is_universal_mac() {
            self.build_universal(combo).await
        } else {
            self.build_concrete(combo).await
        }
    }

    async fn build_concrete(&self, combo: Combo) -> Result<BuildOutcome> {
        if let Some(skip) = self.preflight(&combo).await? {
            return Ok(skip);
        }
        let _ = self.output.info(&format!(
            "Packaging app for platform {} {} using electron v{}",
            combo.platform(),
            combo.arch(),
            combo.resolved.electron_version
        ));

        let zip = self.resolve_zip(&combo).await?;
        let template = self.extract(&combo, &zip).await?;
        let layout = if combo.platform().is_mac_family() {
            mac_app::layout(combo.name())
        } else {
            Layout::flat()
        };

        let staged = StagedApp::new(combo, template, layout, self.output.clone());
        let builder = builder_for(staged, Arc::clone(&self.collaborators));
        Ok(BuildOutcome::Built(builder.create().await?))
    }

    async fn build_universal(&self, combo: Combo) -> Result<BuildOutcome> {
        if let Some(skip) = self.preflight(&combo).await? {
            return Ok(skip);
        }
        let base = combo
            .options()
            .tmpdir
            .base_dir()
            .unwrap_or_else(|| combo.resolved.out.clone());
        let slices_out = naming::unique_dir(&base, "universal-").await?;

        let merged = self.merge_slices(&combo, &slices_out).await;
        if let Err(err) = fs::remove_path(&slices_out).await {
            log::debug!("Could not remove {}: {}", slices_out.display(), err);
        }
        merged?;

        run_hooks(
            "after_complete",
            &combo.options().hooks.after_complete,
            combo.hook_args(&combo.final_path),
        )
        .await?;
        Ok(BuildOutcome::Built(combo.final_path))
    }

    /// Builds both slices into `slices_out` and merges them at the final path.
    async fn merge_slices(&self, combo: &Combo, slices_out: &Path) -> Result<()> {
        let slice = |arch: Arch| {
            let mut slice = Combo::new(
                Arc::clone(&combo.resolved),
                Target::new(combo.platform().clone(), arch),
            )
            .with_out_dir(slices_out);
            slice.codesign = false;
            slice
        };
        let (x64, arm64) = tokio::join!(
            self.build_concrete(slice(Arch::X64)),
            self.build_concrete(slice(Arch::Arm64))
        );
        let x64_dir = built_slice(x64?, &Arch::X64)?;
        let arm64_dir = built_slice(arm64?, &Arch::Arm64)?;

        let staging = match combo.options().tmpdir.base_dir() {
            Some(base) => {
                naming::unique_dir(
                    &base.join(format!("{}-{}", combo.platform(), combo.arch())),
                    &format!("{}-", file_name(&combo.final_path)),
                )
                .await?
            }
            None => combo.final_path.clone(),
        };

        let assembled = self
            .assemble_universal(combo, &x64_dir, &arm64_dir, &staging)
            .await;
        if assembled.is_err()
            && let Err(err) = fs::remove_path(&staging).await
        {
            log::debug!("Could not remove {}: {}", staging.display(), err);
        }
        assembled?;

        if staging != combo.final_path {
            fs::move_path(&staging, &combo.final_path).await?;
        }
        Ok(())
    }

    async fn assemble_universal(
        &self,
        combo: &Combo,
        x64_dir: &Path,
        arm64_dir: &Path,
        staging: &Path,
    ) -> Result<()> {
        let app_name = format!("{}.app", naming::sanitize_app_name(combo.name()));
        let universal_app = staging.join(&app_name);

        self.collaborators
            .universal_merger
            .merge(
                &x64_dir.join(&app_name),
                &arm64_dir.join(&app_name),
                &universal_app,
                &combo.options().mac.universal,
            )
            .await?;
        let report = mac_sign::sign_and_notarize(
            self.collaborators.mac_signer.as_ref(),
            &universal_app,
            combo,
            &self.output,
        )
        .await?;
        log::debug!("Universal signing: {:?}", report);

        for entry in fs::read_dir_sorted(x64_dir).await? {
            let name = file_name(&entry);
            if name != app_name {
                fs::copy_path(&entry, &staging.join(name)).await?;
            }
        }
        Ok(())
    }

    /// Symlink and overwrite checks shared by every build.
    async fn preflight(&self, combo: &Combo) -> Result<Option<BuildOutcome>> {
        if let Some(base) = combo.options().tmpdir.base_dir()
            && combo.platform().is_mac_family()
            && !self.can_symlink(&base).await
        {
            let _ = self.output.info(&format!(
                "Cannot create symlinks (on Windows hosts, it requires admin privileges); \
                 skipping {} platform",
                combo.platform()
            ));
            return Ok(Some(BuildOutcome::Skipped(SkipReason::SymlinksUnavailable)));
        }
        self.check_overwrite(combo).await
    }

    /// Removes an existing final path, or skips the target without `overwrite`.
    async fn check_overwrite(&self, combo: &Combo) -> Result<Option<BuildOutcome>> {
        let final_path = &combo.final_path;
        if !fs::path_exists(final_path).await {
            return Ok(None);
        }
        if combo.options().overwrite {
            log::debug!("Removing {} due to overwrite", final_path.display());
            fs::remove_path(final_path).await?;
            return Ok(None);
        }
        let _ = self.output.info(&format!(
            "Skipping {} {} (output dir already exists, use --overwrite to force)",
            combo.platform(),
            combo.arch()
        ));
        Ok(Some(BuildOutcome::Skipped(SkipReason::OutputExists)))
    }

    async fn can_symlink(&self, base: &Path) -> bool {
        *self
            .can_symlink
            .get_or_init(|| async {
                let supported = self.collaborators.symlink_probe.can_symlink(base).await;
                log::debug!("Symlink support: {}", supported);
                supported
            })
            .await
    }

    /// Local zip from `electron_zip_dir`, or a download.
    async fn resolve_zip(&self, combo: &Combo) -> Result<PathBuf> {
        let spec = DownloadSpec::electron(
            combo.platform().clone(),
            combo.arch().clone(),
            combo.resolved.electron_version.clone(),
        );
        let options = combo.options();

        if let Some(zip_dir) = &options.electron_zip_dir {
            let zip_dir = combo.resolved.cwd.join(zip_dir);
            if fs::path_exists(&zip_dir).await {
                let zip = zip_dir.join(spec.file_name());
                if !fs::path_exists(&zip).await {
                    return Err(Error::ZipNotFound(zip));
                }
                let _ = self
                    .output
                    .verbose(&format!("Using local Electron zip {}", zip.display()));
                return Ok(zip);
            }
            log::debug!(
                "electron_zip_dir {} does not exist, downloading instead",
                zip_dir.display()
            );
        }

        let _ = self
            .output
            .verbose(&format!("Fetching {}", spec.file_name()));
        self.collaborators
            .downloader
            .download(&spec, &options.download)
            .await
    }

    /// Extracts `zip` into a fresh template directory and runs `after_extract`.
    async fn extract(&self, combo: &Combo, zip: &Path) -> Result<PathBuf> {
        let parent = combo
            .options()
            .tmpdir
            .base_dir()
            .unwrap_or_else(|| combo.resolved.out.clone());
        let build_dir = naming::unique_dir(
            &parent,
            &format!("{}-{}-template-", combo.platform(), combo.arch()),
        )
        .await?;

        log::debug!("Extracting {} to {}", zip.display(), build_dir.display());
        archive::extract_zip(zip, &build_dir).await?;

        run_hooks(
            "after_extract",
            &combo.options().hooks.after_extract,
            combo.hook_args(&build_dir),
        )
        .await?;
        Ok(build_dir)
    }
}

fn target_request(options: &Options) -> TargetRequest<'_> {
    TargetRequest {
        platform: options.platform.as_ref(),
        arch: options.arch.as_ref(),
        all: options.all,
        official: !options.uses_mirror(),
    }
}

fn built_slice(outcome: BuildOutcome, arch: &Arch) -> Result<PathBuf> {
    match outcome {
        BuildOutcome::Built(path) => Ok(path),
        BuildOutcome::Skipped(reason) => Err(Error::Universal(format!(
            "the {arch} slice was skipped ({reason:?})"
        ))),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Packages `options` with the default collaborators.
pub async fn package(options: Options) -> Result<Vec<PathBuf>> {
    let output = OutputManager::new(false, options.quiet);
    package_with(options, Collaborators::default(), output).await
}

/// Packages `options` with explicit collaborators and output.
pub async fn package_with(
    options: Options,
    collaborators: Collaborators,
    output: OutputManager,
) -> Result<Vec<PathBuf>> {
    Packager::new(collaborators, output).package(options).await
}
