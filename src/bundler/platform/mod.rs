//! Platform bundle builders.
//!
//! Every platform runs the same lifecycle: [`StagedApp::initialize`], the
//! platform's own steps, then [`StagedApp::move_to_final`]. The variants
//! differ only in their steps:
//!
//! | Platform | Builder | Platform steps |
//! |----------|---------|----------------|
//! | `linux` (and unofficial platforms) | [`linux::LinuxApp`] | rename executable, extra resources |
//! | `darwin`, `mas` | [`macos::MacApp`] | Info.plist rewrite, icon, helper renames, signing, notarization |
//! | `win32` | [`windows::WindowsApp`] | rename executable, extra resources, resource editing, signing |

pub mod linux;
pub mod macos;
pub mod windows;

use crate::bundler::asar::{self, AsarIntegrity};
use crate::bundler::collaborators::Collaborators;
use crate::bundler::copy_filter::{CopyFilter, ignored_out_dirs};
use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::hooks::run_hooks;
use crate::bundler::settings::Combo;
use crate::bundler::targets::Platform;
use crate::bundler::utils::{fs, naming};
use crate::output::OutputManager;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Shared lifecycle of every platform builder.
#[async_trait]
pub trait PlatformBundle: Send + Sync {
    /// The staged app this builder works on.
    fn staged(&self) -> &StagedApp;

    /// Steps between initialization and the final move.
    async fn platform_steps(&self, integrity: Option<AsarIntegrity>) -> Result<()>;

    /// Builds the bundle and returns its final path.
    ///
    /// A failure before the final move removes the template and staging
    /// directories.
    async fn create(&self) -> Result<PathBuf> {
        let built = async {
            let integrity = self.staged().initialize().await?;
            self.platform_steps(integrity).await
        }
        .await;
        if let Err(err) = built {
            self.staged().discard().await;
            return Err(err);
        }
        self.staged().move_to_final().await
    }
}

/// Picks the builder for the combo's platform.
pub fn builder_for(
    staged: StagedApp,
    collaborators: Arc<Collaborators>,
) -> Box<dyn PlatformBundle> {
    match staged.combo.platform() {
        Platform::Darwin | Platform::Mas => Box::new(macos::MacApp::new(staged, collaborators)),
        Platform::Win32 => Box::new(windows::WindowsApp::new(staged, collaborators)),
        Platform::Linux | Platform::Other(_) => Box::new(linux::LinuxApp::new(staged)),
    }
}

/// Where things live inside an extracted Electron template, relative to
/// the staging root.
#[derive(Debug, Clone)]
pub struct Layout {
    /// Resources directory as extracted
    pub original_resources: PathBuf,
    /// Resources directory once the platform steps renamed the bundle
    pub renamed_resources: PathBuf,
    /// Directory integrity keys are relative to
    pub integrity_root: PathBuf,
}

impl Layout {
    /// Layout of the flat `resources/` templates shipped for linux and win32.
    pub fn flat() -> Self {
        Self {
            original_resources: PathBuf::from("resources"),
            renamed_resources: PathBuf::from("resources"),
            integrity_root: PathBuf::new(),
        }
    }
}

/// An icon found next to the configured icon path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// Already in the platform's format
    Native(PathBuf),
    /// A PNG that still has to be converted
    Png(PathBuf),
}

#[derive(Debug, Default, Deserialize)]
struct AppManifest {
    main: Option<String>,
}

/// An extracted template being turned into one target's bundle.
pub struct StagedApp {
    /// The target being built
    pub combo: Combo,
    /// Diagnostics sink
    pub output: OutputManager,
    template: PathBuf,
    layout: Layout,
    staging: OnceCell<PathBuf>,
}

impl StagedApp {
    /// Wraps the template extracted to `template`.
    pub fn new(combo: Combo, template: PathBuf, layout: Layout, output: OutputManager) -> Self {
        Self {
            combo,
            output,
            template,
            layout,
            staging: OnceCell::new(),
        }
    }

    /// Staging directory, created on first use.
    ///
    /// With staging disabled this is the final path itself.
    pub async fn staging_path(&self) -> Result<&Path> {
        let path = self
            .staging
            .get_or_try_init(|| async {
                match self.combo.options().tmpdir.base_dir() {
                    Some(base) => {
                        let parent = base.join(format!(
                            "{}-{}",
                            self.combo.platform(),
                            self.combo.arch()
                        ));
                        let prefix = format!(
                            "{}-",
                            self.combo
                                .final_path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default()
                        );
                        naming::unique_dir(&parent, &prefix).await
                    }
                    None => Ok(self.combo.final_path.clone()),
                }
            })
            .await?;
        Ok(path.as_path())
    }

    /// Original resources directory inside the staging path.
    pub async fn resources_dir(&self) -> Result<PathBuf> {
        Ok(self.staging_path().await?.join(&self.layout.original_resources))
    }

    /// Resources directory after the bundle was renamed.
    pub async fn renamed_resources_dir(&self) -> Result<PathBuf> {
        Ok(self.staging_path().await?.join(&self.layout.renamed_resources))
    }

    /// `resources/app` inside the staging path.
    pub async fn app_dir(&self) -> Result<PathBuf> {
        Ok(self.resources_dir().await?.join("app"))
    }

    /// Moves the template into staging and installs the app.
    ///
    /// Returns the asar integrity record when an archive was installed.
    pub async fn initialize(&self) -> Result<Option<AsarIntegrity>> {
        let staging = self.staging_path().await?.to_path_buf();
        log::debug!(
            "Initializing {} from template {}",
            staging.display(),
            self.template.display()
        );
        fs::move_path(&self.template, &staging).await?;

        let resources = self.resources_dir().await?;
        fs::remove_path(&resources.join("default_app")).await?;
        fs::remove_path(&resources.join("default_app.asar")).await?;

        let integrity = match &self.combo.options().prebuilt_asar {
            Some(prebuilt) => Some(self.copy_prebuilt_asar(prebuilt).await?),
            None => self.build_app().await?,
        };

        let hooks = &self.combo.options().hooks;
        run_hooks(
            "after_initialize",
            &hooks.after_initialize,
            self.combo.hook_args(&staging),
        )
        .await?;
        Ok(integrity)
    }

    async fn copy_prebuilt_asar(&self, prebuilt: &Path) -> Result<AsarIntegrity> {
        let options = self.combo.options();
        if options.asar.is_some() {
            let _ = self
                .output
                .warn("prebuilt_asar has been specified, all asar options will be ignored");
        }
        let hooks = &options.hooks;
        for (slot, registered) in [
            ("before_copy", &hooks.before_copy),
            ("after_copy", &hooks.after_copy),
            ("before_prune", &hooks.before_prune),
            ("after_prune", &hooks.after_prune),
        ] {
            if !registered.is_empty() {
                return Err(Error::IncompatibleHook { hook: slot });
            }
        }

        let source = self.combo.resolved.cwd.join(prebuilt);
        let meta = tokio::fs::metadata(&source)
            .await
            .fs_context("reading prebuilt asar", &source)?;
        if !meta.is_file() {
            return Err(Error::PrebuiltAsarNotFile(source));
        }

        let dest = self.resources_dir().await?.join("app.asar");
        log::debug!("Copying prebuilt asar {} to {}", source.display(), dest.display());
        fs::copy_file(&source, &dest).await?;
        self.integrity_for(&dest).await
    }

    async fn build_app(&self) -> Result<Option<AsarIntegrity>> {
        let options = self.combo.options();
        let resolved = &self.combo.resolved;
        let hooks = &options.hooks;
        let app_dir = self.app_dir().await?;
        let args = self.combo.hook_args(&app_dir);

        run_hooks("before_copy", &hooks.before_copy, args.clone()).await?;
        if options.prune {
            run_hooks("before_prune", &hooks.before_prune, args.clone()).await?;
        }

        let out_dirs = ignored_out_dirs(
            &resolved.name,
            options.out.as_ref().map(|_| resolved.out.as_path()),
            &resolved.cwd,
        );
        let filter = CopyFilter::new(
            &resolved.dir,
            out_dirs,
            options.junk,
            options.ignore.as_ref(),
            options.prune,
            &self.output,
        )?;
        filter.copy_tree(&app_dir, options.deref_symlinks).await?;

        run_hooks("after_copy", &hooks.after_copy, args.clone()).await?;
        if options.prune {
            run_hooks("after_prune", &hooks.after_prune, args.clone()).await?;
        }

        self.validate_app(&app_dir).await?;

        let Some(asar_options) = &options.asar else {
            return Ok(None);
        };
        run_hooks("before_asar", &hooks.before_asar, args.clone()).await?;
        let archive = self.resources_dir().await?.join("app.asar");
        asar::create_package(&app_dir, &archive, asar_options).await?;
        let integrity = self.integrity_for(&archive).await?;
        fs::remove_path(&app_dir).await?;
        run_hooks("after_asar", &hooks.after_asar, args).await?;
        Ok(Some(integrity))
    }

    /// Checks the copied app has a manifest and an entry point. Errors name
    /// the paths in the source directory.
    async fn validate_app(&self, app_dir: &Path) -> Result<()> {
        let source_dir = &self.combo.resolved.dir;
        let manifest_path = app_dir.join("package.json");
        if !fs::path_exists(&manifest_path).await {
            return Err(Error::ManifestNotFound(source_dir.join("package.json")));
        }

        let contents = tokio::fs::read_to_string(&manifest_path)
            .await
            .fs_context("reading package manifest", &manifest_path)?;
        let manifest: AppManifest = serde_json::from_str(&contents)?;
        let main = manifest.main.unwrap_or_else(|| "index.js".to_string());

        let candidates = [
            app_dir.join(&main),
            app_dir.join(format!("{main}.js")),
            app_dir.join(&main).join("index.js"),
        ];
        for candidate in &candidates {
            if tokio::fs::metadata(candidate)
                .await
                .is_ok_and(|meta| meta.is_file())
            {
                return Ok(());
            }
        }
        Err(Error::EntryPointNotFound(source_dir.join(&main)))
    }

    async fn integrity_for(&self, archive: &Path) -> Result<AsarIntegrity> {
        let root = self.staging_path().await?.join(&self.layout.integrity_root);
        let key = archive
            .strip_prefix(&root)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        asar::integrity(archive, &key).await
    }

    /// Copies every `extra_resource` into the renamed resources directory.
    pub async fn copy_extra_resources(&self) -> Result<()> {
        let resources = self.renamed_resources_dir().await?;
        for resource in &self.combo.options().extra_resource {
            let source = self.combo.resolved.cwd.join(resource);
            let Some(file_name) = source.file_name() else {
                continue;
            };
            log::debug!("Copying extra resource {}", source.display());
            fs::copy_path(&source, &resources.join(file_name)).await?;
        }

        let staging = self.staging_path().await?;
        run_hooks(
            "after_copy_extra_resources",
            &self.combo.options().hooks.after_copy_extra_resources,
            self.combo.hook_args(staging),
        )
        .await
    }

    /// Renames `from` to `to`, both relative to the staging path.
    pub async fn relative_rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> Result<()> {
        let staging = self.staging_path().await?;
        let from = staging.join(from);
        let to = staging.join(to);
        log::debug!("Renaming {} to {}", from.display(), to.display());
        tokio::fs::rename(&from, &to).await.fs_context("renaming", &from)
    }

    /// Moves staging to the final path and runs `after_complete`.
    pub async fn move_to_final(&self) -> Result<PathBuf> {
        let staging = self.staging_path().await?;
        let final_path = &self.combo.final_path;
        if staging != final_path {
            log::debug!("Moving {} to {}", staging.display(), final_path.display());
            fs::move_path(staging, final_path).await?;
        }
        run_hooks(
            "after_complete",
            &self.combo.options().hooks.after_complete,
            self.combo.hook_args(final_path),
        )
        .await?;
        Ok(final_path.clone())
    }

    /// Removes the template and, once created, the staging directory.
    pub async fn discard(&self) {
        let staging = self.staging.get().map(PathBuf::as_path);
        for path in std::iter::once(self.template.as_path()).chain(staging) {
            if let Err(err) = fs::remove_path(path).await {
                log::debug!("Could not remove {}: {}", path.display(), err);
            }
        }
    }

    /// Finds `<icon>.<extension>`, falling back to `<icon>.png`.
    ///
    /// Returns `None` with a warning when neither exists.
    pub async fn normalize_icon(&self, extension: &str) -> Option<IconSource> {
        let icon = self.combo.options().icon.as_ref()?;
        let icon = self.combo.resolved.cwd.join(icon);

        let native = icon.with_extension(extension);
        if fs::path_exists(&native).await {
            return Some(IconSource::Native(native));
        }
        let png = icon.with_extension("png");
        if fs::path_exists(&png).await {
            return Some(IconSource::Png(png));
        }
        let _ = self.output.warn(&format!(
            "Could not find icon \"{}\", not updating app icon",
            icon.display()
        ));
        None
    }
}
