//! macOS application bundle (.app) assembly.
//!
//! Rewrites the Info.plist of the app and of every helper the template
//! ships, installs the icon, renames the executables, helpers and the
//! bundle itself, then signs and notarizes.

use crate::bundler::asar::AsarIntegrity;
use crate::bundler::collaborators::Collaborators;
use crate::bundler::error::{Context, Error, Result};
use crate::bundler::platform::{IconSource, Layout, PlatformBundle, StagedApp};
use crate::bundler::utils::{fs, naming};
use async_trait::async_trait;
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{icon, sign};

/// Bundle name inside the extracted template.
pub const TEMPLATE_APP: &str = "Electron.app";

const DEFAULT_ICON_FILE: &str = "electron.icns";

const LOGIN_HELPER: &str = "Electron Login Helper";
const LOGIN_ITEMS: &str = "Contents/Library/LoginItems";

/// A helper app inside `Contents/Frameworks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperKind {
    /// Appended to `Electron Helper` in the bundle and executable names
    pub suffix: &'static str,
    /// Appended to the helper identifier, if any
    pub id_suffix: Option<&'static str>,
}

/// Helpers probed in every template; missing ones are skipped.
pub const HELPERS: &[HelperKind] = &[
    HelperKind { suffix: "", id_suffix: None },
    HelperKind { suffix: " (Renderer)", id_suffix: None },
    HelperKind { suffix: " (Plugin)", id_suffix: None },
    HelperKind { suffix: " (GPU)", id_suffix: None },
    HelperKind { suffix: " EH", id_suffix: Some("EH") },
    HelperKind { suffix: " NP", id_suffix: Some("NP") },
];

impl HelperKind {
    /// `Electron Helper<suffix>`
    pub fn template_name(&self) -> String {
        format!("Electron Helper{}", self.suffix)
    }

    /// `<name> Helper<suffix>`
    pub fn app_name(&self, name: &str) -> String {
        format!("{name} Helper{}", self.suffix)
    }

    /// Helper identifier with the suffix applied.
    pub fn identifier(&self, helper_id: &str) -> String {
        match self.id_suffix {
            Some(suffix) => format!("{helper_id}.{suffix}"),
            None => helper_id.to_string(),
        }
    }
}

/// Layout of a mac-family template for an app called `name`.
pub fn layout(name: &str) -> Layout {
    Layout {
        original_resources: Path::new(TEMPLATE_APP).join("Contents/Resources"),
        renamed_resources: PathBuf::from(format!("{}.app", naming::sanitize_app_name(name)))
            .join("Contents/Resources"),
        integrity_root: Path::new(TEMPLATE_APP).join("Contents"),
    }
}

async fn read_plist(path: &Path) -> Result<Dictionary> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<Dictionary> {
        Value::from_file(&path)
            .map_err(Error::from)
            .with_context(|| format!("reading {}", path.display()))?
            .into_dictionary()
            .with_context(|| format!("{} does not contain a dictionary", path.display()))
    })
    .await?
}

async fn write_plist(path: &Path, dict: Dictionary) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        Value::Dictionary(dict).to_file_xml(&path)?;
        Ok(())
    })
    .await?
}

fn integrity_value(record: &AsarIntegrity) -> Value {
    let mut dict = Dictionary::new();
    for (archive, entry) in record {
        let mut value = Dictionary::new();
        value.insert("algorithm".into(), entry.algorithm.clone().into());
        value.insert("hash".into(), entry.hash.clone().into());
        dict.insert(archive.clone(), Value::Dictionary(value));
    }
    Value::Dictionary(dict)
}

fn merge_into(target: &mut Dictionary, extra: Dictionary) {
    for (key, value) in extra {
        target.insert(key, value);
    }
}

/// Builds `darwin` and `mas` targets.
pub struct MacApp {
    staged: StagedApp,
    collaborators: Arc<Collaborators>,
}

impl MacApp {
    /// Builder for a staged mac-family template.
    pub fn new(staged: StagedApp, collaborators: Arc<Collaborators>) -> Self {
        Self {
            staged,
            collaborators,
        }
    }

    /// `CFBundleIdentifier` of the app.
    pub fn app_bundle_id(&self) -> String {
        let combo = &self.staged.combo;
        let id = combo.options().mac.app_bundle_id.clone().unwrap_or_else(|| {
            format!(
                "com.electron.{}",
                naming::sanitize_app_name(combo.name()).to_lowercase()
            )
        });
        naming::filter_cf_bundle_identifier(&id)
    }

    /// Base `CFBundleIdentifier` of the helpers.
    pub fn helper_bundle_id(&self) -> String {
        let id = self
            .staged
            .combo
            .options()
            .mac
            .helper_bundle_id
            .clone()
            .unwrap_or_else(|| format!("{}.helper", self.app_bundle_id()));
        naming::filter_cf_bundle_identifier(&id)
    }

    fn sanitized_name(&self) -> String {
        naming::sanitize_app_name(self.staged.combo.name())
    }

    async fn contents(&self) -> Result<PathBuf> {
        Ok(self.staged.staging_path().await?.join(TEMPLATE_APP).join("Contents"))
    }

    /// Helpers present in the template with their Info.plist paths.
    async fn present_helpers(&self) -> Result<Vec<(HelperKind, PathBuf)>> {
        let frameworks = self.contents().await?.join("Frameworks");
        let mut present = Vec::new();
        for helper in HELPERS {
            let plist = frameworks
                .join(format!("{}.app", helper.template_name()))
                .join("Contents/Info.plist");
            if fs::path_exists(&plist).await {
                present.push((*helper, plist));
            }
        }
        Ok(present)
    }

    async fn login_helper_plist(&self) -> Result<Option<PathBuf>> {
        let plist = self
            .staged
            .staging_path()
            .await?
            .join(TEMPLATE_APP)
            .join(LOGIN_ITEMS)
            .join(format!("{LOGIN_HELPER}.app/Contents/Info.plist"));
        Ok(fs::path_exists(&plist).await.then_some(plist))
    }

    /// `<name> Login Helper`, sanitized.
    fn login_helper_name(&self) -> String {
        naming::sanitize_app_name(&format!("{} Login Helper", self.staged.combo.name()))
    }

    async fn load_all(sources: &[crate::bundler::settings::PlistSource]) -> Result<Dictionary> {
        let mut merged = Dictionary::new();
        for source in sources {
            merge_into(&mut merged, source.load().await?);
        }
        Ok(merged)
    }

    /// Keys shared by the app and every helper.
    fn apply_common_keys(&self, plist: &mut Dictionary) {
        let combo = &self.staged.combo;
        let mac = &combo.options().mac;

        if let Some(version) = &combo.resolved.app_version {
            plist.insert("CFBundleShortVersionString".into(), version.clone().into());
            plist.insert("CFBundleVersion".into(), version.clone().into());
        }
        if let Some(build) = &combo.options().build_version {
            plist.insert("CFBundleVersion".into(), build.clone().into());
        }
        for (kind, description) in &mac.usage_description {
            plist.insert(format!("NS{kind}UsageDescription"), description.clone().into());
        }
    }

    /// Rewrites the app plist in memory.
    pub fn apply_app_keys(
        &self,
        plist: &mut Dictionary,
        icon_file: Option<&str>,
        integrity: Option<&AsarIntegrity>,
    ) {
        let combo = &self.staged.combo;
        let options = combo.options();
        let mac = &options.mac;
        let executable = combo.executable_name();

        plist.insert("CFBundleDisplayName".into(), executable.into());
        plist.insert(
            "CFBundleExecutable".into(),
            naming::sanitize_app_name(executable).into(),
        );
        plist.insert("CFBundleIdentifier".into(), self.app_bundle_id().into());
        plist.insert("CFBundleName".into(), self.sanitized_name().into());
        self.apply_common_keys(plist);

        if let Some(copyright) = &options.app_copyright {
            plist.insert("NSHumanReadableCopyright".into(), copyright.clone().into());
        }
        if let Some(category) = &mac.app_category_type {
            plist.insert("LSApplicationCategoryType".into(), category.clone().into());
        }
        if let Some(dark_mode) = mac.dark_mode_support {
            plist.insert("NSRequiresAquaSystemAppearance".into(), (!dark_mode).into());
        }
        if !mac.protocols.is_empty() {
            let url_types = mac
                .protocols
                .iter()
                .map(|protocol| {
                    let mut entry = Dictionary::new();
                    entry.insert("CFBundleURLName".into(), protocol.name.clone().into());
                    entry.insert(
                        "CFBundleURLSchemes".into(),
                        Value::Array(protocol.schemes.iter().cloned().map(Value::from).collect()),
                    );
                    Value::Dictionary(entry)
                })
                .collect();
            plist.insert("CFBundleURLTypes".into(), Value::Array(url_types));
        }
        if let Some(icon_file) = icon_file {
            plist.insert("CFBundleIconFile".into(), icon_file.into());
        }

        match integrity {
            Some(record) => {
                plist.insert("ElectronAsarIntegrity".into(), integrity_value(record));
            }
            None => {
                plist.remove("ElectronAsarIntegrity");
            }
        }
    }

    /// Rewrites a helper plist in memory.
    pub fn apply_helper_keys(&self, plist: &mut Dictionary, helper: &HelperKind) {
        let name = naming::sanitize_app_name(&helper.app_name(self.staged.combo.name()));
        plist.insert("CFBundleDisplayName".into(), name.clone().into());
        plist.insert("CFBundleExecutable".into(), name.clone().into());
        plist.insert("CFBundleName".into(), name.into());
        plist.insert(
            "CFBundleIdentifier".into(),
            helper.identifier(&self.helper_bundle_id()).into(),
        );
        self.apply_common_keys(plist);
    }

    /// Rewrites the login helper plist in memory.
    pub fn apply_login_helper_keys(&self, plist: &mut Dictionary) {
        let name = self.login_helper_name();
        plist.insert("CFBundleExecutable".into(), name.clone().into());
        plist.insert("CFBundleName".into(), name.into());
        plist.insert(
            "CFBundleIdentifier".into(),
            format!("{}.loginhelper", self.app_bundle_id()).into(),
        );
    }

    async fn update_plists(&self, integrity: Option<&AsarIntegrity>) -> Result<Option<String>> {
        let mac = &self.staged.combo.options().mac;
        let contents = self.contents().await?;
        let app_plist_path = contents.join("Info.plist");

        let mut app_plist = read_plist(&app_plist_path).await?;
        merge_into(&mut app_plist, Self::load_all(&mac.extend_info).await?);

        let icon_file = if self.staged.combo.options().icon.is_some() {
            Some(
                app_plist
                    .get("CFBundleIconFile")
                    .and_then(Value::as_string)
                    .unwrap_or(DEFAULT_ICON_FILE)
                    .to_string(),
            )
        } else {
            None
        };
        self.apply_app_keys(&mut app_plist, icon_file.as_deref(), integrity);
        write_plist(&app_plist_path, app_plist).await?;

        let helper_extension = Self::load_all(&mac.extend_helper_info).await?;
        for (helper, path) in self.present_helpers().await? {
            let mut plist = read_plist(&path).await?;
            merge_into(&mut plist, helper_extension.clone());
            self.apply_helper_keys(&mut plist, &helper);
            write_plist(&path, plist).await?;
        }

        if let Some(path) = self.login_helper_plist().await? {
            let mut plist = read_plist(&path).await?;
            self.apply_login_helper_keys(&mut plist);
            write_plist(&path, plist).await?;
        }
        Ok(icon_file)
    }

    async fn copy_icon(&self, icon_file: &str) -> Result<()> {
        let dest = self.contents().await?.join("Resources").join(icon_file);
        match self.staged.normalize_icon("icns").await {
            Some(IconSource::Native(icns)) => {
                log::debug!("Copying icon {} to {}", icns.display(), dest.display());
                fs::copy_file(&icns, &dest).await
            }
            Some(IconSource::Png(png)) => icon::png_to_icns(&png, &dest).await,
            None => Ok(()),
        }
    }

    async fn rename_bundles(&self) -> Result<()> {
        let name = self.sanitized_name();
        let executable = naming::sanitize_app_name(self.staged.combo.executable_name());
        let contents = Path::new(TEMPLATE_APP).join("Contents");

        self.staged
            .relative_rename(contents.join("MacOS/Electron"), contents.join("MacOS").join(&executable))
            .await?;

        let frameworks = contents.join("Frameworks");
        for (helper, _) in self.present_helpers().await? {
            let original = helper.template_name();
            let renamed = helper.app_name(&name);
            let original_app = frameworks.join(format!("{original}.app"));
            self.staged
                .relative_rename(
                    original_app.join("Contents/MacOS").join(&original),
                    original_app.join("Contents/MacOS").join(&renamed),
                )
                .await?;
            self.staged
                .relative_rename(&original_app, frameworks.join(format!("{renamed}.app")))
                .await?;
        }

        if self.login_helper_plist().await?.is_some() {
            let login_items = Path::new(TEMPLATE_APP).join(LOGIN_ITEMS);
            let original_app = login_items.join(format!("{LOGIN_HELPER}.app"));
            let renamed = self.login_helper_name();
            self.staged
                .relative_rename(
                    original_app.join("Contents/MacOS").join(LOGIN_HELPER),
                    original_app.join("Contents/MacOS").join(&renamed),
                )
                .await?;
            self.staged
                .relative_rename(&original_app, login_items.join(format!("{renamed}.app")))
                .await?;
        }

        self.staged
            .relative_rename(TEMPLATE_APP, format!("{name}.app"))
            .await
    }

    /// The renamed bundle inside the staging path.
    pub async fn bundle_path(&self) -> Result<PathBuf> {
        Ok(self
            .staged
            .staging_path()
            .await?
            .join(format!("{}.app", self.sanitized_name())))
    }
}

#[async_trait]
impl PlatformBundle for MacApp {
    fn staged(&self) -> &StagedApp {
        &self.staged
    }

    async fn platform_steps(&self, integrity: Option<AsarIntegrity>) -> Result<()> {
        let icon_file = self.update_plists(integrity.as_ref()).await?;
        if let Some(icon_file) = &icon_file {
            self.copy_icon(icon_file).await?;
        }
        self.rename_bundles().await?;
        self.staged.copy_extra_resources().await?;

        let combo = &self.staged.combo;
        if combo.codesign {
            let bundle = self.bundle_path().await?;
            let report = sign::sign_and_notarize(
                self.collaborators.mac_signer.as_ref(),
                &bundle,
                combo,
                &self.staged.output,
            )
            .await?;
            log::debug!("Signing {}: {:?}", bundle.display(), report);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_names_and_identifiers() {
        let renderer = HELPERS[1];
        assert_eq!(renderer.template_name(), "Electron Helper (Renderer)");
        assert_eq!(renderer.app_name("Shiny"), "Shiny Helper (Renderer)");
        assert_eq!(renderer.identifier("com.shiny.helper"), "com.shiny.helper");

        let eh = HELPERS[4];
        assert_eq!(eh.app_name("Shiny"), "Shiny Helper EH");
        assert_eq!(eh.identifier("com.shiny.helper"), "com.shiny.helper.EH");
    }

    #[test]
    fn layout_tracks_the_renamed_bundle() {
        let layout = layout("My:App");
        assert_eq!(layout.original_resources, Path::new("Electron.app/Contents/Resources"));
        assert_eq!(layout.renamed_resources, Path::new("My-App.app/Contents/Resources"));
        assert_eq!(layout.integrity_root, Path::new("Electron.app/Contents"));
    }
}
