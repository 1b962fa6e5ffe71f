//! Windows bundle assembly.
//!
//! Renames `electron.exe`, copies extra resources, rewrites the executable's
//! version resources and icon with rcedit when any of them were configured,
//! and signs the executable when signing is configured.

pub mod icon;
pub mod resedit;
pub mod sign;

use crate::bundler::asar::AsarIntegrity;
use crate::bundler::collaborators::Collaborators;
use crate::bundler::error::Result;
use crate::bundler::platform::{IconSource, PlatformBundle, StagedApp};
use crate::bundler::utils::{fs, naming};
use async_trait::async_trait;
use resedit::ResourceEdits;
use std::path::PathBuf;
use std::sync::Arc;

/// Builds `win32` targets.
pub struct WindowsApp {
    staged: StagedApp,
    collaborators: Arc<Collaborators>,
}

impl WindowsApp {
    /// Builder for a staged win32 template.
    pub fn new(staged: StagedApp, collaborators: Arc<Collaborators>) -> Self {
        Self {
            staged,
            collaborators,
        }
    }

    /// `<executable name>.exe`
    pub fn exe_name(&self) -> String {
        format!(
            "{}.exe",
            naming::sanitize_app_name(self.staged.combo.executable_name())
        )
    }

    fn needs_resource_edit(&self) -> bool {
        let combo = &self.staged.combo;
        let options = combo.options();
        options.icon.is_some()
            || !combo.resolved.win32_metadata.is_empty()
            || options.app_copyright.is_some()
            || combo.resolved.app_version.is_some()
            || options.build_version.is_some()
    }

    /// Resource edits for the renamed executable, without the icon.
    pub fn resource_edits(&self) -> ResourceEdits {
        let combo = &self.staged.combo;
        let name = combo.name().to_string();
        let metadata = &combo.resolved.win32_metadata;

        let mut edits = ResourceEdits::default();
        let strings = &mut edits.version_strings;
        strings.insert(
            "FileDescription".into(),
            metadata.file_description.clone().unwrap_or_else(|| name.clone()),
        );
        strings.insert(
            "InternalName".into(),
            metadata.internal_name.clone().unwrap_or_else(|| name.clone()),
        );
        strings.insert(
            "OriginalFilename".into(),
            metadata.original_filename.clone().unwrap_or_else(|| self.exe_name()),
        );
        strings.insert(
            "ProductName".into(),
            metadata.product_name.clone().unwrap_or(name),
        );
        if let Some(company) = &metadata.company_name {
            strings.insert("CompanyName".into(), company.clone());
        }
        if let Some(copyright) = &combo.options().app_copyright {
            strings.insert("LegalCopyright".into(), copyright.clone());
        }

        if let Some(version) = &combo.resolved.app_version {
            edits.product_version = Some(version.clone());
            edits.file_version = Some(version.clone());
        }
        if let Some(build) = &combo.options().build_version {
            edits.file_version = Some(build.clone());
        }
        edits.requested_execution_level = metadata.requested_execution_level.clone();
        edits.application_manifest = metadata
            .application_manifest
            .as_ref()
            .map(|manifest| combo.resolved.cwd.join(manifest));
        edits
    }

    async fn edit_resources(&self, exe: &std::path::Path) -> Result<()> {
        let mut edits = self.resource_edits();
        let mut converted: Option<PathBuf> = None;
        match self.staged.normalize_icon("ico").await {
            Some(IconSource::Native(ico)) => edits.icon = Some(ico),
            Some(IconSource::Png(png)) => {
                let ico = std::env::temp_dir().join(format!("{}.ico", uuid::Uuid::new_v4()));
                icon::png_to_ico(&png, &ico).await?;
                edits.icon = Some(ico.clone());
                converted = Some(ico);
            }
            None => {}
        }

        let edited = self.collaborators.resource_editor.edit(exe, &edits).await;
        if let Some(ico) = converted {
            fs::remove_path(&ico).await?;
        }
        edited
    }
}

#[async_trait]
impl PlatformBundle for WindowsApp {
    fn staged(&self) -> &StagedApp {
        &self.staged
    }

    async fn platform_steps(&self, _integrity: Option<AsarIntegrity>) -> Result<()> {
        let exe_name = self.exe_name();
        if exe_name != "electron.exe" {
            self.staged.relative_rename("electron.exe", &exe_name).await?;
        }
        self.staged.copy_extra_resources().await?;

        let exe = self.staged.staging_path().await?.join(&exe_name);
        if self.needs_resource_edit() {
            self.edit_resources(&exe).await?;
        }

        let combo = &self.staged.combo;
        if combo.codesign
            && let Some(sign) = &combo.options().windows.sign
        {
            self.collaborators
                .windows_signer
                .sign(&exe, combo.name(), sign)
                .await?;
        }
        Ok(())
    }
}
