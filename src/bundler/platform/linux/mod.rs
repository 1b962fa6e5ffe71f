//! Linux bundle assembly.
//!
//! Linux templates are a flat directory with an `electron` binary next to a
//! `resources/` directory. The binary is renamed to the executable name and
//! extra resources are copied in; nothing else changes. Unofficial
//! platforms reached through a mirror are assembled the same way.

use crate::bundler::asar::AsarIntegrity;
use crate::bundler::error::Result;
use crate::bundler::platform::{PlatformBundle, StagedApp};
use crate::bundler::utils::naming;
use async_trait::async_trait;

/// Builds `linux` targets.
pub struct LinuxApp {
    staged: StagedApp,
}

impl LinuxApp {
    /// Builder for a staged linux template.
    pub fn new(staged: StagedApp) -> Self {
        Self { staged }
    }

    /// Sanitized executable name.
    pub fn exe_name(&self) -> String {
        naming::sanitize_app_name(self.staged.combo.executable_name())
    }
}

#[async_trait]
impl PlatformBundle for LinuxApp {
    fn staged(&self) -> &StagedApp {
        &self.staged
    }

    async fn platform_steps(&self, _integrity: Option<AsarIntegrity>) -> Result<()> {
        let exe_name = self.exe_name();
        if exe_name != "electron" {
            self.staged.relative_rename("electron", &exe_name).await?;
        }
        self.staged.copy_extra_resources().await
    }
}
