//! External tools the packager delegates to.
//!
//! Each collaborator sits behind a trait so tests and embedders can swap
//! it. [`Collaborators::default`] wires the real implementations.

use crate::bundler::platform::macos::sign::{KodegenMacSigner, MacSigner};
use crate::bundler::platform::macos::universal::{LipoMerger, UniversalMerger};
use crate::bundler::platform::windows::resedit::{RceditEditor, ResourceEditor};
use crate::bundler::platform::windows::sign::{KodegenWindowsSigner, WindowsSigner};
use crate::bundler::utils::fs::{HostSymlinkProbe, SymlinkProbe};
use crate::bundler::utils::http::{Downloader, ElectronDownloader};
use std::fmt;
use std::sync::Arc;

/// The set of external collaborators used by one packaging run.
#[derive(Clone)]
pub struct Collaborators {
    /// Fetches Electron release archives
    pub downloader: Arc<dyn Downloader>,
    /// Signs and notarizes mac bundles
    pub mac_signer: Arc<dyn MacSigner>,
    /// Signs Windows executables
    pub windows_signer: Arc<dyn WindowsSigner>,
    /// Edits Windows executable resources
    pub resource_editor: Arc<dyn ResourceEditor>,
    /// Merges x64 and arm64 mac bundles
    pub universal_merger: Arc<dyn UniversalMerger>,
    /// Checks symlink support before mac builds
    pub symlink_probe: Arc<dyn SymlinkProbe>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            downloader: Arc::new(ElectronDownloader::default()),
            mac_signer: Arc::new(KodegenMacSigner),
            windows_signer: Arc::new(KodegenWindowsSigner),
            resource_editor: Arc::new(RceditEditor::default()),
            universal_merger: Arc::new(LipoMerger),
            symlink_probe: Arc::new(HostSymlinkProbe),
        }
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
