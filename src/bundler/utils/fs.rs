//! File system utilities for staging bundles.
//!
//! Provides moves that survive device boundaries, symlink-preserving tree
//! copies and removal helpers that tolerate missing paths.

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::utils::naming;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Whether `path` exists (without following a final symlink).
pub async fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}

/// Removes a file, symlink or directory tree if it exists.
pub async fn remove_path(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).fs_context("reading metadata", path),
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .await
            .fs_context("removing directory", path)
    } else {
        fs::remove_file(path).await.fs_context("removing file", path)
    }
}

/// Directory entries of `dir`, sorted by file name.
pub async fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut reader = fs::read_dir(dir)
        .await
        .fs_context("reading directory", dir)?;
    let mut entries = Vec::new();
    while let Some(entry) = reader
        .next_entry()
        .await
        .fs_context("reading directory", dir)?
    {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Makes a symbolic link to a directory.
#[cfg(unix)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a directory.
#[cfg(windows)]
fn symlink_dir(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(unix)]
pub(crate) fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

/// Makes a symbolic link to a file.
#[cfg(windows)]
pub(crate) fn symlink_file(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

/// Reports whether symlinks can be created under a directory.
///
/// Mac bundles are built from symlinked frameworks, so mac targets are
/// skipped when this says no.
#[async_trait]
pub trait SymlinkProbe: Send + Sync {
    /// Whether a file symlink can be created somewhere under `base`.
    async fn can_symlink(&self, base: &Path) -> bool;
}

/// [`SymlinkProbe`] that creates and removes a real link.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSymlinkProbe;

#[async_trait]
impl SymlinkProbe for HostSymlinkProbe {
    async fn can_symlink(&self, base: &Path) -> bool {
        let Ok(dir) = naming::unique_dir(base, "symlink-test-").await else {
            return false;
        };
        let target = dir.join("target");
        let supported = fs::write(&target, b"").await.is_ok()
            && symlink_file(&target, &dir.join("link")).is_ok();
        if let Err(err) = remove_path(&dir).await {
            log::debug!("Could not remove {}: {}", dir.display(), err);
        }
        supported
    }
}

/// Recreates the symlink at `link` as `dest`, pointing at the same target.
pub async fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(link)
        .await
        .fs_context("reading symlink", link)?;
    let points_to_dir = fs::metadata(link).await.map(|m| m.is_dir()).unwrap_or(false);
    let result = if points_to_dir {
        symlink_dir(&target, dest)
    } else {
        symlink_file(&target, dest)
    };
    result.fs_context("creating symlink", dest)
}

/// Copies a regular file, creating the destination's parent directories.
pub async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::metadata(from)
        .await
        .fs_context("reading metadata", from)?;
    if !meta.is_file() {
        crate::bail!("{} is not a file", from.display());
    }
    if let Some(dest_dir) = to.parent() {
        fs::create_dir_all(dest_dir)
            .await
            .fs_context("creating directory", dest_dir)?;
    }
    fs::copy(from, to).await.fs_context("copying file", from)?;
    Ok(())
}

/// Recursively copies a directory, preserving symlinks.
///
/// Fails if the source is not a directory.
pub async fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::metadata(from)
        .await
        .fs_context("reading metadata", from)?;
    if !meta.is_dir() {
        crate::bail!("{} is not a directory", from.display());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }

    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let rel_path = entry.path().strip_prefix(from)?;
        let dest_path = to.join(rel_path);

        if entry.file_type().is_symlink() {
            copy_symlink(entry.path(), &dest_path).await?;
        } else if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .await
                .fs_context("creating directory", &dest_path)?;
        } else {
            fs::copy(entry.path(), &dest_path)
                .await
                .fs_context("copying file", entry.path())?;
        }
    }

    Ok(())
}

/// Copies a file or directory tree to `to`.
pub async fn copy_path(from: &Path, to: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(from)
        .await
        .fs_context("reading metadata", from)?;
    if meta.file_type().is_symlink() {
        copy_symlink(from, to).await
    } else if meta.is_dir() {
        copy_dir(from, to).await
    } else {
        copy_file(from, to).await
    }
}

/// Moves `from` to `to`, replacing whatever is at `to`.
///
/// Uses a rename when possible and falls back to copy-then-delete when the
/// two paths are on different devices.
pub async fn move_path(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }
    remove_path(to).await?;
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)
            .await
            .fs_context("creating directory", parent)?;
    }

    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            log::debug!(
                "{} and {} are on different devices, copying instead",
                from.display(),
                to.display()
            );
            copy_path(from, to).await?;
            remove_path(from).await
        }
        Err(e) => Err(e).fs_context("moving", from),
    }
}

fn is_cross_device(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::CrossesDevices || error.raw_os_error() == Some(EXDEV)
}

#[cfg(unix)]
const EXDEV: i32 = 18;
#[cfg(windows)]
const EXDEV: i32 = 17; // ERROR_NOT_SAME_DEVICE

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn host_probe_cleans_up_after_itself() {
        let tmp = tempfile::tempdir().unwrap();
        let supported = HostSymlinkProbe.can_symlink(tmp.path()).await;
        if cfg!(unix) {
            assert!(supported);
        }
        assert!(read_dir_sorted(tmp.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn move_replaces_existing_destination() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("from");
        let to = tmp.path().join("nested/to");
        std::fs::create_dir_all(from.join("sub")).unwrap();
        std::fs::write(from.join("sub/file.txt"), "new").unwrap();
        std::fs::create_dir_all(&to).unwrap();
        std::fs::write(to.join("stale.txt"), "old").unwrap();

        move_path(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(to.join("sub/file.txt")).unwrap(), "new");
        assert!(!to.join("stale.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_dir_preserves_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("from");
        std::fs::create_dir_all(&from).unwrap();
        std::fs::write(from.join("real"), "data").unwrap();
        std::os::unix::fs::symlink("real", from.join("link")).unwrap();

        let to = tmp.path().join("to");
        copy_dir(&from, &to).await.unwrap();

        let meta = std::fs::symlink_metadata(to.join("link")).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(std::fs::read_link(to.join("link")).unwrap(), PathBuf::from("real"));
    }

    #[tokio::test]
    async fn remove_path_ignores_missing() {
        let tmp = tempfile::tempdir().unwrap();
        remove_path(&tmp.path().join("missing")).await.unwrap();
    }
}
