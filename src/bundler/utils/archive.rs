//! Electron release archive extraction.

use crate::bundler::error::{Error, ErrorExt, Result};
use std::path::{Component, Path, PathBuf};

const S_IFMT: u16 = 0o170000;
const S_IFLNK: u16 = 0o120000;

/// Extracts the ZIP archive at `zip_path` into `dest`.
///
/// Entries that would land outside `dest` are rejected. Unix permission bits
/// and symlinks recorded in the archive are restored, which the mac-family
/// framework bundles depend on.
pub async fn extract_zip(zip_path: &Path, dest: &Path) -> Result<()> {
    use async_zip::base::read::mem::ZipFileReader;
    use futures_lite::io::AsyncReadExt as _;

    log::debug!("Extracting {} into {}", zip_path.display(), dest.display());
    let data = tokio::fs::read(zip_path)
        .await
        .fs_context("reading archive", zip_path)?;
    let reader = ZipFileReader::new(data)
        .await
        .map_err(|e| Error::GenericError(format!("Failed to read ZIP archive: {}", e)))?;
    tokio::fs::create_dir_all(dest)
        .await
        .fs_context("creating directory", dest)?;

    for i in 0..reader.file().entries().len() {
        let entry = reader
            .file()
            .entries()
            .get(i)
            .ok_or_else(|| Error::GenericError(format!("Failed to get ZIP entry {}", i)))?;
        let filename = entry
            .filename()
            .as_str()
            .map_err(|e| Error::GenericError(format!("Invalid filename in ZIP: {}", e)))?
            .to_string();
        let out_path = entry_path(dest, &filename)?;
        let mode = entry.unix_permissions();
        let is_dir = entry
            .dir()
            .map_err(|e| Error::GenericError(format!("Failed to read ZIP entry {}: {}", filename, e)))?;

        if is_dir {
            tokio::fs::create_dir_all(&out_path)
                .await
                .fs_context("creating directory", &out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating directory", parent)?;
        }

        let mut entry_reader = reader
            .reader_with_entry(i)
            .await
            .map_err(|e| Error::GenericError(format!("Failed to read ZIP entry: {}", e)))?;
        let mut content = Vec::new();
        entry_reader.read_to_end(&mut content).await?;

        if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            let target = String::from_utf8_lossy(&content).into_owned();
            write_symlink(&target, &out_path).await?;
            continue;
        }

        tokio::fs::write(&out_path, content)
            .await
            .fs_context("writing file", &out_path)?;
        if let Some(mode) = mode {
            set_mode(&out_path, mode).await?;
        }
    }

    Ok(())
}

fn entry_path(dest: &Path, filename: &str) -> Result<PathBuf> {
    let relative = Path::new(filename);
    let escapes = filename.starts_with('/')
        || filename.starts_with('\\')
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        crate::bail!("Invalid ZIP entry path (potential traversal attack): {}", filename);
    }
    Ok(dest.join(relative))
}

#[cfg(unix)]
async fn write_symlink(target: &str, link: &Path) -> Result<()> {
    super::fs::remove_path(link).await?;
    tokio::fs::symlink(target, link)
        .await
        .fs_context("creating symlink", link)
}

#[cfg(windows)]
async fn write_symlink(target: &str, link: &Path) -> Result<()> {
    // Written as a plain file holding the link target.
    tokio::fs::write(link, target)
        .await
        .fs_context("writing file", link)
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u16) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(u32::from(mode & 0o7777));
    tokio::fs::set_permissions(path, perms)
        .await
        .fs_context("setting permissions", path)
}

#[cfg(windows)]
async fn set_mode(_path: &Path, _mode: u16) -> Result<()> {
    Ok(())
}
