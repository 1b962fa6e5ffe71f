//! Universal app creation for macOS (Intel + Apple Silicon).
//!
//! Two complete `.app` bundles, one per architecture, are merged file by
//! file. Identical files are copied once, Mach-O files that differ are
//! combined with Apple's `lipo` tool, and symlinks are recreated from the
//! x64 slice.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::settings::UniversalOptions;
use crate::bundler::utils::{fs, process};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Merges an x64 and an arm64 app into one universal app.
#[async_trait]
pub trait UniversalMerger: Send + Sync {
    /// Writes the merged bundle to `output`, which must not exist.
    async fn merge(
        &self,
        x64_app: &Path,
        arm64_app: &Path,
        output: &Path,
        options: &UniversalOptions,
    ) -> Result<()>;
}

/// [`UniversalMerger`] that combines binaries with `lipo -create`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LipoMerger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    Link,
    File,
}

fn relative_entries(root: &Path) -> Result<Vec<(PathBuf, EntryKind)>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let kind = if entry.path_is_symlink() {
            EntryKind::Link
        } else if entry.file_type().is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };
        entries.push((entry.path().strip_prefix(root)?.to_path_buf(), kind));
    }
    Ok(entries)
}

fn is_mach_o(bytes: &[u8]) -> bool {
    matches!(goblin::Object::parse(bytes), Ok(goblin::Object::Mach(_)))
}

impl LipoMerger {
    async fn lipo(&self, x64: &Path, arm64: &Path, output: &Path) -> Result<()> {
        let lipo = which::which("lipo").map_err(|_| {
            Error::Universal(
                "lipo not found. Ensure Xcode Command Line Tools are installed.".to_string(),
            )
        })?;
        let mut command = tokio::process::Command::new(lipo);
        command
            .arg("-create")
            .arg(x64)
            .arg(arm64)
            .arg("-output")
            .arg(output);
        process::run(&mut command, "lipo").await?;

        let permissions = tokio::fs::metadata(x64)
            .await
            .fs_context("reading metadata", x64)?
            .permissions();
        tokio::fs::set_permissions(output, permissions)
            .await
            .fs_context("setting permissions", output)
    }
}

#[async_trait]
impl UniversalMerger for LipoMerger {
    async fn merge(
        &self,
        x64_app: &Path,
        arm64_app: &Path,
        output: &Path,
        options: &UniversalOptions,
    ) -> Result<()> {
        let single_arch = options
            .x64_arch_files
            .as_deref()
            .map(glob::Pattern::new)
            .transpose()?;
        let allowed_in_one_slice = |relative: &Path| {
            single_arch
                .as_ref()
                .is_some_and(|pattern| pattern.matches_path(relative))
        };

        let (x64_root, arm64_root) = (x64_app.to_path_buf(), arm64_app.to_path_buf());
        let (x64_entries, arm64_entries) = tokio::task::spawn_blocking(move || {
            Ok::<_, Error>((relative_entries(&x64_root)?, relative_entries(&arm64_root)?))
        })
        .await??;

        let in_x64: BTreeSet<&PathBuf> = x64_entries.iter().map(|(path, _)| path).collect();
        if let Some((missing, _)) = arm64_entries
            .iter()
            .find(|(path, _)| !in_x64.contains(path) && !allowed_in_one_slice(path))
        {
            return Err(Error::Universal(format!(
                "{} exists in the arm64 app but not in the x64 app",
                missing.display()
            )));
        }

        log::info!(
            "Merging {} and {} into {}",
            x64_app.display(),
            arm64_app.display(),
            output.display()
        );
        tokio::fs::create_dir_all(output)
            .await
            .fs_context("creating directory", output)?;

        let mut merged = 0usize;
        for (relative, kind) in &x64_entries {
            let x64 = x64_app.join(relative);
            let arm64 = arm64_app.join(relative);
            let dest = output.join(relative);

            match kind {
                EntryKind::Dir => {
                    tokio::fs::create_dir_all(&dest)
                        .await
                        .fs_context("creating directory", &dest)?;
                }
                EntryKind::Link => fs::copy_symlink(&x64, &dest).await?,
                EntryKind::File => {
                    if !fs::path_exists(&arm64).await {
                        if allowed_in_one_slice(relative) {
                            fs::copy_file(&x64, &dest).await?;
                            continue;
                        }
                        return Err(Error::Universal(format!(
                            "{} exists in the x64 app but not in the arm64 app",
                            relative.display()
                        )));
                    }

                    let x64_bytes = tokio::fs::read(&x64).await.fs_context("reading file", &x64)?;
                    let arm64_bytes = tokio::fs::read(&arm64)
                        .await
                        .fs_context("reading file", &arm64)?;
                    if x64_bytes == arm64_bytes {
                        fs::copy_file(&x64, &dest).await?;
                    } else if is_mach_o(&x64_bytes) && is_mach_o(&arm64_bytes) {
                        log::debug!("lipo {}", relative.display());
                        self.lipo(&x64, &arm64, &dest).await?;
                        merged += 1;
                    } else if allowed_in_one_slice(relative) {
                        fs::copy_file(&x64, &dest).await?;
                    } else {
                        return Err(Error::Universal(format!(
                            "{} differs between the x64 and arm64 apps and is not a Mach-O binary",
                            relative.display()
                        )));
                    }
                }
            }
        }

        log::info!("Merged {} binaries into {}", merged, output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(root: &Path, binary: &[u8]) {
        std::fs::create_dir_all(root.join("Contents/MacOS")).unwrap();
        std::fs::write(root.join("Contents/Info.plist"), "same").unwrap();
        std::fs::write(root.join("Contents/MacOS/App"), binary).unwrap();
    }

    #[tokio::test]
    async fn identical_slices_copy_through() {
        let tmp = tempfile::tempdir().unwrap();
        let (x64, arm64, out) = (
            tmp.path().join("x64.app"),
            tmp.path().join("arm64.app"),
            tmp.path().join("universal.app"),
        );
        slice(&x64, b"binary");
        slice(&arm64, b"binary");

        LipoMerger
            .merge(&x64, &arm64, &out, &UniversalOptions::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read(out.join("Contents/MacOS/App")).unwrap(), b"binary");
    }

    #[tokio::test]
    async fn differing_non_mach_o_fails_unless_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        let (x64, arm64) = (tmp.path().join("x64.app"), tmp.path().join("arm64.app"));
        slice(&x64, b"intel");
        slice(&arm64, b"apple");

        let err = LipoMerger
            .merge(&x64, &arm64, &tmp.path().join("a.app"), &UniversalOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Universal(_)));

        let options = UniversalOptions {
            x64_arch_files: Some("Contents/MacOS/*".into()),
        };
        let out = tmp.path().join("b.app");
        LipoMerger.merge(&x64, &arm64, &out, &options).await.unwrap();
        assert_eq!(std::fs::read(out.join("Contents/MacOS/App")).unwrap(), b"intel");
    }

    #[tokio::test]
    async fn files_missing_from_a_slice_fail() {
        let tmp = tempfile::tempdir().unwrap();
        let (x64, arm64) = (tmp.path().join("x64.app"), tmp.path().join("arm64.app"));
        slice(&x64, b"binary");
        slice(&arm64, b"binary");
        std::fs::write(arm64.join("Contents/extra"), "arm only").unwrap();

        let err = LipoMerger
            .merge(&x64, &arm64, &tmp.path().join("u.app"), &UniversalOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Contents/extra"));
    }
}
