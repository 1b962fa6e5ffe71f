//! Application naming and output path conventions.
//!
//! Everything here is pure except [`unique_dir`], which creates the directory
//! it names.

use crate::bundler::error::{ErrorExt, Result};
use std::path::{Path, PathBuf};

/// Name of the directory placed under the system (or configured) temp dir.
pub const TEMP_DIR_NAME: &str = "electron-bundler";

const MAX_NAME_LEN: usize = 100;
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
const WINDOWS_RESERVED: &[&str] = &["con", "prn", "aux", "nul"];

/// Makes an application name safe for use as a file name on every host.
///
/// Reserved and control characters become `-`, a leading run of dots is
/// replaced, repeated `-` collapse to one and outer `-` are trimmed. DOS
/// device names (`CON`, `COM1`, ...) get a trailing `-`.
pub fn sanitize_app_name(name: &str) -> String {
    let mut replaced = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    if chars.peek() == Some(&'.') {
        while chars.peek() == Some(&'.') {
            chars.next();
        }
        replaced.push('-');
    }

    for c in chars {
        if RESERVED_CHARS.contains(&c) || is_control(c) {
            replaced.push('-');
        } else {
            replaced.push(c);
        }
    }

    let mut collapsed = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '-' && collapsed.ends_with('-') {
            continue;
        }
        collapsed.push(c);
    }

    let mut sanitized = if collapsed.chars().count() > 1 {
        collapsed.trim_matches('-').to_string()
    } else {
        collapsed
    };

    if is_windows_reserved(&sanitized) {
        sanitized.push('-');
    }

    sanitized.chars().take(MAX_NAME_LEN).collect()
}

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x00..=0x1F | 0x80..=0x9F)
}

fn is_windows_reserved(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if WINDOWS_RESERVED.contains(&lower.as_str()) {
        return true;
    }
    let bytes = lower.as_bytes();
    bytes.len() == 4
        && (lower.starts_with("com") || lower.starts_with("lpt"))
        && bytes[3].is_ascii_digit()
}

/// Restricts a bundle identifier to letters, digits, `-` and `.`.
///
/// Spaces become hyphens; every other character is dropped.
pub fn filter_cf_bundle_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' => Some(c),
            _ => None,
        })
        .collect()
}

/// `<sanitized name>-<platform>-<arch>`
pub fn final_basename(name: &str, platform: &str, arch: &str) -> String {
    format!("{}-{}-{}", sanitize_app_name(name), platform, arch)
}

/// Deterministic location of a finished bundle.
pub fn final_path(out_dir: &Path, name: &str, platform: &str, arch: &str) -> PathBuf {
    out_dir.join(final_basename(name, platform, arch))
}

/// Root of every temporary directory the packager creates.
pub fn base_temp_dir(tmpdir: Option<&Path>) -> PathBuf {
    match tmpdir {
        Some(dir) => dir.join(TEMP_DIR_NAME),
        None => std::env::temp_dir().join(TEMP_DIR_NAME),
    }
}

/// Creates `<parent>/<prefix><uuid>` and returns its path.
pub async fn unique_dir(parent: &Path, prefix: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(parent)
        .await
        .fs_context("creating temp directory", parent)?;
    let dir = parent.join(format!("{}{}", prefix, uuid::Uuid::new_v4().simple()));
    tokio::fs::create_dir(&dir)
        .await
        .fs_context("creating temp directory", &dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_app_name("My/App:Name"), "My-App-Name");
        assert_eq!(sanitize_app_name("a<>b"), "a-b");
        assert_eq!(sanitize_app_name("Basic App"), "Basic App");
    }

    #[test]
    fn sanitize_strips_leading_dots_and_outer_hyphens() {
        assert_eq!(sanitize_app_name("..hidden"), "hidden");
        assert_eq!(sanitize_app_name("/app/"), "app");
        assert_eq!(sanitize_app_name("-"), "-");
    }

    #[test]
    fn sanitize_handles_dos_device_names() {
        assert_eq!(sanitize_app_name("con"), "con-");
        assert_eq!(sanitize_app_name("COM1"), "COM1-");
        assert_eq!(sanitize_app_name("console"), "console");
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = "x".repeat(150);
        assert_eq!(sanitize_app_name(&long).len(), 100);
    }

    #[test]
    fn identifier_filter_keeps_only_allowed_characters() {
        let filtered = filter_cf_bundle_identifier("com.electron.My App!@#_(test)");
        assert_eq!(filtered, "com.electron.My-Apptest");
        assert!(
            filtered
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        );
    }

    #[test]
    fn final_path_layout() {
        let path = final_path(Path::new("/out"), "Basic:App", "linux", "x64");
        assert_eq!(path, PathBuf::from("/out/Basic-App-linux-x64"));
    }

    #[test]
    fn temp_dir_is_namespaced() {
        let base = base_temp_dir(Some(Path::new("/scratch")));
        assert_eq!(base, PathBuf::from("/scratch/electron-bundler"));
    }

    #[tokio::test]
    async fn unique_dirs_do_not_collide() {
        let parent = tempfile::tempdir().unwrap();
        let a = unique_dir(parent.path(), "linux-x64-").await.unwrap();
        let b = unique_dir(parent.path(), "linux-x64-").await.unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
        assert!(
            a.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("linux-x64-")
        );
    }
}
