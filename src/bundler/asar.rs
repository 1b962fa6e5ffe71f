//! Asar archive creation.
//!
//! An archive is an 8-byte size pickle, a header pickle holding the JSON
//! directory tree, then the contents of every packed file back to back.
//! Header offsets are relative to the end of the header.

use crate::bundler::error::{Error, ErrorExt, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Integrity block size.
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Options controlling archive creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsarOptions {
    /// Glob of files kept outside the archive, in `<archive>.unpacked/`.
    ///
    /// A pattern without `/` is matched against file names too.
    pub unpack: Option<String>,
    /// Glob of directories kept outside the archive
    pub unpack_dir: Option<String>,
}

/// Packs `src_dir` into the archive `dest`.
pub async fn create_package(src_dir: &Path, dest: &Path, options: &AsarOptions) -> Result<()> {
    let src_dir = src_dir.to_path_buf();
    let dest = dest.to_path_buf();
    let options = options.clone();
    log::debug!("Creating asar {} from {}", dest.display(), src_dir.display());
    tokio::task::spawn_blocking(move || write_package(&src_dir, &dest, &options)).await?
}

struct UnpackRules {
    file: Option<glob::Pattern>,
    dir: Option<glob::Pattern>,
}

impl UnpackRules {
    fn new(options: &AsarOptions) -> Result<Self> {
        Ok(Self {
            file: options.unpack.as_deref().map(glob::Pattern::new).transpose()?,
            dir: options.unpack_dir.as_deref().map(glob::Pattern::new).transpose()?,
        })
    }

    fn file_matches(&self, rel: &str) -> bool {
        self.file
            .as_ref()
            .is_some_and(|pattern| matches_path_or_base(pattern, rel))
    }

    fn dir_matches(&self, rel: &str) -> bool {
        self.dir.as_ref().is_some_and(|pattern| pattern.matches(rel))
    }
}

fn matches_path_or_base(pattern: &glob::Pattern, rel: &str) -> bool {
    if pattern.matches(rel) {
        return true;
    }
    !pattern.as_str().contains('/')
        && rel
            .rsplit('/')
            .next()
            .is_some_and(|base| pattern.matches(base))
}

fn write_package(src_dir: &Path, dest: &Path, options: &AsarOptions) -> Result<()> {
    let rules = UnpackRules::new(options)?;
    let real_src = std::fs::canonicalize(src_dir).fs_context("resolving path", src_dir)?;
    let unpacked_root = unpacked_dir(dest);

    let mut root = Map::new();
    root.insert("files".into(), Value::Object(Map::new()));
    let mut packed: Vec<PathBuf> = Vec::new();
    let mut unpacked_dirs: Vec<String> = Vec::new();
    let mut offset: u64 = 0;

    for entry in walkdir::WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src_dir)?;
        let rel_name = forward_slashes(rel);
        let in_unpacked_dir = unpacked_dirs
            .iter()
            .any(|dir| rel_name.starts_with(&format!("{dir}/")));
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let resolved =
                std::fs::canonicalize(entry.path()).fs_context("resolving symlink", entry.path())?;
            let link = resolved.strip_prefix(&real_src).map_err(|_| {
                Error::GenericError(format!(
                    "{}: file \"{}\" links out of the package",
                    src_dir.display(),
                    entry.path().display()
                ))
            })?;
            insert_node(&mut root, &rel_name, json!({ "link": forward_slashes(link) }))?;
        } else if file_type.is_dir() {
            let mut node = Map::new();
            node.insert("files".into(), Value::Object(Map::new()));
            if in_unpacked_dir || rules.dir_matches(&rel_name) {
                unpacked_dirs.push(rel_name.clone());
                node.insert("unpacked".into(), Value::Bool(true));
            }
            insert_node(&mut root, &rel_name, Value::Object(node))?;
        } else {
            let data = std::fs::read(entry.path()).fs_context("reading file", entry.path())?;
            let mut node = Map::new();
            node.insert("size".into(), json!(data.len()));

            if in_unpacked_dir || rules.file_matches(&rel_name) {
                node.insert("unpacked".into(), Value::Bool(true));
                let target = unpacked_root.join(rel);
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).fs_context("creating directory", parent)?;
                }
                std::fs::copy(entry.path(), &target).fs_context("copying file", entry.path())?;
            } else {
                node.insert("offset".into(), Value::String(offset.to_string()));
                offset += data.len() as u64;
                packed.push(entry.path().to_path_buf());
            }

            if is_executable(&entry.metadata()?) {
                node.insert("executable".into(), Value::Bool(true));
            }
            node.insert("integrity".into(), file_integrity(&data));
            insert_node(&mut root, &rel_name, Value::Object(node))?;
        }
    }

    let header = serde_json::to_string(&Value::Object(root))?;
    let header_pickle = pickle_string(&header)?;
    let header_len = u32::try_from(header_pickle.len())
        .map_err(|_| Error::GenericError("asar header is too large".into()))?;

    let file = File::create(dest).fs_context("creating file", dest)?;
    let mut out = BufWriter::new(file);
    out.write_all(&4u32.to_le_bytes())
        .and_then(|()| out.write_all(&header_len.to_le_bytes()))
        .and_then(|()| out.write_all(&header_pickle))
        .fs_context("writing file", dest)?;
    for path in packed {
        let mut input = File::open(&path).fs_context("opening file", &path)?;
        io::copy(&mut input, &mut out).fs_context("writing file", dest)?;
    }
    out.flush().fs_context("writing file", dest)?;
    Ok(())
}

/// `<archive>.unpacked`
pub fn unpacked_dir(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".unpacked");
    PathBuf::from(name)
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn insert_node(root: &mut Map<String, Value>, rel_name: &str, node: Value) -> Result<()> {
    let malformed = || Error::GenericError(format!("asar header conflict at {rel_name}"));
    let mut parts: Vec<&str> = rel_name.split('/').collect();
    let Some(name) = parts.pop() else {
        return Ok(());
    };

    let mut dir = root;
    for part in parts {
        dir = dir
            .entry("files")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(malformed)?
            .entry(part)
            .or_insert_with(|| json!({ "files": {} }))
            .as_object_mut()
            .ok_or_else(malformed)?;
    }
    dir.entry("files")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(malformed)?
        .insert(name.to_string(), node);
    Ok(())
}

/// Pickle encoding of one string: payload size, string length, bytes,
/// padding to a 4-byte boundary.
fn pickle_string(value: &str) -> Result<Vec<u8>> {
    let bytes = value.as_bytes();
    let len = u32::try_from(bytes.len())
        .map_err(|_| Error::GenericError("asar header is too large".into()))?;
    let padding = (4 - bytes.len() % 4) % 4;
    let payload = 4 + bytes.len() + padding;

    let mut out = Vec::with_capacity(4 + payload);
    out.extend_from_slice(&(payload as u32).to_le_bytes());
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    out.resize(out.len() + padding, 0);
    Ok(out)
}

fn file_integrity(data: &[u8]) -> Value {
    let mut chunks = data.chunks_exact(BLOCK_SIZE);
    let mut blocks: Vec<String> = chunks
        .by_ref()
        .map(|block| hex::encode(Sha256::digest(block)))
        .collect();
    // The trailing block is always recorded, even when empty.
    blocks.push(hex::encode(Sha256::digest(chunks.remainder())));

    json!({
        "algorithm": "SHA256",
        "hash": hex::encode(Sha256::digest(data)),
        "blockSize": BLOCK_SIZE,
        "blocks": blocks,
    })
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o100 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Reads the JSON header string of an archive.
pub async fn read_raw_header(archive: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(archive)
        .await
        .fs_context("opening archive", archive)?;
    let mut size_pickle = [0u8; 8];
    file.read_exact(&mut size_pickle)
        .await
        .fs_context("reading asar header", archive)?;
    let header_len = u32::from_le_bytes([
        size_pickle[4],
        size_pickle[5],
        size_pickle[6],
        size_pickle[7],
    ]) as usize;

    let mut header = vec![0u8; header_len];
    file.read_exact(&mut header)
        .await
        .fs_context("reading asar header", archive)?;
    let truncated = || Error::GenericError(format!("truncated asar header in {}", archive.display()));
    let len_bytes = header.get(4..8).ok_or_else(truncated)?;
    let string_len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    let json = header.get(8..8 + string_len).ok_or_else(truncated)?;
    String::from_utf8(json.to_vec())
        .map_err(|e| Error::GenericError(format!("invalid asar header: {e}")))
}

/// SHA-256 hex digest of a raw header string.
pub fn header_hash(header: &str) -> String {
    hex::encode(Sha256::digest(header.as_bytes()))
}

/// Header hash of one archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityEntry {
    /// Always `SHA256`
    pub algorithm: String,
    /// Hex digest of the raw header
    pub hash: String,
}

/// Archive path inside the bundle to its header hash.
pub type AsarIntegrity = BTreeMap<String, IntegrityEntry>;

/// Integrity record for `archive`, keyed by `key`.
pub async fn integrity(archive: &Path, key: &str) -> Result<AsarIntegrity> {
    let header = read_raw_header(archive).await?;
    let mut record = AsarIntegrity::new();
    record.insert(
        key.to_string(),
        IntegrityEntry {
            algorithm: "SHA256".to_string(),
            hash: header_hash(&header),
        },
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("app");
        fs::create_dir_all(app.join("lib")).unwrap();
        fs::write(app.join("package.json"), r#"{"main":"index.js"}"#).unwrap();
        fs::write(app.join("index.js"), "require('./lib/util')").unwrap();
        fs::write(app.join("lib/util.js"), "module.exports = 1").unwrap();
        fs::write(app.join("lib/addon.node"), [0u8, 1, 2, 3]).unwrap();
        fs::write(app.join("empty.txt"), "").unwrap();
        tmp
    }

    #[tokio::test]
    async fn header_describes_offsets_and_integrity() {
        let tmp = fixture();
        let archive = tmp.path().join("app.asar");
        create_package(&tmp.path().join("app"), &archive, &AsarOptions::default())
            .await
            .unwrap();

        let header: Value = serde_json::from_str(&read_raw_header(&archive).await.unwrap()).unwrap();
        let files = &header["files"];
        assert_eq!(files["empty.txt"]["offset"], "0");
        assert_eq!(files["empty.txt"]["integrity"]["blocks"].as_array().unwrap().len(), 1);
        // Sorted: empty.txt, index.js, lib/addon.node, lib/util.js, package.json
        assert_eq!(files["index.js"]["offset"], "0");
        assert_eq!(files["lib"]["files"]["addon.node"]["offset"], "21");
        assert_eq!(files["lib"]["files"]["util.js"]["size"], 18);

        let index = &files["index.js"];
        assert_eq!(index["integrity"]["algorithm"], "SHA256");
        assert_eq!(
            index["integrity"]["hash"],
            hex::encode(Sha256::digest(b"require('./lib/util')"))
        );

        let bytes = fs::read(&archive).unwrap();
        let header_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let body = &bytes[8 + header_len..];
        assert_eq!(&body[..21], b"require('./lib/util')");
        assert_eq!(&body[21..25], &[0u8, 1, 2, 3]);
    }

    #[tokio::test]
    async fn unpack_glob_keeps_files_outside() {
        let tmp = fixture();
        let archive = tmp.path().join("app.asar");
        let options = AsarOptions {
            unpack: Some("*.node".into()),
            ..Default::default()
        };
        create_package(&tmp.path().join("app"), &archive, &options)
            .await
            .unwrap();

        let header: Value = serde_json::from_str(&read_raw_header(&archive).await.unwrap()).unwrap();
        let addon = &header["files"]["lib"]["files"]["addon.node"];
        assert_eq!(addon["unpacked"], true);
        assert!(addon.get("offset").is_none());
        assert!(tmp.path().join("app.asar.unpacked/lib/addon.node").is_file());
    }

    #[test]
    fn integrity_records_trailing_block() {
        let full = vec![7u8; BLOCK_SIZE];
        let integrity = file_integrity(&full);
        assert_eq!(integrity["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(integrity["blockSize"], BLOCK_SIZE);
    }

    #[test]
    fn pickled_strings_are_padded() {
        let encoded = pickle_string("abcde").unwrap();
        assert_eq!(encoded.len(), 4 + 4 + 8);
        assert_eq!(&encoded[0..4], &12u32.to_le_bytes());
        assert_eq!(&encoded[4..8], &5u32.to_le_bytes());
    }

    #[tokio::test]
    async fn integrity_hashes_the_header() {
        let tmp = fixture();
        let archive = tmp.path().join("app.asar");
        create_package(&tmp.path().join("app"), &archive, &AsarOptions::default())
            .await
            .unwrap();
        let header = read_raw_header(&archive).await.unwrap();
        let record = integrity(&archive, "Resources/app.asar").await.unwrap();
        assert_eq!(record["Resources/app.asar"].hash, header_hash(&header));
        assert_eq!(record["Resources/app.asar"].algorithm, "SHA256");
    }

    #[test]
    fn header_hash_is_sha256_hex() {
        assert_eq!(
            header_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_outside_the_package_are_rejected() {
        let tmp = fixture();
        fs::write(tmp.path().join("outside.txt"), "x").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("outside.txt"), tmp.path().join("app/escape"))
            .unwrap();
        let err = create_package(
            &tmp.path().join("app"),
            &tmp.path().join("app.asar"),
            &AsarOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("links out of the package"));
    }
}
