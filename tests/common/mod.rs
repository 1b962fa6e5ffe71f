//! Shared fixtures: a fake Electron release and a small app to package.
#![allow(dead_code)]

use async_trait::async_trait;
use kodegen_bundler_electron::bundler::platform::macos::sign::MacSigner;
use kodegen_bundler_electron::bundler::platform::macos::universal::UniversalMerger;
use kodegen_bundler_electron::bundler::utils::fs as bfs;
use kodegen_bundler_electron::bundler::utils::http::{DownloadSpec, Downloader};
use kodegen_bundler_electron::bundler::{
    Collaborators, DownloadOptions, Error, MacSignOptions, Options, Platform, Result, Selector,
    TempDirPolicy, UniversalOptions,
};
use kodegen_bundler_electron::output::OutputManager;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const ELECTRON_VERSION: &str = "27.1.3";

const APP_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>CFBundleExecutable</key>
  <string>Electron</string>
  <key>CFBundleIdentifier</key>
  <string>com.github.Electron</string>
  <key>CFBundleIconFile</key>
  <string>electron.icns</string>
  <key>CFBundleName</key>
  <string>Electron</string>
</dict>
</plist>
"#;

fn helper_plist(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>CFBundleExecutable</key>
  <string>{name}</string>
  <key>CFBundleIdentifier</key>
  <string>com.github.Electron.helper</string>
  <key>CFBundleName</key>
  <string>{name}</string>
</dict>
</plist>
"#
    )
}

/// A workspace holding the app, the output and staging dirs, and zips.
pub struct Workspace {
    pub root: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let ws = Self { root };
        ws.write_app();
        std::fs::create_dir_all(ws.zips()).unwrap();
        ws
    }

    pub fn app(&self) -> PathBuf {
        self.root.path().join("app")
    }

    pub fn out(&self) -> PathBuf {
        self.root.path().join("out")
    }

    pub fn tmp(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    pub fn zips(&self) -> PathBuf {
        self.root.path().join("zips")
    }

    fn write_app(&self) {
        let app = self.app();
        let write = |rel: &str, contents: &str| {
            let path = app.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        };
        write(
            "package.json",
            r#"{"name":"shiny","version":"1.2.3","main":"main.js",
                "dependencies":{"kept":"1.0.0"},
                "devDependencies":{"dropped":"1.0.0","electron":"27.1.3"}}"#,
        );
        write("main.js", "console.log('hello')\n");
        write("node_modules/kept/package.json", r#"{"name":"kept","version":"1.0.0"}"#);
        write("node_modules/kept/index.js", "module.exports = 1\n");
        write(
            "node_modules/dropped/package.json",
            r#"{"name":"dropped","version":"1.0.0"}"#,
        );
        write(
            "node_modules/electron/package.json",
            r#"{"name":"electron","version":"27.1.3"}"#,
        );
        write(".DS_Store", "junk");
    }

    /// Options for the fixture app with isolated out and staging dirs.
    pub fn options(&self, platform: &str, arch: &str) -> Options {
        let mut options = Options::new(self.app());
        options.name = Some("Shiny".into());
        options.electron_version = Some(ELECTRON_VERSION.into());
        options.platform = Some(Selector::parse(platform));
        options.arch = Some(Selector::parse(arch));
        options.out = Some(self.out());
        options.tmpdir = TempDirPolicy::Custom(self.tmp());
        options.electron_zip_dir = Some(self.zips());
        options.quiet = true;
        options
    }

    /// Writes `electron-v<version>-<platform>-<arch>.zip` into the zip dir.
    pub fn write_release(&self, platform: &str, arch: &str) -> PathBuf {
        let path = self
            .zips()
            .join(format!("electron-v{ELECTRON_VERSION}-{platform}-{arch}.zip"));
        let file = std::fs::File::create(&path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let exe = SimpleFileOptions::default().unix_permissions(0o755);
        let plain = SimpleFileOptions::default().unix_permissions(0o644);

        let mut add = |name: &str, contents: &[u8], options: SimpleFileOptions| {
            zip.start_file(name, options).unwrap();
            zip.write_all(contents).unwrap();
        };
        match platform {
            "darwin" | "mas" => {
                let contents = "Electron.app/Contents";
                add(&format!("{contents}/Info.plist"), APP_PLIST.as_bytes(), plain);
                add(&format!("{contents}/MacOS/Electron"), arch.as_bytes(), exe);
                add(
                    &format!("{contents}/Resources/default_app.asar"),
                    b"default",
                    plain,
                );
                for helper in ["Electron Helper", "Electron Helper (Renderer)"] {
                    let app = format!("{contents}/Frameworks/{helper}.app/Contents");
                    add(
                        &format!("{app}/Info.plist"),
                        helper_plist(helper).as_bytes(),
                        plain,
                    );
                    add(&format!("{app}/MacOS/{helper}"), b"helper", exe);
                }
                let login = format!("{contents}/Library/LoginItems/Electron Login Helper.app/Contents");
                add(
                    &format!("{login}/Info.plist"),
                    helper_plist("Electron Login Helper").as_bytes(),
                    plain,
                );
                add(&format!("{login}/MacOS/Electron Login Helper"), b"login", exe);
                add("LICENSE", b"MIT", plain);
            }
            "win32" => {
                add("electron.exe", b"MZ", exe);
                add("resources/default_app.asar", b"default", plain);
                add("LICENSE", b"MIT", plain);
            }
            _ => {
                add("electron", b"\x7fELF", exe);
                add("resources/default_app.asar", b"default", plain);
                add("LICENSE", b"MIT", plain);
            }
        }
        zip.finish().unwrap();
        path
    }
}

/// Downloader for tests that must never touch the network.
#[derive(Debug, Default)]
pub struct OfflineDownloader;

#[async_trait]
impl Downloader for OfflineDownloader {
    async fn download(&self, spec: &DownloadSpec, _options: &DownloadOptions) -> Result<PathBuf> {
        Err(Error::GenericError(format!(
            "offline: refusing to download {}",
            spec.file_name()
        )))
    }
}

/// Mac signer that records what it was asked to sign.
#[derive(Debug, Default)]
pub struct RecordingSigner {
    pub signed: Mutex<Vec<PathBuf>>,
    pub notarized: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl MacSigner for RecordingSigner {
    async fn sign(&self, app: &Path, _platform: &Platform, _options: &MacSignOptions) -> Result<()> {
        self.signed.lock().unwrap().push(app.to_path_buf());
        Ok(())
    }

    async fn notarize(&self, app: &Path) -> Result<()> {
        self.notarized.lock().unwrap().push(app.to_path_buf());
        Ok(())
    }
}

/// Merger that keeps the x64 slice and records the inputs.
#[derive(Debug, Default)]
pub struct CopyingMerger {
    pub merged: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl UniversalMerger for CopyingMerger {
    async fn merge(
        &self,
        x64_app: &Path,
        arm64_app: &Path,
        output: &Path,
        _options: &UniversalOptions,
    ) -> Result<()> {
        self.merged
            .lock()
            .unwrap()
            .push((x64_app.to_path_buf(), arm64_app.to_path_buf()));
        bfs::copy_dir(x64_app, output).await
    }
}

pub fn offline() -> Collaborators {
    Collaborators {
        downloader: Arc::new(OfflineDownloader),
        ..Collaborators::default()
    }
}

pub fn quiet() -> OutputManager {
    OutputManager::new(false, true)
}
