//! Metadata inference from `package.json`.
//!
//! Fills the name, app version, Electron version and Windows company name
//! that the caller left unset. The result is a new [`ResolvedOptions`]; the
//! caller's [`Options`] are carried along untouched.

pub mod search;

use crate::bundler::{Error, ErrorExt, Result};
use crate::bundler::settings::{Options, ResolvedOptions};
use crate::bundler::targets::Platform;
use path_absolutize::Absolutize;
use search::{Found, FoundProperties, PropertyGroup};
use semver::Version;
use serde_json::Value;
use std::path::Path;

/// Packages whose version determines the Electron runtime, in priority order.
pub const ELECTRON_PACKAGES: &[&str] = &[
    "electron",
    "electron-nightly",
    "electron-prebuilt-compile",
    "electron-prebuilt",
];

const NAME: &str = "name";
const APP_VERSION: &str = "version";
const ELECTRON: &str = "electron";
const AUTHOR: &str = "author";

fn missing_message(description: &str, anchor: &str) -> String {
    format!(
        "Unable to determine {description}. Please specify an {description}\n\n\
         For more information, please see\n\
         https://electron.github.io/packager/main/interfaces/Options.html#{anchor}\n"
    )
}

/// Resolves everything packaging needs from `options` and the manifests
/// above `options.dir`.
///
/// A missing name or Electron version is fatal; anything else that cannot
/// be found is left unset.
pub async fn infer(options: Options, platforms: &[Platform]) -> Result<ResolvedOptions> {
    let cwd = std::env::current_dir().fs_context("reading current directory", ".")?;
    let dir = options
        .dir
        .absolutize_from(&cwd)
        .fs_context("resolving app directory", &options.dir)?
        .into_owned();
    let out = match &options.out {
        Some(out) => out
            .absolutize_from(&cwd)
            .fs_context("resolving output directory", out)?
            .into_owned(),
        None => cwd.clone(),
    };

    let wants_author = platforms.contains(&Platform::Win32)
        && options.windows.win32_metadata.company_name.is_none();
    let groups = requested_groups(&options, wants_author);

    let found = if groups.is_empty() {
        FoundProperties::new()
    } else {
        match search::search(&dir, &groups).await? {
            Ok(found) => found,
            Err(missing) => {
                for key in &missing.missing {
                    match *key {
                        NAME => {
                            return Err(Error::Metadata(missing_message("application name", "name")));
                        }
                        ELECTRON => {
                            return Err(Error::Metadata(missing_message(
                                "Electron version",
                                "electronversion",
                            )));
                        }
                        other => log::debug!("Could not infer {} from package.json", other),
                    }
                }
                missing.found
            }
        }
    };

    let name = match &options.name {
        Some(name) => name.clone(),
        None => string_value(required(&found, NAME)?)?,
    };
    let electron_version = match &options.electron_version {
        Some(version) => parse_version(version)?,
        None => electron_version(required(&found, ELECTRON)?).await?,
    };
    let app_version = match &options.app_version {
        Some(version) => Some(version.clone()),
        None => found
            .get(APP_VERSION)
            .and_then(|f| f.value.as_str())
            .map(str::to_string),
    };

    let mut win32_metadata = options.windows.win32_metadata.clone();
    if wants_author && let Some(author) = found.get(AUTHOR).and_then(|f| author_name(&f.value)) {
        log::debug!("Inferring win32 CompanyName from author: {}", author);
        win32_metadata.company_name = Some(author);
    }

    log::debug!(
        "Resolved name={} electron={} app_version={:?}",
        name,
        electron_version,
        app_version
    );

    Ok(ResolvedOptions {
        name,
        electron_version,
        app_version,
        win32_metadata,
        dir,
        out,
        cwd,
        options,
    })
}

fn requested_groups(options: &Options, wants_author: bool) -> Vec<PropertyGroup> {
    let mut groups = Vec::new();
    if options.name.is_none() {
        groups.push(PropertyGroup::new(NAME, ["productName", "name"]));
    }
    if options.app_version.is_none() {
        groups.push(PropertyGroup::new(APP_VERSION, ["version"]));
    }
    if options.electron_version.is_none() {
        let alternatives = ELECTRON_PACKAGES.iter().flat_map(|package| {
            [
                format!("dependencies.{package}"),
                format!("devDependencies.{package}"),
            ]
        });
        groups.push(PropertyGroup::new(ELECTRON, alternatives));
    }
    if wants_author {
        groups.push(PropertyGroup::new(AUTHOR, ["author"]));
    }
    groups
}

fn required<'a>(found: &'a FoundProperties, key: &'static str) -> Result<&'a Found> {
    found
        .get(key)
        .ok_or_else(|| Error::Metadata(format!("{key} was not found in package.json")))
}

fn string_value(found: &Found) -> Result<String> {
    found
        .value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Metadata(format!("{} in {} is not a string", found.prop, found.source.display())))
}

fn parse_version(version: &str) -> Result<Version> {
    Ok(Version::parse(version.trim().trim_start_matches('v'))?)
}

/// Version of the installed Electron package, or the declared version when
/// it is exact.
async fn electron_version(found: &Found) -> Result<Version> {
    let package = found
        .prop
        .split_once('.')
        .map(|(_, package)| package)
        .unwrap_or(found.prop.as_str());
    let manifest_dir = found.source.parent().unwrap_or(Path::new("."));

    if let Some(installed) = installed_version(manifest_dir, package).await? {
        log::debug!("Using installed {} version {}", package, installed);
        return Ok(installed);
    }

    let declared = string_value(found)?;
    parse_version(&declared).map_err(|_| {
        Error::Metadata(format!(
            "{}\n\"{}\" is declared as \"{}\" in {} but is not installed and is not an exact version",
            missing_message("Electron version", "electronversion").trim_end(),
            package,
            declared,
            found.source.display()
        ))
    })
}

async fn installed_version(from: &Path, package: &str) -> Result<Option<Version>> {
    let mut dir = Some(from);
    while let Some(current) = dir {
        let manifest = current.join("node_modules").join(package).join("package.json");
        if tokio::fs::try_exists(&manifest).await.unwrap_or(false) {
            let contents = tokio::fs::read_to_string(&manifest)
                .await
                .fs_context("reading package manifest", &manifest)?;
            let value: Value = serde_json::from_str(&contents)?;
            if let Some(version) = value.get("version").and_then(Value::as_str) {
                return Ok(Some(parse_version(version)?));
            }
        }
        dir = current.parent();
    }
    Ok(None)
}

/// `"Name <email> (url)"` or `{ "name": "Name" }` to `Name`.
pub fn author_name(author: &Value) -> Option<String> {
    let name = match author {
        Value::String(text) => text
            .split(['<', '('])
            .next()
            .unwrap_or_default()
            .trim()
            .to_string(),
        Value::Object(map) => map.get("name")?.as_str()?.trim().to_string(),
        _ => return None,
    };
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app(manifest: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("package.json"), manifest).unwrap();
        tmp
    }

    #[tokio::test]
    async fn infers_from_installed_electron() {
        let tmp = app(
            r#"{"productName":"Basic App","name":"basic-app","version":"1.0.0",
                "author":"Jane Doe <jane@example.com> (https://example.com)",
                "devDependencies":{"electron":"^27.0.0"}}"#,
        );
        let electron = tmp.path().join("node_modules/electron");
        std::fs::create_dir_all(&electron).unwrap();
        std::fs::write(electron.join("package.json"), r#"{"version":"27.1.3"}"#).unwrap();

        let resolved = infer(Options::new(tmp.path()), &[Platform::Win32]).await.unwrap();
        assert_eq!(resolved.name, "Basic App");
        assert_eq!(resolved.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(resolved.electron_version, Version::new(27, 1, 3));
        assert_eq!(resolved.win32_metadata.company_name.as_deref(), Some("Jane Doe"));
        assert!(resolved.options.name.is_none());
    }

    #[tokio::test]
    async fn exact_declared_version_is_accepted() {
        let tmp = app(r#"{"name":"app","dependencies":{"electron-nightly":"28.0.0-nightly.20231010"}}"#);
        let resolved = infer(Options::new(tmp.path()), &[Platform::Linux]).await.unwrap();
        assert_eq!(resolved.electron_version.to_string(), "28.0.0-nightly.20231010");
        assert!(resolved.app_version.is_none());
    }

    #[tokio::test]
    async fn range_without_install_is_fatal() {
        let tmp = app(r#"{"name":"app","devDependencies":{"electron":"^27.0.0"}}"#);
        let err = infer(Options::new(tmp.path()), &[Platform::Linux]).await.unwrap_err();
        assert!(err.to_string().contains("Unable to determine Electron version"));
    }

    #[tokio::test]
    async fn missing_electron_is_fatal() {
        let tmp = app(r#"{"name":"app"}"#);
        let err = infer(Options::new(tmp.path()), &[Platform::Linux]).await.unwrap_err();
        assert!(matches!(err, Error::Metadata(_)));
    }

    #[tokio::test]
    async fn explicit_options_skip_the_search() {
        let tmp = tempfile::tempdir().unwrap();
        let mut options = Options::new(tmp.path());
        options.name = Some("Explicit".into());
        options.electron_version = Some("v27.0.0".into());
        options.app_version = Some("2.0.0".into());

        let resolved = infer(options, &[Platform::Darwin]).await.unwrap();
        assert_eq!(resolved.name, "Explicit");
        assert_eq!(resolved.electron_version, Version::new(27, 0, 0));
    }

    #[test]
    fn author_forms() {
        assert_eq!(author_name(&json!("Jane <j@x.io>")).as_deref(), Some("Jane"));
        assert_eq!(author_name(&json!({"name": "Acme"})).as_deref(), Some("Acme"));
        assert_eq!(author_name(&json!(42)), None);
    }
}
