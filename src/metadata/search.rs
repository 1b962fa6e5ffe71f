//! Ancestor `package.json` property search.

use crate::bundler::{ErrorExt, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A property to find, given as alternative dotted paths in priority order.
#[derive(Debug, Clone)]
pub struct PropertyGroup {
    /// Key the result is stored under
    pub key: &'static str,
    /// Dotted paths such as `devDependencies.electron`
    pub alternatives: Vec<String>,
}

impl PropertyGroup {
    /// Group with the given alternatives.
    pub fn new<I, S>(key: &'static str, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            key,
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }
}

/// A property value and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Found {
    /// The JSON value
    pub value: Value,
    /// Manifest the value was read from
    pub source: PathBuf,
    /// Dotted path that matched
    pub prop: String,
}

/// Results keyed by [`PropertyGroup::key`].
pub type FoundProperties = BTreeMap<&'static str, Found>;

/// Some groups matched nowhere between the start directory and the root.
#[derive(Debug, thiserror::Error)]
#[error("missing properties in package.json: {}", missing.join(", "))]
pub struct MissingProperties {
    /// Groups that were found
    pub found: FoundProperties,
    /// Keys of groups that were not
    pub missing: Vec<&'static str>,
}

/// Outcome of a search: all groups found, or the partial result.
pub type SearchResult = std::result::Result<FoundProperties, MissingProperties>;

/// Looks up each group in the nearest ancestor manifest that has it.
///
/// Unreadable manifests are errors; a directory without a manifest is
/// passed over.
pub async fn search(start: &Path, groups: &[PropertyGroup]) -> Result<SearchResult> {
    let mut found = FoundProperties::new();
    let mut dir = Some(start);

    while let Some(current) = dir {
        if found.len() == groups.len() {
            break;
        }
        let manifest_path = current.join("package.json");
        if tokio::fs::try_exists(&manifest_path).await.unwrap_or(false) {
            let contents = tokio::fs::read_to_string(&manifest_path)
                .await
                .fs_context("reading package manifest", &manifest_path)?;
            let manifest: Value = serde_json::from_str(&contents)?;

            for group in groups {
                if found.contains_key(group.key) {
                    continue;
                }
                if let Some((prop, value)) = group
                    .alternatives
                    .iter()
                    .find_map(|prop| lookup(&manifest, prop).map(|value| (prop, value)))
                {
                    log::debug!(
                        "Found {} as {} in {}",
                        group.key,
                        prop,
                        manifest_path.display()
                    );
                    found.insert(
                        group.key,
                        Found {
                            value: value.clone(),
                            source: manifest_path.clone(),
                            prop: prop.clone(),
                        },
                    );
                }
            }
        }
        dir = current.parent();
    }

    let missing: Vec<&'static str> = groups
        .iter()
        .map(|group| group.key)
        .filter(|key| !found.contains_key(key))
        .collect();
    if missing.is_empty() {
        Ok(Ok(found))
    } else {
        Ok(Err(MissingProperties { found, missing }))
    }
}

fn lookup<'a>(manifest: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(manifest, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nearest_manifest_wins_per_group() {
        let tmp = tempfile::tempdir().unwrap();
        let app = tmp.path().join("packages/app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(
            tmp.path().join("package.json"),
            r#"{"name":"workspace","devDependencies":{"electron":"27.0.0"}}"#,
        )
        .unwrap();
        std::fs::write(app.join("package.json"), r#"{"name":"app","version":"1.2.3"}"#).unwrap();

        let groups = [
            PropertyGroup::new("name", ["productName", "name"]),
            PropertyGroup::new("electron", ["dependencies.electron", "devDependencies.electron"]),
        ];
        let found = search(&app, &groups).await.unwrap().unwrap();

        assert_eq!(found["name"].value, "app");
        assert_eq!(found["name"].source, app.join("package.json"));
        assert_eq!(found["electron"].prop, "devDependencies.electron");
        assert_eq!(found["electron"].source, tmp.path().join("package.json"));
    }

    #[tokio::test]
    async fn missing_groups_keep_partial_result() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("package.json"), r#"{"productName":"Shiny"}"#).unwrap();

        let groups = [
            PropertyGroup::new("name", ["productName", "name"]),
            PropertyGroup::new("version", ["version"]),
        ];
        let missing = search(tmp.path(), &groups).await.unwrap().unwrap_err();

        assert_eq!(missing.missing, vec!["version"]);
        assert_eq!(missing.found["name"].prop, "productName");
    }
}
