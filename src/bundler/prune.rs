//! devDependency pruning.
//!
//! [`DependencyGraph`] walks `node_modules` the way Node resolves modules and
//! records every dependency edge. [`Pruner`] walks it once, on the first
//! query, and from then on answers with set lookups.

use crate::bundler::error::{Error, ErrorExt, Result};
use crate::output::OutputManager;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Packages that provide the Electron runtime itself. They are never
/// bundled, even when declared as production dependencies.
pub const ELECTRON_MODULES: &[&str] = &[
    "electron",
    "electron-nightly",
    "electron-prebuilt",
    "electron-prebuilt-compile",
];

/// How a dependency was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    /// `dependencies`
    Prod,
    /// `optionalDependencies`
    Optional,
    /// `devDependencies` (root package only)
    Dev,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageManifest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    optional_dependencies: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: BTreeMap<String, serde_json::Value>,
}

impl PackageManifest {
    async fn read(module_dir: &Path) -> Result<Self> {
        let path = module_dir.join("package.json");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .fs_context("reading package manifest", &path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn declared(&self, include_dev: bool) -> Vec<(&str, DepKind)> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut declared = Vec::new();
        let mut groups = vec![
            (&self.dependencies, DepKind::Prod),
            (&self.optional_dependencies, DepKind::Optional),
        ];
        if include_dev {
            groups.push((&self.dev_dependencies, DepKind::Dev));
        }
        for (deps, kind) in groups {
            for name in deps.keys() {
                if seen.insert(name.as_str()) {
                    declared.push((name.as_str(), kind));
                }
            }
        }
        declared
    }
}

/// One installed package.
#[derive(Debug, Clone)]
pub struct ModuleNode {
    /// Package name as declared by its dependent
    pub name: String,
    /// Directory containing the package's `package.json`
    pub path: PathBuf,
}

/// Installed dependency tree of a project.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ModuleNode, DepKind>,
    root: NodeIndex,
}

impl DependencyGraph {
    /// Walks every module reachable from `base_dir/package.json`.
    ///
    /// Missing optional and dev modules are skipped. A missing production
    /// module is an error.
    pub async fn walk(base_dir: &Path) -> Result<Self> {
        let root_manifest = PackageManifest::read(base_dir).await?;
        let mut graph = DiGraph::new();
        let root = graph.add_node(ModuleNode {
            name: root_manifest.name.clone().unwrap_or_default(),
            path: base_dir.to_path_buf(),
        });

        let mut by_path: HashMap<PathBuf, NodeIndex> = HashMap::new();
        by_path.insert(base_dir.to_path_buf(), root);

        let mut queue: VecDeque<(NodeIndex, PackageManifest)> = VecDeque::new();
        queue.push_back((root, root_manifest));

        while let Some((index, manifest)) = queue.pop_front() {
            let module_dir = graph[index].path.clone();
            let required_by = graph[index].name.clone();

            for (name, kind) in manifest.declared(index == root) {
                let Some(found) = resolve_module(&module_dir, name).await else {
                    if kind == DepKind::Prod {
                        return Err(Error::MissingModule {
                            module: name.to_string(),
                            required_by,
                        });
                    }
                    log::debug!("Skipping missing {:?} module {} of {}", kind, name, required_by);
                    continue;
                };

                let child = match by_path.get(&found) {
                    Some(child) => *child,
                    None => {
                        let child_manifest = PackageManifest::read(&found).await?;
                        let child = graph.add_node(ModuleNode {
                            name: name.to_string(),
                            path: found.clone(),
                        });
                        by_path.insert(found, child);
                        queue.push_back((child, child_manifest));
                        child
                    }
                };
                graph.add_edge(index, child, kind);
            }
        }

        log::debug!("Walked {} modules under {}", graph.node_count(), base_dir.display());
        Ok(Self { graph, root })
    }

    /// Modules reachable from the root without crossing a devDependency edge.
    pub fn production_modules(&self) -> Vec<&ModuleNode> {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue = VecDeque::from([self.root]);
        visited.insert(self.root);

        while let Some(index) = queue.pop_front() {
            for edge in self.graph.edges_directed(index, Direction::Outgoing) {
                if *edge.weight() == DepKind::Dev {
                    continue;
                }
                if visited.insert(edge.target()) {
                    queue.push_back(edge.target());
                }
            }
        }

        visited
            .into_iter()
            .filter(|index| *index != self.root)
            .map(|index| &self.graph[index])
            .collect()
    }

    /// Number of installed modules found, root excluded.
    pub fn module_count(&self) -> usize {
        self.graph.node_count().saturating_sub(1)
    }
}

/// Node module resolution: `node_modules/<name>` in the requiring module's
/// directory, then each ancestor up to the filesystem root.
///
/// Modules hoisted above the project (workspace roots) resolve too; they have
/// no [`module_key`] under the project and so are never copied.
async fn resolve_module(from: &Path, name: &str) -> Option<PathBuf> {
    let mut dir = Some(from);
    while let Some(current) = dir {
        if current.file_name().is_some_and(|n| n == "node_modules") {
            dir = current.parent();
            continue;
        }
        let candidate = current.join("node_modules").join(name);
        if tokio::fs::try_exists(candidate.join("package.json"))
            .await
            .unwrap_or(false)
        {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

/// `/node_modules/...` key of a module directory, relative to `base_dir`.
pub fn module_key(base_dir: &Path, module_dir: &Path) -> Option<String> {
    let relative = module_dir.strip_prefix(base_dir).ok()?;
    let mut key = String::new();
    for component in relative.components() {
        key.push('/');
        key.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(key)
}

enum PrunerState {
    Unwalked,
    Walked(Arc<HashSet<String>>),
}

/// Decides which `node_modules` entries survive the copy.
pub struct Pruner {
    base_dir: PathBuf,
    output: OutputManager,
    state: Mutex<PrunerState>,
    walks: AtomicUsize,
}

impl Pruner {
    /// Creates an unwalked pruner for the project at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, output: OutputManager) -> Self {
        Self {
            base_dir: base_dir.into(),
            output,
            state: Mutex::new(PrunerState::Unwalked),
            walks: AtomicUsize::new(0),
        }
    }

    /// Whether the module at `/node_modules/...` key `name` is kept.
    pub async fn should_keep(&self, name: &str) -> Result<bool> {
        let kept = self.ensure_walked().await?;
        Ok(kept.contains(name))
    }

    /// How many times the dependency tree has been walked (0 or 1).
    pub fn walk_count(&self) -> usize {
        self.walks.load(Ordering::SeqCst)
    }

    async fn ensure_walked(&self) -> Result<Arc<HashSet<String>>> {
        let mut state = self.state.lock().await;
        if let PrunerState::Walked(kept) = &*state {
            return Ok(Arc::clone(kept));
        }

        self.walks.fetch_add(1, Ordering::SeqCst);
        let graph = DependencyGraph::walk(&self.base_dir).await?;
        let kept = Arc::new(self.keepable(&graph));
        log::debug!(
            "Keeping {} of {} modules in {}",
            kept.len(),
            graph.module_count(),
            self.base_dir.display()
        );
        *state = PrunerState::Walked(Arc::clone(&kept));
        Ok(kept)
    }

    fn keepable(&self, graph: &DependencyGraph) -> HashSet<String> {
        let mut kept = HashSet::new();
        for module in graph.production_modules() {
            if ELECTRON_MODULES.contains(&module.name.as_str()) {
                let _ = self.output.warn(&format!(
                    "Found '{}' but not as a devDependency, pruning anyway",
                    module.name
                ));
                continue;
            }
            if let Some(key) = module_key(&self.base_dir, &module.path) {
                kept.insert(key);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_module(dir: &Path, manifest: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("package.json"), manifest).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write_module(
            root,
            r#"{"name":"app","dependencies":{"run-a":"1","electron":"27.0.0"},
                "optionalDependencies":{"not-installed":"1"},
                "devDependencies":{"dev-b":"1","missing-dev":"1"}}"#,
        );
        write_module(
            &root.join("node_modules/run-a"),
            r#"{"name":"run-a","dependencies":{"@scope/deep":"1"}}"#,
        );
        write_module(
            &root.join("node_modules/@scope/deep"),
            r#"{"name":"@scope/deep","dependencies":{"nested":"2"}}"#,
        );
        write_module(
            &root.join("node_modules/@scope/deep/node_modules/nested"),
            r#"{"name":"nested"}"#,
        );
        write_module(
            &root.join("node_modules/dev-b"),
            r#"{"name":"dev-b","dependencies":{"dev-only-child":"1"}}"#,
        );
        write_module(
            &root.join("node_modules/dev-only-child"),
            r#"{"name":"dev-only-child"}"#,
        );
        write_module(&root.join("node_modules/electron"), r#"{"name":"electron"}"#);
        tmp
    }

    #[tokio::test]
    async fn keeps_production_tree_and_prunes_dev() {
        let tmp = fixture();
        let pruner = Pruner::new(tmp.path(), OutputManager::new(false, true));

        assert!(pruner.should_keep("/node_modules/run-a").await.unwrap());
        assert!(pruner.should_keep("/node_modules/@scope/deep").await.unwrap());
        assert!(
            pruner
                .should_keep("/node_modules/@scope/deep/node_modules/nested")
                .await
                .unwrap()
        );
        assert!(!pruner.should_keep("/node_modules/dev-b").await.unwrap());
        assert!(!pruner.should_keep("/node_modules/dev-only-child").await.unwrap());
        assert!(!pruner.should_keep("/node_modules/electron").await.unwrap());
        assert!(!pruner.should_keep("/node_modules/unrelated").await.unwrap());
        assert_eq!(pruner.walk_count(), 1);
    }

    #[tokio::test]
    async fn missing_production_module_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_module(tmp.path(), r#"{"name":"app","dependencies":{"gone":"1"}}"#);
        let err = DependencyGraph::walk(tmp.path()).await.unwrap_err();
        assert!(matches!(err, Error::MissingModule { ref module, .. } if module == "gone"));
    }

    #[tokio::test]
    async fn hoisted_workspace_dependencies_resolve_but_are_not_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace = tmp.path();
        let app = workspace.join("packages/app");
        write_module(workspace, r#"{"name":"monorepo","private":true}"#);
        write_module(
            &app,
            r#"{"name":"app","dependencies":{"hoisted":"1","local":"1"}}"#,
        );
        write_module(
            &workspace.join("node_modules/hoisted"),
            r#"{"name":"hoisted"}"#,
        );
        write_module(&app.join("node_modules/local"), r#"{"name":"local"}"#);

        let graph = DependencyGraph::walk(&app).await.unwrap();
        let mut names: Vec<_> = graph
            .production_modules()
            .into_iter()
            .map(|module| module.name.clone())
            .collect();
        names.sort();
        assert_eq!(names, ["hoisted", "local"]);

        let pruner = Pruner::new(&app, OutputManager::new(false, true));
        assert!(pruner.should_keep("/node_modules/local").await.unwrap());
        assert!(!pruner.should_keep("/node_modules/hoisted").await.unwrap());
    }

    #[test]
    fn module_keys_use_forward_slashes() {
        let key = module_key(
            Path::new("/app"),
            &Path::new("/app").join("node_modules").join("@s").join("x"),
        );
        assert_eq!(key.as_deref(), Some("/node_modules/@s/x"));
    }
}
