//! File inclusion rules for copying an app into its bundle.
//!
//! A path is copied only when every check passes, in order: it is not a
//! previous build's output directory, its basename is not junk, and either
//! the [`Pruner`] keeps it (module roots under `node_modules` when pruning)
//! or the user's [`IgnoreRule`] does not reject it.

use crate::bundler::error::{ErrorExt, Result};
use crate::bundler::prune::Pruner;
use crate::bundler::targets::Platform;
use crate::bundler::utils::{fs as bfs, naming};
use crate::output::OutputManager;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Patterns appended to every pattern-based ignore rule.
pub const DEFAULT_IGNORES: &[&str] = &[
    r"/package-lock\.json$",
    r"/yarn\.lock$",
    r"/pnpm-lock\.yaml$",
    r"/\.git($|/)",
    r"/node_modules/\.bin($|/)",
    r"\.o(bj)?$",
    r"/node_gyp_bins($|/)",
    r"/electron-bundler($|/)",
];

/// Predicate form of an ignore rule; `true` rejects the path.
pub type IgnorePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// User-supplied ignore rule, matched against `/`-prefixed paths relative to
/// the app directory.
#[derive(Clone)]
pub enum IgnoreRule {
    /// Reject paths matching any pattern. Plain strings are regexes too.
    Patterns(Vec<Regex>),
    /// Reject paths for which the predicate returns `true`.
    Predicate(IgnorePredicate),
}

impl IgnoreRule {
    /// Compiles string patterns.
    pub fn patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(IgnoreRule::Patterns(compiled))
    }

    /// Wraps a predicate.
    pub fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        IgnoreRule::Predicate(Arc::new(f))
    }

    fn with_defaults(user: Option<&IgnoreRule>) -> Result<IgnoreRule> {
        match user {
            Some(IgnoreRule::Predicate(f)) => Ok(IgnoreRule::Predicate(Arc::clone(f))),
            Some(IgnoreRule::Patterns(patterns)) => {
                let mut all = patterns.clone();
                for pattern in DEFAULT_IGNORES {
                    all.push(Regex::new(pattern)?);
                }
                Ok(IgnoreRule::Patterns(all))
            }
            None => IgnoreRule::patterns(DEFAULT_IGNORES),
        }
    }

    /// Whether this rule rejects `name`.
    pub fn rejects(&self, name: &str) -> bool {
        match self {
            IgnoreRule::Patterns(patterns) => patterns.iter().any(|p| p.is_match(name)),
            IgnoreRule::Predicate(f) => f(name),
        }
    }
}

impl fmt::Debug for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreRule::Patterns(patterns) => f
                .debug_tuple("Patterns")
                .field(&patterns.iter().map(Regex::as_str).collect::<Vec<_>>())
                .finish(),
            IgnoreRule::Predicate(_) => f.write_str("Predicate"),
        }
    }
}

/// OS and editor clutter that never belongs in a bundle.
pub fn is_junk(basename: &str) -> bool {
    matches!(
        basename,
        "npm-debug.log"
            | ".DS_Store"
            | ".AppleDouble"
            | ".LSOverride"
            | "Icon\r"
            | ".Spotlight-V100"
            | ".Trashes"
            | "__MACOSX"
            | "Thumbs.db"
            | "ehthumbs.db"
            | "Desktop.ini"
            | "desktop.ini"
    ) || basename.starts_with("._")
        || (basename.starts_with('.') && basename.ends_with(".swp"))
        || basename.ends_with('~')
        || basename.ends_with("@eaDir")
}

/// Output directories a copy must never descend into.
///
/// When `out` is unset or is the working directory, every official final
/// path under the working directory is excluded; otherwise just `out`.
pub fn ignored_out_dirs(name: &str, out: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    match out {
        Some(out) if out != cwd => vec![out.to_path_buf()],
        _ => Platform::OFFICIAL
            .iter()
            .flat_map(|platform| {
                platform
                    .official_archs()
                    .iter()
                    .map(move |arch| naming::final_path(cwd, name, platform.as_str(), arch.as_str()))
            })
            .collect(),
    }
}

/// Composite inclusion predicate for one copy of an app directory.
pub struct CopyFilter {
    src_dir: PathBuf,
    ignored_out_dirs: Vec<PathBuf>,
    junk: bool,
    rule: IgnoreRule,
    pruner: Option<Pruner>,
}

impl CopyFilter {
    /// Builds the filter; `src_dir` and `ignored_out_dirs` must be absolute.
    pub fn new(
        src_dir: impl Into<PathBuf>,
        ignored_out_dirs: Vec<PathBuf>,
        junk: bool,
        ignore: Option<&IgnoreRule>,
        prune: bool,
        output: &OutputManager,
    ) -> Result<Self> {
        let src_dir = src_dir.into();
        let rule = IgnoreRule::with_defaults(ignore)?;
        log::debug!("Ignore rule for {}: {:?}", src_dir.display(), rule);
        let pruner = prune.then(|| Pruner::new(src_dir.clone(), output.clone()));
        Ok(Self {
            src_dir,
            ignored_out_dirs,
            junk,
            rule,
            pruner,
        })
    }

    /// The pruner consulted for module roots, when pruning.
    pub fn pruner(&self) -> Option<&Pruner> {
        self.pruner.as_ref()
    }

    /// `/`-prefixed, forward-slash path of `path` relative to the app dir.
    pub fn relative_name(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.src_dir).ok()?;
        let mut name = String::new();
        for component in relative.components() {
            name.push('/');
            name.push_str(&component.as_os_str().to_string_lossy());
        }
        Some(name)
    }

    /// Whether `path` (inside the app dir) should be copied.
    pub async fn accept(&self, path: &Path) -> Result<bool> {
        if self.ignored_out_dirs.iter().any(|dir| dir == path) {
            return Ok(false);
        }

        if self.junk
            && let Some(basename) = path.file_name()
            && is_junk(&basename.to_string_lossy())
        {
            return Ok(false);
        }

        let Some(name) = self.relative_name(path) else {
            return Ok(true);
        };

        if let Some(pruner) = &self.pruner
            && name.starts_with("/node_modules/")
            && is_module_root(path).await
        {
            return pruner.should_keep(&name).await;
        }

        Ok(!self.rule.rejects(&name))
    }

    /// Copies the app directory into `dest`, skipping rejected paths.
    ///
    /// A rejected directory is not descended into. Symlinks are followed
    /// when `deref_symlinks`, otherwise recreated as links.
    pub async fn copy_tree(&self, dest: &Path, deref_symlinks: bool) -> Result<()> {
        tokio::fs::create_dir_all(dest)
            .await
            .fs_context("creating app directory", dest)?;

        let mut pending = vec![(self.src_dir.clone(), dest.to_path_buf())];
        while let Some((from_dir, to_dir)) = pending.pop() {
            for entry in bfs::read_dir_sorted(&from_dir).await? {
                if !self.accept(&entry).await? {
                    log::debug!("Ignoring {}", entry.display());
                    continue;
                }
                let Some(file_name) = entry.file_name() else {
                    continue;
                };
                let target = to_dir.join(file_name);

                let link_meta = tokio::fs::symlink_metadata(&entry)
                    .await
                    .fs_context("reading metadata", &entry)?;
                if link_meta.file_type().is_symlink() && !deref_symlinks {
                    bfs::copy_symlink(&entry, &target).await?;
                    continue;
                }

                let meta = tokio::fs::metadata(&entry)
                    .await
                    .fs_context("reading metadata", &entry)?;
                if meta.is_dir() {
                    tokio::fs::create_dir_all(&target)
                        .await
                        .fs_context("creating directory", &target)?;
                    pending.push((entry, target));
                } else {
                    tokio::fs::copy(&entry, &target)
                        .await
                        .fs_context("copying file", &entry)?;
                }
            }
        }
        Ok(())
    }
}

/// A package root directly under `node_modules`, or under
/// `node_modules/@scope`.
async fn is_module_root(path: &Path) -> bool {
    let has_manifest = tokio::fs::try_exists(path.join("package.json"))
        .await
        .unwrap_or(false);
    if !has_manifest {
        return false;
    }
    let parent = path.parent();
    let parent_name = parent.and_then(Path::file_name);
    if parent_name.is_some_and(|n| n == "node_modules") {
        return true;
    }
    let grandparent_name = parent.and_then(Path::parent).and_then(Path::file_name);
    grandparent_name.is_some_and(|n| n == "node_modules")
        && parent_name.is_some_and(|n| n.to_string_lossy().starts_with('@'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn quiet() -> OutputManager {
        OutputManager::new(false, true)
    }

    fn filter(src: &Path, ignore: Option<&IgnoreRule>) -> CopyFilter {
        CopyFilter::new(src, Vec::new(), true, ignore, false, &quiet()).unwrap()
    }

    #[test]
    fn default_ignores_apply_without_user_rule() {
        let rule = IgnoreRule::with_defaults(None).unwrap();
        assert!(rule.rejects("/package-lock.json"));
        assert!(rule.rejects("/.git"));
        assert!(rule.rejects("/.git/HEAD"));
        assert!(rule.rejects("/node_modules/.bin/tool"));
        assert!(rule.rejects("/build/addon.obj"));
        assert!(!rule.rejects("/.gitignore"));
        assert!(!rule.rejects("/src/index.js"));
    }

    #[test]
    fn predicate_rules_skip_defaults() {
        let user = IgnoreRule::predicate(|name| name.ends_with(".map"));
        let rule = IgnoreRule::with_defaults(Some(&user)).unwrap();
        assert!(rule.rejects("/app.js.map"));
        assert!(!rule.rejects("/package-lock.json"));
    }

    #[test]
    fn patterns_apply_as_regexes() {
        let user = IgnoreRule::patterns(["^/docs($|/)", r"\.test\.js$", "a+b"]).unwrap();
        let rule = IgnoreRule::with_defaults(Some(&user)).unwrap();
        assert!(rule.rejects("/docs/readme.md"));
        assert!(rule.rejects("/src/app.test.js"));
        assert!(rule.rejects("/aaab"));
        assert!(!rule.rejects("/src/docs/readme.md"));
        assert!(!rule.rejects("/a+b"));
        assert!(rule.rejects("/yarn.lock"));
    }

    #[test]
    fn junk_detection() {
        for junk in [".DS_Store", "Thumbs.db", "._resource", "file.txt~", ".main.js.swp", "npm-debug.log"] {
            assert!(is_junk(junk), "{junk} should be junk");
        }
        for keep in ["index.js", ".env", "Desktop", "swp"] {
            assert!(!is_junk(keep), "{keep} should not be junk");
        }
    }

    #[test]
    fn out_dirs_cover_every_official_combo_in_cwd() {
        let dirs = ignored_out_dirs("App", None, Path::new("/work"));
        assert_eq!(dirs.len(), 14);
        assert!(dirs.contains(&PathBuf::from("/work/App-linux-x64")));
        assert!(dirs.contains(&PathBuf::from("/work/App-darwin-universal")));

        let explicit = ignored_out_dirs("App", Some(Path::new("/work/dist")), Path::new("/work"));
        assert_eq!(explicit, vec![PathBuf::from("/work/dist")]);
    }

    #[tokio::test]
    async fn matching_is_relative_to_source_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("docs").join("app");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("index.js"), "").unwrap();

        let user = IgnoreRule::patterns(["/docs/"]).unwrap();
        let filter = filter(&src, Some(&user));
        assert!(filter.accept(&src.join("index.js")).await.unwrap());
        assert_eq!(filter.relative_name(&src.join("index.js")).as_deref(), Some("/index.js"));
    }

    #[tokio::test]
    async fn out_dir_inside_source_is_skipped_but_prefix_siblings_are_not() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path();
        fs::create_dir_all(src.join("out")).unwrap();
        fs::create_dir_all(src.join("out-assets")).unwrap();
        fs::write(src.join("out/stale.txt"), "old").unwrap();
        fs::write(src.join("out-assets/logo.txt"), "logo").unwrap();
        fs::write(src.join("index.js"), "").unwrap();

        let filter = CopyFilter::new(
            src,
            ignored_out_dirs("App", Some(&src.join("out")), Path::new("/elsewhere")),
            true,
            None,
            false,
            &quiet(),
        )
        .unwrap();

        let dest = tempfile::tempdir().unwrap();
        filter.copy_tree(dest.path(), true).await.unwrap();
        assert!(dest.path().join("index.js").exists());
        assert!(dest.path().join("out-assets/logo.txt").exists());
        assert!(!dest.path().join("out").exists());
    }

    #[tokio::test]
    async fn copy_tree_prunes_dev_modules() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path();
        fs::write(
            src.join("package.json"),
            r#"{"name":"app","dependencies":{"keep":"1"},"devDependencies":{"drop":"1"}}"#,
        )
        .unwrap();
        for (module, file) in [("keep", "index.js"), ("drop", "index.js")] {
            let dir = src.join("node_modules").join(module);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("package.json"), format!(r#"{{"name":"{module}"}}"#)).unwrap();
            fs::write(dir.join(file), "").unwrap();
        }
        fs::create_dir_all(src.join("node_modules/.bin")).unwrap();
        fs::write(src.join("node_modules/.bin/keep"), "").unwrap();

        let filter = CopyFilter::new(src, Vec::new(), true, None, true, &quiet()).unwrap();
        let dest = tempfile::tempdir().unwrap();
        filter.copy_tree(dest.path(), true).await.unwrap();

        assert!(dest.path().join("node_modules/keep/index.js").exists());
        assert!(!dest.path().join("node_modules/drop").exists());
        assert!(!dest.path().join("node_modules/.bin").exists());
        assert_eq!(filter.pruner().map(Pruner::walk_count), Some(1));
    }
}
