//! Module name to library root resolution with a session-wide cache

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::host::{ModuleIndex, PackageIndex};
use crate::workspace::normalize_path;

/// Cached outcome of resolving a module name.
///
/// `resolved == false` is a negative result: the name was looked up and nothing
/// provides it. A name with no entry at all has never been looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub modpath: Option<PathBuf>,
    /// Normalized library root of `modpath`
    pub library: Option<PathBuf>,
    pub resolved: bool,
}

impl ResolutionEntry {
    fn found(modpath: PathBuf, source_dir: &str) -> Self {
        let library = normalize_path(&library_root(&modpath, source_dir));
        Self {
            modpath: Some(modpath),
            library: Some(library),
            resolved: true,
        }
    }

    fn missing() -> Self {
        Self {
            modpath: None,
            library: None,
            resolved: false,
        }
    }
}

/// Resolution cache keyed by module name only.
///
/// Entries are never invalidated: a module installed after a negative lookup
/// stays unresolved until the process restarts.
#[derive(Debug, Default)]
pub struct ResolverCache {
    entries: HashMap<String, ResolutionEntry>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ResolutionEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, name: &str, entry: ResolutionEntry) {
        self.entries.insert(name.to_string(), entry);
    }
}

/// Resolves module names to the library root that defines them
pub struct ModuleResolver {
    modules: Arc<dyn ModuleIndex>,
    packages: Arc<dyn PackageIndex>,
    source_dir: String,
    cache: ResolverCache,
}

impl ModuleResolver {
    pub fn new(
        cache: ResolverCache,
        modules: Arc<dyn ModuleIndex>,
        packages: Arc<dyn PackageIndex>,
        source_dir: impl Into<String>,
    ) -> Self {
        Self {
            modules,
            packages,
            source_dir: source_dir.into(),
            cache,
        }
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    /// Resolve `name` to its library root.
    ///
    /// Cached names (positive or negative) never reach the module or package index again.
    pub fn resolve(&mut self, name: &str) -> Option<PathBuf> {
        if let Some(entry) = self.cache.get(name) {
            debug!("Resolver cache hit for {} (resolved: {})", name, entry.resolved);
            return entry.library.clone();
        }

        let entry = match self.lookup(name) {
            Some(modpath) => {
                info!("Resolved module {} to {:?}", name, modpath);
                ResolutionEntry::found(modpath, &self.source_dir)
            }
            None => {
                debug!("Module {} not found, caching negative result", name);
                ResolutionEntry::missing()
            }
        };

        let library = entry.library.clone();
        self.cache.insert(name, entry);
        library
    }

    fn lookup(&self, name: &str) -> Option<PathBuf> {
        if !is_relative_module_name(name) {
            debug!("Refusing to search for module {:?} outside plugin sources", name);
            return None;
        }
        if let Some(loaded) = self.modules.find_loaded(name) {
            return Some(loaded.modpath);
        }

        let relative = name.replace('.', "/");
        self.packages
            .candidate_paths(name)
            .into_iter()
            .find_map(|root| {
                let src = root.join(&self.source_dir);
                [
                    src.join(format!("{relative}.lua")),
                    src.join(&relative).join("init.lua"),
                ]
                .into_iter()
                .find(|candidate| candidate.is_file())
            })
    }
}

/// Whether `name` maps to a path below a plugin's source directory.
///
/// Every `.` or `/` separated segment must be non-empty, which rules out
/// absolute names, leading dots and `..`.
fn is_relative_module_name(name: &str) -> bool {
    name.split(['.', '/']).all(|segment| !segment.is_empty())
}

/// Library root for a resolved module file.
///
/// Truncates `modpath` right after the first `source_dir` directory segment,
/// falling back to the file's containing directory.
pub fn library_root(modpath: &Path, source_dir: &str) -> PathBuf {
    let mut root = PathBuf::new();
    let mut components = modpath.components().peekable();
    while let Some(component) = components.next() {
        root.push(component);
        let is_dir = components.peek().is_some();
        if is_dir && matches!(component, Component::Normal(c) if c == source_dir) {
            return root;
        }
    }

    modpath
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| modpath.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{LoadedModule, MockModuleIndex, MockPackageIndex};
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn no_loaded_modules() -> MockModuleIndex {
        let mut modules = MockModuleIndex::new();
        modules.expect_find_loaded().returning(|_| None);
        modules
    }

    fn resolver(modules: MockModuleIndex, packages: MockPackageIndex) -> ModuleResolver {
        ModuleResolver::new(
            ResolverCache::new(),
            Arc::new(modules),
            Arc::new(packages),
            "lua",
        )
    }

    #[rstest]
    #[case("/plugins/foo/lua/foo/bar.lua", "/plugins/foo/lua")]
    #[case("/plugins/foo/lua/foo/init.lua", "/plugins/foo/lua")]
    #[case("/home/lua/plugins/foo/lua/foo.lua", "/home/lua")]
    #[case("/plugins/foo/plugin/foo.lua", "/plugins/foo/plugin")]
    #[case("/plugins/foo/lua", "/plugins/foo")]
    fn library_root_truncates_after_first_source_dir(
        #[case] modpath: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(
            library_root(Path::new(modpath), "lua"),
            PathBuf::from(expected)
        );
    }

    #[test]
    fn resolve_prefers_loaded_module_index() {
        let mut modules = MockModuleIndex::new();
        modules
            .expect_find_loaded()
            .withf(|name| name == "foo.bar")
            .times(1)
            .returning(|_| {
                Some(LoadedModule {
                    modpath: PathBuf::from("/plugins/foo/lua/foo/bar.lua"),
                })
            });
        let mut packages = MockPackageIndex::new();
        packages.expect_candidate_paths().times(0);

        let mut resolver = resolver(modules, packages);

        assert_eq!(
            resolver.resolve("foo.bar"),
            Some(PathBuf::from("/plugins/foo/lua"))
        );
    }

    #[test]
    fn resolve_searches_candidate_plugins_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let plugin = temp_dir.path().join("foo.nvim");
        fs::create_dir_all(plugin.join("lua/foo/bar")).unwrap();
        fs::write(plugin.join("lua/foo/bar/init.lua"), "return {}").unwrap();

        let mut packages = MockPackageIndex::new();
        let candidate = plugin.clone();
        packages
            .expect_candidate_paths()
            .times(1)
            .returning(move |_| vec![candidate.clone()]);

        let mut resolver = resolver(no_loaded_modules(), packages);

        let library = dunce::canonicalize(plugin.join("lua")).unwrap();
        assert_eq!(resolver.resolve("foo.bar"), Some(library.clone()));
        let entry = resolver.cache().get("foo.bar").unwrap();
        assert_eq!(entry.modpath, Some(plugin.join("lua/foo/bar/init.lua")));
        assert_eq!(entry.library, Some(library));
    }

    #[test]
    fn resolve_hits_cache_without_touching_indexes_again() {
        let mut modules = MockModuleIndex::new();
        modules.expect_find_loaded().times(1).returning(|_| {
            Some(LoadedModule {
                modpath: PathBuf::from("/plugins/foo/lua/foo.lua"),
            })
        });
        let mut packages = MockPackageIndex::new();
        packages.expect_candidate_paths().times(0);

        let mut resolver = resolver(modules, packages);
        let first = resolver.resolve("foo");
        let second = resolver.resolve("foo");

        assert_eq!(first, second);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[test]
    fn resolve_caches_negative_result() {
        let mut packages = MockPackageIndex::new();
        packages
            .expect_candidate_paths()
            .times(1)
            .returning(|_| vec![]);

        let mut resolver = resolver(no_loaded_modules(), packages);

        assert_eq!(resolver.resolve("missing.mod"), None);
        assert_eq!(resolver.resolve("missing.mod"), None);
        assert_eq!(
            resolver.cache().get("missing.mod"),
            Some(&ResolutionEntry::missing())
        );
    }

    #[test]
    fn negative_result_survives_later_installation() {
        let temp_dir = TempDir::new().unwrap();
        let plugin = temp_dir.path().join("late");

        let mut packages = MockPackageIndex::new();
        let candidate = plugin.clone();
        packages
            .expect_candidate_paths()
            .returning(move |_| vec![candidate.clone()]);

        let mut resolver = resolver(no_loaded_modules(), packages);
        assert_eq!(resolver.resolve("late"), None);

        // Install the module after the first lookup
        fs::create_dir_all(plugin.join("lua")).unwrap();
        fs::write(plugin.join("lua/late.lua"), "return {}").unwrap();

        assert_eq!(resolver.resolve("late"), None);
    }

    #[rstest]
    #[case("/tmp/outside/evil")]
    #[case(".foo")]
    #[case("..foo")]
    #[case("foo..bar")]
    #[case("foo/../../evil")]
    #[case("foo//bar")]
    #[case("")]
    fn names_escaping_plugin_sources_are_cached_as_missing(#[case] name: &str) {
        let mut modules = MockModuleIndex::new();
        modules.expect_find_loaded().times(0);
        let mut packages = MockPackageIndex::new();
        packages.expect_candidate_paths().times(0);

        let mut resolver = resolver(modules, packages);

        assert_eq!(resolver.resolve(name), None);
        assert_eq!(resolver.cache().get(name), Some(&ResolutionEntry::missing()));
    }

    #[test]
    fn absolute_name_never_reaches_files_outside_candidates() {
        let temp_dir = TempDir::new().unwrap();
        let plugin = temp_dir.path().join("plugins/foo");
        fs::create_dir_all(plugin.join("lua")).unwrap();
        let outside = temp_dir.path().join("outside");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("evil.lua"), "return {}").unwrap();

        let mut packages = MockPackageIndex::new();
        packages
            .expect_candidate_paths()
            .returning(move |_| vec![plugin.clone()]);
        let mut resolver = resolver(no_loaded_modules(), packages);

        let name = outside.join("evil").to_string_lossy().into_owned();
        assert_eq!(resolver.resolve(&name), None);
    }

    #[cfg(unix)]
    #[test]
    fn cache_hit_returns_stored_library_without_touching_disk() {
        let temp_dir = TempDir::new().unwrap();
        let real = temp_dir.path().join("real");
        fs::create_dir_all(real.join("lua")).unwrap();
        fs::write(real.join("lua/foo.lua"), "return {}").unwrap();
        let link = temp_dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut packages = MockPackageIndex::new();
        let candidate = link.clone();
        packages
            .expect_candidate_paths()
            .times(1)
            .returning(move |_| vec![candidate.clone()]);
        let mut resolver = resolver(no_loaded_modules(), packages);

        let library = dunce::canonicalize(real.join("lua")).unwrap();
        assert_eq!(resolver.resolve("foo"), Some(library.clone()));

        // The symlink no longer resolves, so a fresh normalization would differ
        fs::remove_file(&link).unwrap();
        assert_eq!(resolver.resolve("foo"), Some(library));
    }
}
