//! Package index over plugin directories on disk
//!
//! Each package root (e.g. a plugin manager's install directory) holds one
//! directory per plugin:
//!
//! ```text
//! <package root>/
//!   foo.nvim/lua/foo/init.lua
//!   bar/lua/bar.lua
//! ```

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::host::PackageIndex;

/// Package index that lists plugin directories under a set of package roots
#[derive(Debug, Clone)]
pub struct DirectoryPackageIndex {
    roots: Vec<PathBuf>,
    source_dir: String,
}

impl DirectoryPackageIndex {
    pub fn new(roots: Vec<PathBuf>, source_dir: impl Into<String>) -> Self {
        Self {
            roots,
            source_dir: source_dir.into(),
        }
    }

    /// All plugin directories under every package root, sorted per root
    fn plugin_dirs(&self) -> Vec<PathBuf> {
        let mut plugins = Vec::new();
        for root in &self.roots {
            let Ok(entries) = std::fs::read_dir(root)
                .inspect_err(|e| debug!("Skipping package root {:?}: {}", root, e))
            else {
                continue;
            };
            let mut dirs: Vec<_> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect();
            dirs.sort();
            plugins.extend(dirs);
        }
        plugins
    }

    /// Whether `plugin` ships the top-level namespace of `module`
    fn provides(&self, plugin: &Path, module: &str) -> bool {
        let top = module.split(['.', '/']).next().unwrap_or(module);
        if top.is_empty() {
            return false;
        }
        let src = plugin.join(&self.source_dir);
        src.join(top).is_dir() || src.join(format!("{top}.lua")).is_file()
    }
}

impl PackageIndex for DirectoryPackageIndex {
    fn candidate_paths(&self, module: &str) -> Vec<PathBuf> {
        self.plugin_dirs()
            .into_iter()
            .filter(|plugin| self.provides(plugin, module))
            .collect()
    }

    fn plugin_root_for(&self, name: &str) -> Option<PathBuf> {
        self.roots
            .iter()
            .map(|root| root.join(name))
            .find(|path| path.is_dir())
    }
}
