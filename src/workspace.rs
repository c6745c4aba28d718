//! Per-workspace library path sets
//!
//! Every `(client, workspace folder)` pair accumulates the library roots its
//! buffers reference. A separate global library holds paths that apply to every
//! workspace (the server runtime, user-declared extra libraries, buffers outside
//! any workspace folder). Sets only grow; nothing is ever removed during a session.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::host::ClientId;

/// Identifies one workspace folder of one language server client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceKey {
    pub client: ClientId,
    pub name: String,
}

impl WorkspaceKey {
    pub fn new(client: ClientId, name: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
        }
    }
}

/// Which library a buffer feeds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LibraryScope {
    Global,
    Workspace(WorkspaceKey),
}

/// Ordered, duplicate-free set of library paths
#[derive(Debug, Default)]
pub struct WorkspaceLibrary {
    paths: IndexSet<PathBuf>,
    /// Full library list (global + own) last handed out for a push
    synced: Vec<PathBuf>,
}

impl WorkspaceLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a library path. Returns true iff the set grew.
    ///
    /// A path already stored in its normalized form is found without touching
    /// the filesystem.
    pub fn add(&mut self, path: &Path) -> bool {
        if self.paths.contains(path) {
            return false;
        }
        let path = normalize_path(path);
        if self.paths.contains(&path) {
            return false;
        }
        info!("Adding library {:?}", path);
        self.paths.insert(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(&normalize_path(path))
    }

    /// Paths in insertion order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.paths.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Owns the global library and every workspace library
#[derive(Debug, Default)]
pub struct WorkspaceRegistry {
    global: WorkspaceLibrary,
    workspaces: HashMap<WorkspaceKey, WorkspaceLibrary>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&self) -> &WorkspaceLibrary {
        &self.global
    }

    pub fn global_mut(&mut self) -> &mut WorkspaceLibrary {
        &mut self.global
    }

    /// Library for `key`, created on first use
    pub fn get(&mut self, key: &WorkspaceKey) -> &mut WorkspaceLibrary {
        if !self.workspaces.contains_key(key) {
            debug!("Creating library for client {} workspace {}", key.client, key.name);
        }
        self.workspaces.entry(key.clone()).or_default()
    }

    pub fn find(&self, key: &WorkspaceKey) -> Option<&WorkspaceLibrary> {
        self.workspaces.get(key)
    }

    pub fn library_mut(&mut self, scope: &LibraryScope) -> &mut WorkspaceLibrary {
        match scope {
            LibraryScope::Global => self.global_mut(),
            LibraryScope::Workspace(key) => self.get(key),
        }
    }

    /// Global paths followed by the workspace's own, without duplicates
    pub fn library_for(&mut self, key: &WorkspaceKey) -> Vec<PathBuf> {
        let global = self.global.paths.iter();
        let own = self.workspaces.entry(key.clone()).or_default().paths.iter();
        global
            .chain(own)
            .cloned()
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Current library of `key` if the server has not seen it yet
    pub fn pending_update(&mut self, key: &WorkspaceKey) -> Option<Vec<PathBuf>> {
        let library = self.library_for(key);
        (self.get(key).synced != library).then_some(library)
    }

    /// Record `library` as the list the server last received for `key`
    pub fn mark_synced(&mut self, key: &WorkspaceKey, library: Vec<PathBuf>) {
        self.get(key).synced = library;
    }
}

/// Best-effort canonical form of a library path.
///
/// Existing paths are canonicalized. Missing ones are made absolute and
/// cleaned lexically, so trailing slashes and `.`/`..` segments never make
/// two spellings of one directory look different.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = dunce::canonicalize(path) {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
