//! Host fakes backed by a temporary plugin tree

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;
use tower_lsp::lsp_types::{Url, WorkspaceFolder};

use lsp_libsync::config::SyncConfig;
use lsp_libsync::host::{
    ClientInfo, DirectoryPackageIndex, Host, MarkerPolicy, MemoryBuffers, PackageIndex,
    RecordingClients, StaticModules,
};
use lsp_libsync::sync::LibrarySync;

/// Package index that counts on-disk searches
pub struct CountingPackages {
    inner: DirectoryPackageIndex,
    searches: AtomicUsize,
}

impl CountingPackages {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: DirectoryPackageIndex::new(vec![root.to_path_buf()], "lua"),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl PackageIndex for CountingPackages {
    fn candidate_paths(&self, module: &str) -> Vec<PathBuf> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.candidate_paths(module)
    }

    fn plugin_root_for(&self, name: &str) -> Option<PathBuf> {
        self.inner.plugin_root_for(name)
    }
}

/// Install `<root>/plugins/<plugin>/lua/<module path>.lua`
pub fn install(root: &Path, plugin: &str, module: &str) {
    let file = root
        .join("plugins")
        .join(plugin)
        .join("lua")
        .join(format!("{}.lua", module.replace('.', "/")));
    std::fs::create_dir_all(file.parent().unwrap()).unwrap();
    std::fs::write(file, "return {}").unwrap();
}

pub fn lua_ls(id: u32, folders: &[(&str, &Path)]) -> ClientInfo {
    ClientInfo {
        id,
        name: "lua_ls".to_string(),
        workspace_folders: Some(
            folders
                .iter()
                .map(|(name, path)| WorkspaceFolder {
                    uri: Url::from_directory_path(path).unwrap(),
                    name: name.to_string(),
                })
                .collect(),
        ),
    }
}

/// In-memory buffers, a recording client and a temporary plugin tree
pub struct TestHost {
    pub dir: TempDir,
    pub buffers: Arc<MemoryBuffers>,
    pub clients: Arc<RecordingClients>,
    pub packages: Arc<CountingPackages>,
    pub client: ClientInfo,
}

impl TestHost {
    /// Host with the given `(plugin, module)` pairs installed
    pub fn new(modules: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("plugins")).unwrap();
        std::fs::create_dir_all(dir.path().join("work/app")).unwrap();
        for (plugin, module) in modules {
            install(dir.path(), plugin, module);
        }

        let workspace = dunce::canonicalize(dir.path().join("work/app")).unwrap();
        let client = lua_ls(1, &[("app", &workspace)]);
        Self {
            buffers: Arc::new(MemoryBuffers::new()),
            clients: Arc::new(RecordingClients::new(vec![client.clone()])),
            packages: Arc::new(CountingPackages::new(&dir.path().join("plugins"))),
            client,
            dir,
        }
    }

    pub fn workspace(&self) -> PathBuf {
        dunce::canonicalize(self.dir.path().join("work/app")).unwrap()
    }

    /// Canonical `lua` directory of an installed plugin
    pub fn library_of(&self, plugin: &str) -> PathBuf {
        dunce::canonicalize(self.dir.path().join("plugins").join(plugin).join("lua")).unwrap()
    }

    pub fn open(&self, buffer: u32, file: &str, text: &str) {
        self.buffers
            .open(buffer, Some(self.workspace().join(file)), text);
    }

    pub fn sync(&self) -> LibrarySync {
        let host = Host {
            buffers: self.buffers.clone(),
            clients: self.clients.clone(),
            packages: self.packages.clone(),
            modules: Arc::new(StaticModules::new()),
            policy: Arc::new(MarkerPolicy::new(vec![".luarc.json".to_string()])),
        };
        LibrarySync::new(SyncConfig::default(), host)
    }
}
