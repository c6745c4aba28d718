//! Host collaborator layer
//!
//! The editor owns buffers, language server clients and plugin directories.
//! The sync core only talks to them through the traits in this module.
//!
//! # Modules
//!
//! - [`memory`]: In-memory buffers, loaded-module index and recording clients
//! - [`packages`]: Package index backed by plugin directories on disk
//! - [`policy`]: Root policy that disables roots carrying a marker file

pub mod memory;
pub mod packages;
pub mod policy;

use std::path::{Path, PathBuf};
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tower_lsp::lsp_types::WorkspaceFolder;

use crate::error::HostError;
use crate::sync::settings::ConfigurationUpdate;

pub use memory::{MemoryBuffers, RecordingClients, StaticModules};
pub use packages::DirectoryPackageIndex;
pub use policy::MarkerPolicy;

/// Editor buffer handle
pub type BufferId = u32;

/// Language server client handle
pub type ClientId = u32;

/// Handle returned by the host when change notifications for a buffer are enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub u64);

/// A connected language server client as seen by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub id: ClientId,
    pub name: String,
    /// `None` when the client runs in single-file mode
    pub workspace_folders: Option<Vec<WorkspaceFolder>>,
}

/// A module the host runtime has already loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub modpath: PathBuf,
}

/// Access to editor buffer contents and change subscriptions
#[cfg_attr(test, automock)]
pub trait BufferSource: Send + Sync {
    /// Lines `[first, last)` of the buffer; `last` past the end is clamped
    fn get_lines(&self, buffer: BufferId, first: usize, last: usize)
    -> Result<Vec<String>, HostError>;

    fn line_count(&self, buffer: BufferId) -> Result<usize, HostError>;

    /// File path backing the buffer, if any
    fn path(&self, buffer: BufferId) -> Option<PathBuf>;

    /// Start delivering change and reload notifications for the buffer
    fn subscribe(&self, buffer: BufferId) -> Result<SubscriptionHandle, HostError>;

    fn unsubscribe(&self, handle: SubscriptionHandle);
}

/// Connected language server clients
#[cfg_attr(test, automock)]
pub trait ClientRegistry: Send + Sync {
    /// Clients whose name matches `name`
    fn list_clients(&self, name: &str) -> Vec<ClientInfo>;

    /// Replace the client's library settings and make it re-read its configuration
    fn push_configuration(
        &self,
        client: ClientId,
        update: &ConfigurationUpdate,
    ) -> Result<(), HostError>;
}

/// Plugin and package directories visible to the host
#[cfg_attr(test, automock)]
pub trait PackageIndex: Send + Sync {
    /// Plugin roots that may contain `module` (not yet loaded modules only)
    fn candidate_paths(&self, module: &str) -> Vec<PathBuf>;

    /// Root directory of the plugin called `name`
    fn plugin_root_for(&self, name: &str) -> Option<PathBuf>;
}

/// Modules already resolved by the host runtime
#[cfg_attr(test, automock)]
pub trait ModuleIndex: Send + Sync {
    fn find_loaded(&self, module: &str) -> Option<LoadedModule>;
}

/// Decides whether a project root is managed at all
#[cfg_attr(test, automock)]
pub trait RootPolicy: Send + Sync {
    fn is_enabled(&self, root: &Path) -> bool;
}

/// Bundle of collaborators handed to the sync service
#[derive(Clone)]
pub struct Host {
    pub buffers: Arc<dyn BufferSource>,
    pub clients: Arc<dyn ClientRegistry>,
    pub packages: Arc<dyn PackageIndex>,
    pub modules: Arc<dyn ModuleIndex>,
    pub policy: Arc<dyn RootPolicy>,
}
