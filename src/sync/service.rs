//! Library sync service and its event loop
//!
//! [`LibrarySync`] owns every piece of mutable state (resolver cache, workspace
//! registry, attachments, debounce timer). Host callbacks reach it as
//! [`SyncEvent`]s through a [`SyncHandle`] and are handled one at a time on a
//! single task, so no state is shared across threads.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::host::{BufferId, ClientInfo, Host};
use crate::module::{BufferScanner, ModuleResolver, ResolverCache};
use crate::sync::attach::{Attachment, AttachmentTracker};
use crate::sync::scheduler::{ReconcileScheduler, expired};
use crate::workspace::{LibraryScope, WorkspaceKey, WorkspaceRegistry};

/// Kind of buffer notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEventKind {
    /// Lines `[first, last)` changed
    Changed { first: usize, last: usize },
    /// The buffer was reloaded from disk
    Reloaded,
    /// The buffer was closed or the client detached from it
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEvent {
    pub buffer: BufferId,
    pub kind: BufferEventKind,
}

/// Messages handled by the sync loop
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A compatible language server client attached to a buffer
    Attach { client: ClientInfo, buffer: BufferId },
    Buffer(BufferEvent),
    /// Add a path to the global library
    AddLibrary(PathBuf),
    /// Request a reconcile pass after the quiet window
    ScheduleReconcile,
}

/// Cloneable entry point into a running sync loop
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncHandle {
    pub fn send(&self, event: SyncEvent) -> Result<(), SyncError> {
        self.tx.send(event).map_err(|_| SyncError::Closed)
    }

    pub fn on_client_attach(&self, client: ClientInfo, buffer: BufferId) -> Result<(), SyncError> {
        self.send(SyncEvent::Attach { client, buffer })
    }

    pub fn buffer_event(&self, event: BufferEvent) -> Result<(), SyncError> {
        self.send(SyncEvent::Buffer(event))
    }

    pub fn add_library_path(&self, path: impl Into<PathBuf>) -> Result<(), SyncError> {
        self.send(SyncEvent::AddLibrary(path.into()))
    }

    pub fn schedule_reconcile(&self) -> Result<(), SyncError> {
        self.send(SyncEvent::ScheduleReconcile)
    }
}

/// Keeps workspace libraries in sync with the modules buffers reference
pub struct LibrarySync {
    config: SyncConfig,
    host: Host,
    resolver: ModuleResolver,
    registry: WorkspaceRegistry,
    scanner: BufferScanner,
    tracker: AttachmentTracker,
    scheduler: ReconcileScheduler,
}

impl LibrarySync {
    /// Build the service with fresh state and seed the global library from
    /// the configured runtime and extra libraries.
    pub fn new(config: SyncConfig, host: Host) -> Self {
        Self::with_state(config, host, ResolverCache::new(), WorkspaceRegistry::new())
    }

    pub fn with_state(
        config: SyncConfig,
        host: Host,
        cache: ResolverCache,
        registry: WorkspaceRegistry,
    ) -> Self {
        let resolver = ModuleResolver::new(
            cache,
            host.modules.clone(),
            host.packages.clone(),
            config.source_dir.clone(),
        );
        let scheduler = ReconcileScheduler::new(
            config.debounce(),
            config.client_name.clone(),
            config.settings_section.clone(),
            config.conflicting_modules.clone(),
        );
        let mut sync = Self {
            config,
            host,
            resolver,
            registry,
            scanner: BufferScanner::new(),
            tracker: AttachmentTracker::new(),
            scheduler,
        };
        sync.seed_global_library();
        sync
    }

    fn seed_global_library(&mut self) {
        if let Some(runtime) = self.config.runtime.clone() {
            self.registry.global_mut().add(&runtime);
        }
        for entry in self.config.library.clone() {
            match self.library_entry_path(&entry) {
                Some(path) => {
                    self.registry.global_mut().add(&path);
                }
                None => warn!("Library {} not found, skipping", entry),
            }
        }
    }

    /// Absolute entries are used as-is; `plugin[/subpath]` goes through the package index
    fn library_entry_path(&self, entry: &str) -> Option<PathBuf> {
        let path = Path::new(entry);
        if path.is_absolute() {
            return Some(path.to_path_buf());
        }
        let (plugin, subpath) = entry.split_once('/').unwrap_or((entry, ""));
        let root = self.host.packages.plugin_root_for(plugin)?;
        Some(if subpath.is_empty() {
            root
        } else {
            root.join(subpath)
        })
    }

    pub fn registry(&self) -> &WorkspaceRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn scheduler(&self) -> &ReconcileScheduler {
        &self.scheduler
    }

    pub fn is_attached(&self, buffer: BufferId) -> bool {
        self.tracker.is_attached(buffer)
    }

    /// Add a path to the global library, scheduling a reconcile if it is new
    pub fn add_library_path(&mut self, path: &Path) -> bool {
        let added = self.registry.global_mut().add(path);
        if added {
            self.scheduler.signal_change();
        }
        added
    }

    pub fn schedule_reconcile(&mut self) {
        self.scheduler.signal_change();
    }

    /// Run a reconcile pass right away. Returns the number of clients updated.
    pub fn reconcile_now(&mut self) -> usize {
        self.scheduler.reconcile_now(&self.host, &mut self.registry)
    }

    /// Start tracking `buffer` for `client`.
    ///
    /// Returns true if a new attachment was made. Repeated attaches, foreign
    /// clients and disabled roots are no-ops.
    pub fn on_client_attach(&mut self, client: &ClientInfo, buffer: BufferId) -> bool {
        if client.name != self.config.client_name {
            debug!("Ignoring attach of client {} ({})", client.id, client.name);
            return false;
        }
        if self.tracker.is_attached(buffer) {
            debug!("Buffer {} already attached", buffer);
            return false;
        }

        let Some(path) = self.host.buffers.path(buffer) else {
            debug!("Buffer {} has no file, not attaching", buffer);
            return false;
        };
        let Some((scope, root)) = scope_for(client, &path) else {
            debug!("No project root for buffer {}", buffer);
            return false;
        };
        if !self.host.policy.is_enabled(&root) {
            info!("Root {:?} is disabled, not attaching buffer {}", root, buffer);
            return false;
        }

        let subscription = match self.host.buffers.subscribe(buffer) {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Failed to attach buffer {}: {}", buffer, e);
                return false;
            }
        };
        self.tracker.attach(
            buffer,
            Attachment {
                scope: scope.clone(),
                subscription,
            },
        );
        info!("Attached buffer {} ({:?})", buffer, path);

        self.scan_all(&scope, buffer);
        // A new folder may still need the global library
        self.scheduler.signal_change();
        true
    }

    pub fn handle_buffer_event(&mut self, event: BufferEvent) {
        let BufferEvent { buffer, kind } = event;
        let Some(scope) = self.tracker.scope(buffer).cloned() else {
            debug!("Ignoring {:?} for unattached buffer {}", kind, buffer);
            return;
        };

        match kind {
            BufferEventKind::Changed { first, last } => self.scan(&scope, buffer, first, last),
            BufferEventKind::Reloaded => self.scan_all(&scope, buffer),
            BufferEventKind::Detached => {
                if let Some(attachment) = self.tracker.detach(buffer) {
                    self.host.buffers.unsubscribe(attachment.subscription);
                }
            }
        }
    }

    pub fn handle(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Attach { client, buffer } => {
                self.on_client_attach(&client, buffer);
            }
            SyncEvent::Buffer(event) => self.handle_buffer_event(event),
            SyncEvent::AddLibrary(path) => {
                self.add_library_path(&path);
            }
            SyncEvent::ScheduleReconcile => self.schedule_reconcile(),
        }
    }

    fn scan_all(&mut self, scope: &LibraryScope, buffer: BufferId) {
        match self.host.buffers.line_count(buffer) {
            Ok(count) => self.scan(scope, buffer, 0, count),
            Err(e) => warn!("Cannot read buffer {}: {}", buffer, e),
        }
    }

    fn scan(&mut self, scope: &LibraryScope, buffer: BufferId, first: usize, last: usize) {
        let outcome = self.scanner.scan(
            self.host.buffers.as_ref(),
            &mut self.resolver,
            self.registry.library_mut(scope),
            buffer,
            first,
            last,
        );
        if outcome.changed() {
            self.scheduler.signal_change();
        }
    }

    /// Process events until every [`SyncHandle`] is dropped.
    ///
    /// A reconcile still pending at shutdown runs before returning.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SyncEvent>) -> Self {
        loop {
            let deadline = self.scheduler.deadline();
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
                () = expired(deadline) => {
                    self.reconcile_now();
                }
            }
        }

        if self.scheduler.is_pending() {
            self.reconcile_now();
        }
        debug!("Sync loop stopped");
        self
    }

    /// Spawn the event loop on the current runtime
    pub fn spawn(self) -> (SyncHandle, JoinHandle<Self>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (SyncHandle { tx }, task)
    }
}

/// Library scope and policy root for a buffer at `path`.
///
/// The innermost workspace folder containing the buffer wins. Buffers outside
/// every folder feed the global library and use their directory as root.
fn scope_for(client: &ClientInfo, path: &Path) -> Option<(LibraryScope, PathBuf)> {
    let folder = client
        .workspace_folders
        .iter()
        .flatten()
        .filter_map(|folder| {
            let root = folder.uri.to_file_path().ok()?;
            path.starts_with(&root).then_some((folder, root))
        })
        .max_by_key(|(_, root)| root.components().count());

    match folder {
        Some((folder, root)) => Some((
            LibraryScope::Workspace(WorkspaceKey::new(client.id, folder.name.clone())),
            root,
        )),
        None => path
            .parent()
            .map(|dir| (LibraryScope::Global, dir.to_path_buf())),
    }
}
