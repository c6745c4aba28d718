//! Debounced reconciliation of workspace libraries into client settings

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::host::{ClientInfo, Host, ModuleIndex};
use crate::sync::settings::ConfigurationUpdate;
use crate::workspace::{WorkspaceKey, WorkspaceRegistry};

/// A single re-armable deadline.
///
/// Arming while already armed moves the deadline instead of adding a second one.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Completes at `deadline`, or never when there is none
pub async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

/// Collapses change signals and pushes libraries to clients
pub struct ReconcileScheduler {
    debouncer: Debouncer,
    client_name: String,
    section: String,
    conflicting_modules: Vec<String>,
    conflict_reported: bool,
    passes: usize,
}

impl ReconcileScheduler {
    pub fn new(
        window: Duration,
        client_name: impl Into<String>,
        section: impl Into<String>,
        conflicting_modules: Vec<String>,
    ) -> Self {
        Self {
            debouncer: Debouncer::new(window),
            client_name: client_name.into(),
            section: section.into(),
            conflicting_modules,
            conflict_reported: false,
            passes: 0,
        }
    }

    /// Arm (or re-arm) the debounce timer
    pub fn signal_change(&mut self) {
        if self.debouncer.is_armed() {
            debug!("Reconcile already pending, resetting quiet window");
        }
        self.debouncer.arm();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_armed()
    }

    /// Number of reconcile passes run so far
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn conflict_reported(&self) -> bool {
        self.conflict_reported
    }

    /// Push every pending library to its client.
    ///
    /// Returns the number of clients that received a configuration push.
    pub fn reconcile_now(&mut self, host: &Host, registry: &mut WorkspaceRegistry) -> usize {
        self.debouncer.disarm();
        self.passes += 1;
        self.report_conflicts(host.modules.as_ref());

        let clients = host.clients.list_clients(&self.client_name);
        let mut pushed = 0;
        for client in &clients {
            if self.reconcile_client(host, registry, client) {
                pushed += 1;
            }
        }

        debug!(
            "Reconcile pass {} done: {} of {} clients updated",
            self.passes,
            pushed,
            clients.len()
        );
        pushed
    }

    fn reconcile_client(
        &self,
        host: &Host,
        registry: &mut WorkspaceRegistry,
        client: &ClientInfo,
    ) -> bool {
        let Some(folders) = &client.workspace_folders else {
            debug!("Client {} has no workspace folders", client.id);
            return false;
        };

        let mut update = ConfigurationUpdate::new(&self.section);
        let mut pending = Vec::new();
        for folder in folders {
            let Ok(root) = folder.uri.to_file_path() else {
                debug!("Skipping non-file workspace folder {}", folder.uri);
                continue;
            };
            if !host.policy.is_enabled(&root) {
                debug!("Workspace {:?} is disabled", root);
                continue;
            }

            let key = WorkspaceKey::new(client.id, folder.name.clone());
            let library = match registry.pending_update(&key) {
                Some(library) => {
                    pending.push((key, library.clone()));
                    library
                }
                None => registry.library_for(&key),
            };
            update.push_folder(folder, library);
        }

        if pending.is_empty() {
            return false;
        }

        match host.clients.push_configuration(client.id, &update) {
            Ok(()) => {
                info!(
                    "Pushed libraries for {} workspace folders to client {}",
                    update.folders().len(),
                    client.id
                );
                for (key, library) in pending {
                    registry.mark_synced(&key, library);
                }
                true
            }
            Err(e) => {
                error!("Failed to update client {}: {}", client.id, e);
                false
            }
        }
    }

    fn report_conflicts(&mut self, modules: &dyn ModuleIndex) {
        if self.conflict_reported {
            return;
        }
        if let Some(name) = self
            .conflicting_modules
            .iter()
            .find(|name| modules.find_loaded(name).is_some())
        {
            warn!(
                "{} is loaded and also manages library paths; disable it to avoid conflicting settings",
                name
            );
            self.conflict_reported = true;
        }
    }
}
