//! In-memory host collaborators
//!
//! Used by the `scan` command and by tests to drive the sync core without an editor.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::HostError;
use crate::host::{
    BufferId, BufferSource, ClientId, ClientInfo, ClientRegistry, LoadedModule, ModuleIndex,
    SubscriptionHandle,
};
use crate::sync::settings::ConfigurationUpdate;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct MemoryBuffer {
    path: Option<PathBuf>,
    lines: Vec<String>,
}

#[derive(Debug, Default)]
struct BuffersInner {
    buffers: HashMap<BufferId, MemoryBuffer>,
    subscriptions: HashMap<SubscriptionHandle, BufferId>,
    next_handle: u64,
}

/// Buffers held in memory, edited line-wise
#[derive(Debug, Default)]
pub struct MemoryBuffers {
    inner: Mutex<BuffersInner>,
}

impl MemoryBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or replace) a buffer with the given text
    pub fn open(&self, buffer: BufferId, path: Option<PathBuf>, text: &str) {
        let lines = text.lines().map(str::to_string).collect();
        lock(&self.inner)
            .buffers
            .insert(buffer, MemoryBuffer { path, lines });
    }

    /// Replace lines `[first, last)` with `replacement`.
    ///
    /// Returns the changed range in the new buffer contents, the way an editor
    /// reports it in a change notification.
    pub fn set_lines(
        &self,
        buffer: BufferId,
        first: usize,
        last: usize,
        replacement: &[&str],
    ) -> Result<(usize, usize), HostError> {
        let mut inner = lock(&self.inner);
        let buf = inner
            .buffers
            .get_mut(&buffer)
            .ok_or(HostError::BufferNotFound(buffer))?;
        let first = first.min(buf.lines.len());
        let last = last.clamp(first, buf.lines.len());
        buf.lines
            .splice(first..last, replacement.iter().map(|l| l.to_string()));
        Ok((first, first + replacement.len()))
    }

    pub fn close(&self, buffer: BufferId) {
        let mut inner = lock(&self.inner);
        inner.buffers.remove(&buffer);
        inner.subscriptions.retain(|_, b| *b != buffer);
    }

    /// Number of live subscriptions for the buffer
    pub fn subscription_count(&self, buffer: BufferId) -> usize {
        lock(&self.inner)
            .subscriptions
            .values()
            .filter(|b| **b == buffer)
            .count()
    }
}

impl BufferSource for MemoryBuffers {
    fn get_lines(
        &self,
        buffer: BufferId,
        first: usize,
        last: usize,
    ) -> Result<Vec<String>, HostError> {
        let inner = lock(&self.inner);
        let buf = inner
            .buffers
            .get(&buffer)
            .ok_or(HostError::BufferNotFound(buffer))?;
        let last = last.min(buf.lines.len());
        let first = first.min(last);
        Ok(buf.lines[first..last].to_vec())
    }

    fn line_count(&self, buffer: BufferId) -> Result<usize, HostError> {
        lock(&self.inner)
            .buffers
            .get(&buffer)
            .map(|b| b.lines.len())
            .ok_or(HostError::BufferNotFound(buffer))
    }

    fn path(&self, buffer: BufferId) -> Option<PathBuf> {
        lock(&self.inner)
            .buffers
            .get(&buffer)
            .and_then(|b| b.path.clone())
    }

    fn subscribe(&self, buffer: BufferId) -> Result<SubscriptionHandle, HostError> {
        let mut inner = lock(&self.inner);
        if !inner.buffers.contains_key(&buffer) {
            return Err(HostError::Subscribe {
                buffer,
                reason: "buffer is not loaded".to_string(),
            });
        }
        inner.next_handle += 1;
        let handle = SubscriptionHandle(inner.next_handle);
        inner.subscriptions.insert(handle, buffer);
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        lock(&self.inner).subscriptions.remove(&handle);
    }
}

/// Loaded-module index backed by a fixed map
#[derive(Debug, Default, Clone)]
pub struct StaticModules {
    modules: HashMap<String, PathBuf>,
}

impl StaticModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: &str, modpath: impl Into<PathBuf>) -> Self {
        self.modules.insert(name.to_string(), modpath.into());
        self
    }
}

impl ModuleIndex for StaticModules {
    fn find_loaded(&self, module: &str) -> Option<LoadedModule> {
        self.modules.get(module).map(|modpath| LoadedModule {
            modpath: modpath.clone(),
        })
    }
}

/// Client registry with a fixed client list that records every push
#[derive(Debug, Default)]
pub struct RecordingClients {
    clients: Vec<ClientInfo>,
    pushes: Mutex<Vec<(ClientId, ConfigurationUpdate)>>,
}

impl RecordingClients {
    pub fn new(clients: Vec<ClientInfo>) -> Self {
        Self {
            clients,
            pushes: Mutex::new(Vec::new()),
        }
    }

    /// All pushes received so far, oldest first
    pub fn pushes(&self) -> Vec<(ClientId, ConfigurationUpdate)> {
        lock(&self.pushes).clone()
    }

    pub fn push_count(&self) -> usize {
        lock(&self.pushes).len()
    }

    /// The most recent push for `client`
    pub fn last_push(&self, client: ClientId) -> Option<ConfigurationUpdate> {
        lock(&self.pushes)
            .iter()
            .rev()
            .find(|(id, _)| *id == client)
            .map(|(_, update)| update.clone())
    }
}

impl ClientRegistry for RecordingClients {
    fn list_clients(&self, name: &str) -> Vec<ClientInfo> {
        self.clients
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }

    fn push_configuration(
        &self,
        client: ClientId,
        update: &ConfigurationUpdate,
    ) -> Result<(), HostError> {
        if !self.clients.iter().any(|c| c.id == client) {
            return Err(HostError::ClientGone(client));
        }
        lock(&self.pushes).push((client, update.clone()));
        Ok(())
    }
}
