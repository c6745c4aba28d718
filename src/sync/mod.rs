//! Library synchronization layer
//!
//! Ties buffer edits to language server configuration pushes.
//!
//! ```text
//! buffer edit ──▶ AttachmentTracker ──▶ BufferScanner ──▶ ModuleResolver
//!                                            │
//!                                            ▼
//! client push ◀── ReconcileScheduler ◀── WorkspaceLibrary
//!                    (debounced)
//! ```
//!
//! # Modules
//!
//! - [`attach`]: Per-buffer attachment state
//! - [`scheduler`]: Debounce timer and reconcile pass
//! - [`settings`]: Settings payloads in LSP terms
//! - [`service`]: The service owning all state and its event loop

pub mod attach;
pub mod scheduler;
pub mod service;
pub mod settings;

pub use service::{BufferEvent, BufferEventKind, LibrarySync, SyncEvent, SyncHandle};
pub use settings::ConfigurationUpdate;
