//! Per-buffer attachment state

use std::collections::HashMap;

use tracing::debug;

use crate::host::{BufferId, SubscriptionHandle};
use crate::workspace::LibraryScope;

/// A buffer whose edits are being scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Library the buffer's references are added to
    pub scope: LibraryScope,
    pub subscription: SubscriptionHandle,
}

/// Tracks which buffers are attached. At most one attachment per buffer.
#[derive(Debug, Default)]
pub struct AttachmentTracker {
    attachments: HashMap<BufferId, Attachment>,
}

impl AttachmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, buffer: BufferId) -> bool {
        self.attachments.contains_key(&buffer)
    }

    /// Record an attachment. Returns false (and keeps the existing one) if the
    /// buffer is already attached.
    pub fn attach(&mut self, buffer: BufferId, attachment: Attachment) -> bool {
        if self.is_attached(buffer) {
            return false;
        }
        debug!("Attached buffer {} to {:?}", buffer, attachment.scope);
        self.attachments.insert(buffer, attachment);
        true
    }

    pub fn scope(&self, buffer: BufferId) -> Option<&LibraryScope> {
        self.attachments.get(&buffer).map(|a| &a.scope)
    }

    pub fn detach(&mut self, buffer: BufferId) -> Option<Attachment> {
        let attachment = self.attachments.remove(&buffer);
        if attachment.is_some() {
            debug!("Detached buffer {}", buffer);
        }
        attachment
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }
}
