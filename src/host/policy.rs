//! Root policy based on marker files

use std::path::Path;

use crate::host::RootPolicy;

/// Disables any root that contains one of the marker files.
///
/// A project with its own `.luarc.json` manages its libraries by hand.
#[derive(Debug, Clone, Default)]
pub struct MarkerPolicy {
    markers: Vec<String>,
}

impl MarkerPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl RootPolicy for MarkerPolicy {
    fn is_enabled(&self, root: &Path) -> bool {
        !self.markers.iter().any(|marker| root.join(marker).exists())
    }
}
