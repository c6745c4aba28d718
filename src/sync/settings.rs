//! Library settings payloads pushed to language server clients

use std::path::PathBuf;

use indexmap::IndexSet;
use serde_json::{Value, json};
use tower_lsp::lsp_types::{DidChangeConfigurationParams, Url, WorkspaceFolder};

/// Library list for one workspace folder
#[derive(Debug, Clone, PartialEq)]
pub struct FolderLibrary {
    pub name: String,
    pub uri: Url,
    pub library: Vec<PathBuf>,
}

/// Everything one client receives in a single reconcile pass
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationUpdate {
    section: String,
    folders: Vec<FolderLibrary>,
}

impl ConfigurationUpdate {
    pub fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            folders: Vec::new(),
        }
    }

    pub fn push_folder(&mut self, folder: &WorkspaceFolder, library: Vec<PathBuf>) {
        self.folders.push(FolderLibrary {
            name: folder.name.clone(),
            uri: folder.uri.clone(),
            library,
        });
    }

    pub fn folders(&self) -> &[FolderLibrary] {
        &self.folders
    }

    /// Library of the folder called `name`
    pub fn library(&self, name: &str) -> Option<&[PathBuf]> {
        self.folders
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.library.as_slice())
    }

    /// Settings object for a library list:
    /// `{ "<section>": { "workspace": { "library": [...] } } }`
    pub fn settings(&self, library: &[PathBuf]) -> Value {
        let library: Vec<_> = library
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        json!({ self.section.as_str(): { "workspace": { "library": library } } })
    }

    /// Settings to answer a `workspace/configuration` request for `scope_uri`
    pub fn scope_settings(&self, scope_uri: &Url) -> Option<Value> {
        self.folders
            .iter()
            .find(|f| &f.uri == scope_uri)
            .map(|f| self.settings(&f.library))
    }

    /// Notification params carrying every folder's libraries merged in order
    pub fn did_change_params(&self) -> DidChangeConfigurationParams {
        let merged: IndexSet<PathBuf> = self
            .folders
            .iter()
            .flat_map(|f| f.library.iter().cloned())
            .collect();
        let merged: Vec<_> = merged.into_iter().collect();
        DidChangeConfigurationParams {
            settings: self.settings(&merged),
        }
    }
}
