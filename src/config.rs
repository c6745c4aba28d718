use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default quiet window before a reconcile pass runs, in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 100;

// =============================================================================
// Language server conventions
// =============================================================================

/// Name of the language server client whose configuration is kept in sync
pub const DEFAULT_CLIENT_NAME: &str = "lua_ls";

/// Directory segment that marks a source root inside a plugin
pub const DEFAULT_SOURCE_DIR: &str = "lua";

/// Settings section the library list is written under
pub const DEFAULT_SETTINGS_SECTION: &str = "Lua";

/// Sync configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Quiet window in milliseconds before changes are pushed to clients
    pub debounce_ms: u64,
    pub client_name: String,
    pub source_dir: String,
    pub settings_section: String,
    /// Runtime path of the language server itself, always offered as a library
    pub runtime: Option<PathBuf>,
    /// Extra libraries: absolute paths or `plugin[/subpath]` entries
    pub library: Vec<String>,
    /// A workspace root containing any of these files is left alone
    pub disable_markers: Vec<String>,
    /// Loaded modules that conflict with this tool
    pub conflicting_modules: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            source_dir: DEFAULT_SOURCE_DIR.to_string(),
            settings_section: DEFAULT_SETTINGS_SECTION.to_string(),
            runtime: None,
            library: Vec::new(),
            disable_markers: vec![".luarc.json".to_string()],
            conflicting_modules: vec!["neodev".to_string()],
        }
    }
}

impl SyncConfig {
    /// Load configuration from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }
}

/// Returns the path to the data directory for lsp-libsync.
/// Uses $XDG_DATA_HOME/lsp-libsync if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/lsp-libsync,
/// or ./lsp-libsync if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("lsp-libsync.log")
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("lsp-libsync")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn sync_config_from_partial_object_uses_defaults_for_missing_fields() {
        let result = serde_json::from_value::<SyncConfig>(json!({
            "debounceMs": 250,
            "library": ["luvit-meta/library"]
        }))
        .unwrap();

        assert_eq!(result.debounce_ms, 250);
        assert_eq!(result.library, vec!["luvit-meta/library"]);
        assert_eq!(result.client_name, DEFAULT_CLIENT_NAME);
        assert_eq!(result.disable_markers, vec![".luarc.json"]);
    }

    #[test]
    fn sync_config_from_full_object_parses_all_fields() {
        let result = serde_json::from_value::<SyncConfig>(json!({
            "debounceMs": 50,
            "clientName": "emmylua_ls",
            "sourceDir": "src",
            "settingsSection": "Emmy",
            "runtime": "/usr/share/nvim/runtime",
            "library": ["/opt/lib"],
            "disableMarkers": [],
            "conflictingModules": ["legacy"]
        }))
        .unwrap();

        assert_eq!(
            result,
            SyncConfig {
                debounce_ms: 50,
                client_name: "emmylua_ls".to_string(),
                source_dir: "src".to_string(),
                settings_section: "Emmy".to_string(),
                runtime: Some(PathBuf::from("/usr/share/nvim/runtime")),
                library: vec!["/opt/lib".to_string()],
                disable_markers: vec![],
                conflicting_modules: vec!["legacy".to_string()],
            }
        );
    }

    #[test]
    fn load_returns_defaults_when_file_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = SyncConfig::load(&temp_dir.path().join("missing.json")).unwrap();
        assert_eq!(config, SyncConfig::default());
    }

    #[test]
    fn load_reports_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("libsync.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            SyncConfig::load(&path),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn data_dir_with_env_uses_xdg_data_home_when_set() {
        let path = data_dir_with_env(
            Some("/tmp/test-data".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/tmp/test-data/lsp-libsync"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_home_local_share() {
        let path = data_dir_with_env(None, Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.local/share/lsp-libsync"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = data_dir_with_env(None, None);
        assert_eq!(path, PathBuf::from("./lsp-libsync"));
    }
}
