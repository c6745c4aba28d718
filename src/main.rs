use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tower_lsp::lsp_types::{Url, WorkspaceFolder};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use lsp_libsync::config::{SyncConfig, data_dir, log_path};
use lsp_libsync::host::{
    BufferId, ClientInfo, DirectoryPackageIndex, Host, MarkerPolicy, MemoryBuffers,
    RecordingClients, StaticModules,
};
use lsp_libsync::sync::{ConfigurationUpdate, LibrarySync};

#[derive(Parser)]
#[command(name = "lsp-libsync")]
#[command(version, about = "Keeps language server library paths in sync with required modules")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a project and print the library settings its modules need
    Scan {
        /// Workspace root
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Directory holding one plugin per subdirectory (repeatable)
        #[arg(long = "packages")]
        packages: Vec<PathBuf>,
        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Files to scan instead of every `.lua` file under the root
        files: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging();

    match cli.command {
        Command::Scan {
            root,
            packages,
            config,
            files,
        } => scan(&root, packages, config.as_deref(), files),
    }
}

fn init_logging() -> Option<WorkerGuard> {
    std::fs::create_dir_all(data_dir()).ok()?;
    let path = log_path();
    let file_name = path.file_name()?.to_owned();
    let appender = tracing_appender::rolling::never(data_dir(), file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Some(guard)
}

fn scan(
    root: &Path,
    packages: Vec<PathBuf>,
    config: Option<&Path>,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    let section = config.settings_section.clone();

    let root = dunce::canonicalize(root)
        .with_context(|| format!("Workspace root {} not found", root.display()))?;
    let folder = WorkspaceFolder {
        uri: Url::from_directory_path(&root)
            .map_err(|_| anyhow!("Cannot build a URI for {}", root.display()))?,
        name: root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string()),
    };
    let client = ClientInfo {
        id: 1,
        name: config.client_name.clone(),
        workspace_folders: Some(vec![folder.clone()]),
    };

    let buffers = Arc::new(MemoryBuffers::new());
    let clients = Arc::new(RecordingClients::new(vec![client.clone()]));
    let host = Host {
        buffers: buffers.clone(),
        clients: clients.clone(),
        packages: Arc::new(DirectoryPackageIndex::new(
            packages,
            config.source_dir.clone(),
        )),
        modules: Arc::new(StaticModules::new()),
        policy: Arc::new(MarkerPolicy::new(config.disable_markers.clone())),
    };
    let mut sync = LibrarySync::new(config, host);

    let files = if files.is_empty() {
        lua_files(&root)
    } else {
        files
    };
    for (index, file) in files.iter().enumerate() {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let path = dunce::canonicalize(file).unwrap_or_else(|_| file.clone());
        let buffer = BufferId::try_from(index + 1)?;
        buffers.open(buffer, Some(path), &text);
        sync.on_client_attach(&client, buffer);
    }
    sync.reconcile_now();

    let settings = clients
        .last_push(client.id)
        .and_then(|update| update.scope_settings(&folder.uri))
        .unwrap_or_else(|| ConfigurationUpdate::new(section).settings(&[]));
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Every `.lua` file under `root`, honoring ignore files
fn lua_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = ignore::WalkBuilder::new(root)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| path.extension().is_some_and(|ext| ext == "lua"))
        .collect();
    files.sort();
    files
}
