//! Wiring shared by every command: config, local store, server and sync manager.

use std::path::PathBuf;

use scribe_core::config::{ClientConfig, APP_DIR_NAME};
use scribe_core::editor::NoteEditor;
use scribe_core::models::{Note, NoteId, NotePayload};
use scribe_core::store::LocalStore;
use scribe_core::sync::{ConnectivityWatcher, CreatedNote, HttpNoteServer, NoteServer, SyncManager};
use scribe_core::util::normalize_text_option;

use crate::cli::GlobalOptions;
use crate::error::CliError;

/// The notes server, or nothing when no API is configured
#[derive(Clone, Debug)]
pub enum Remote {
    Http(HttpNoteServer),
    Unconfigured,
}

impl Remote {
    /// Whether the server answers right now
    pub async fn probe(&self) -> bool {
        match self {
            Self::Http(server) => server.probe().await,
            Self::Unconfigured => false,
        }
    }

    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

fn not_configured() -> scribe_core::Error {
    scribe_core::Error::Config(
        "no notes API configured; set SCRIBE_API_URL or api_base_url".to_string(),
    )
}

impl NoteServer for Remote {
    async fn create_note(&self, payload: &NotePayload) -> scribe_core::Result<CreatedNote> {
        match self {
            Self::Http(server) => server.create_note(payload).await,
            Self::Unconfigured => Err(not_configured()),
        }
    }

    async fn update_note(&self, id: &NoteId, payload: &NotePayload) -> scribe_core::Result<()> {
        match self {
            Self::Http(server) => server.update_note(id, payload).await,
            Self::Unconfigured => Err(not_configured()),
        }
    }

    async fn delete_note(&self, id: &NoteId) -> scribe_core::Result<()> {
        match self {
            Self::Http(server) => server.delete_note(id).await,
            Self::Unconfigured => Err(not_configured()),
        }
    }

    async fn fetch_note(&self, id: &NoteId) -> scribe_core::Result<Option<Note>> {
        match self {
            Self::Http(server) => server.fetch_note(id).await,
            Self::Unconfigured => Err(not_configured()),
        }
    }

    async fn current_user(&self) -> scribe_core::Result<Option<String>> {
        match self {
            Self::Http(server) => server.current_user().await,
            Self::Unconfigured => Ok(None),
        }
    }
}

pub struct AppContext {
    pub config: ClientConfig,
    pub editor: NoteEditor<Remote>,
}

impl AppContext {
    /// Load configuration, open the store and check whether the server is reachable
    pub async fn connect(options: &GlobalOptions) -> Result<Self, CliError> {
        let config = load_config(options)?;
        let db_path = match config.db_path.clone() {
            Some(path) => path,
            None => default_db_path()?,
        };

        let store = LocalStore::new(&db_path);
        store.open().await?;
        tracing::debug!("Opened local store at {}", db_path.display());

        let remote = if config.has_server() {
            Remote::Http(HttpNoteServer::from_config(&config)?)
        } else {
            Remote::Unconfigured
        };
        let online = !options.offline && remote.probe().await;
        if remote.is_configured() && !online {
            tracing::info!("Notes server unreachable; working offline");
        }

        Ok(Self::assemble(config, store, remote, online))
    }

    pub fn assemble(config: ClientConfig, store: LocalStore, remote: Remote, online: bool) -> Self {
        let manager = SyncManager::new(store, remote, ConnectivityWatcher::new(online));
        Self {
            config,
            editor: NoteEditor::new(manager),
        }
    }

    pub const fn manager(&self) -> &SyncManager<Remote> {
        self.editor.sync_manager()
    }

    pub fn store(&self) -> &LocalStore {
        self.manager().store()
    }

    pub fn remote(&self) -> &Remote {
        self.manager().server()
    }

    pub fn is_online(&self) -> bool {
        self.manager().is_online()
    }
}

/// Defaults, then the config file and environment, then command-line flags
pub fn load_config(options: &GlobalOptions) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load(dirs::config_dir().as_deref())?;

    if let Some(path) = options.db_path.clone() {
        config.db_path = Some(path);
    }
    if let Some(url) = normalize_text_option(options.api_url.clone()) {
        config.api_base_url = Some(url);
    }
    Ok(config.normalized()?)
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join("scribe.db"))
        .ok_or_else(|| CliError::Config("could not resolve a data directory; pass --db-path".into()))
}
