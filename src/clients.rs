//! Per-workspace-folder clients of the external language server.
//!
//! The language server itself runs out of process; a [`Client`] is the
//! extension's handle to one folder's session with it. [`ClientRegistry`]
//! keeps one client per folder, in folder-open order, and tracks which one is
//! active.

use crate::host::Ui;
use crate::settings::ChangedSettings;
use crate::types::{
    ConfigurationProvider, NavigationItem, Position, TextDocument, TextEditor, WorkspaceFolder,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

/// Key of the client used when no workspace folder is open.
pub const DEFAULT_CLIENT_KEY: &str = "(no folder)";

/// One workspace folder's connection to the language server.
///
/// Notifications are fire-and-forget; requests resolve later and may fail.
#[async_trait(?Send)]
pub trait Client {
    fn root_path(&self) -> Option<PathBuf>;

    fn root_uri(&self) -> Option<String> {
        self.root_path()
            .and_then(|p| url::Url::from_file_path(p).ok())
            .map(|u| u.to_string())
    }

    fn on_register_custom_configuration_provider(&self, provider: &ConfigurationProvider);

    /// Re-read settings and return the ones that changed since the last call.
    fn on_did_change_settings(&self) -> ChangedSettings;

    fn on_did_change_visible_text_editors(&self, editors: &[TextEditor]);

    fn active_document_changed(&self, document: &TextDocument);

    fn selection_changed(&self, position: Position);

    /// Resume work after becoming the active client.
    fn activate(&self);

    /// Throttle work after another client became active.
    fn deactivate(&self);

    /// Heartbeat.
    fn on_interval(&self);

    async fn request_navigation_list(
        &self,
        document: &TextDocument,
    ) -> anyhow::Result<Vec<NavigationItem>>;

    async fn request_go_to_declaration(&self) -> anyhow::Result<()>;

    /// Ask for the header/source counterpart of `file_name`.
    async fn request_switch_header_source(
        &self,
        root_path: &Path,
        file_name: &Path,
    ) -> anyhow::Result<PathBuf>;

    fn reset_database(&self);

    fn pause_parsing(&self);

    fn resume_parsing(&self);

    fn handle_configuration_select_command(&self);

    fn handle_configuration_provider_select_command(&self);

    fn handle_configuration_edit_command(&self);

    fn handle_add_to_include_path_command(&self, path: &str);

    fn handle_show_parsing_commands(&self);

    fn dispose(&self);
}

/// Creates clients during full activation.
pub trait ClientFactory {
    /// `folder` is `None` for the default client used without any open folder.
    fn create_client(&self, folder: Option<&WorkspaceFolder>) -> Rc<dyn Client>;
}

/// Why a client could not be picked among several.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The picker returned a name no client is registered under.
    #[error("no client registered for workspace '{0}'")]
    NoClientSelected(String),
    /// The picker was dismissed or returned an empty selection.
    #[error("workspace selection cancelled")]
    Cancelled,
}

struct ClientEntry {
    folder: Option<WorkspaceFolder>,
    client: Rc<dyn Client>,
}

/// Clients keyed by workspace name, in folder-open order.
///
/// Never empty: construction registers at least one client, which starts out
/// active, and clients are only removed by [`ClientRegistry::dispose`].
pub struct ClientRegistry {
    clients: IndexMap<String, ClientEntry>,
    active_key: String,
    active: Rc<dyn Client>,
}

impl ClientRegistry {
    /// Build one client per folder, or a single default client when there are none.
    ///
    /// The first client starts out active.
    pub fn new(folders: &[WorkspaceFolder], factory: &dyn ClientFactory) -> Self {
        let Some((first, rest)) = folders.split_first() else {
            tracing::info!("Created default client");
            return Self::with_first(
                DEFAULT_CLIENT_KEY.to_string(),
                None,
                factory.create_client(None),
            );
        };

        let mut registry = Self::with_first(
            first.name.clone(),
            Some(first.clone()),
            factory.create_client(Some(first)),
        );
        for folder in rest {
            let client = factory.create_client(Some(folder));
            registry.add(folder.name.clone(), Some(folder.clone()), client);
        }

        tracing::info!("Created {} client(s)", registry.count());
        registry
    }

    fn with_first(key: String, folder: Option<WorkspaceFolder>, client: Rc<dyn Client>) -> Self {
        let mut clients = IndexMap::new();
        clients.insert(
            key.clone(),
            ClientEntry {
                folder,
                client: client.clone(),
            },
        );
        Self {
            clients,
            active_key: key,
            active: client,
        }
    }

    /// Register a client. Returns the key it was stored under.
    ///
    /// A name already taken is disambiguated with the folder path so the
    /// workspace picker stays unambiguous.
    pub fn add(
        &mut self,
        name: String,
        folder: Option<WorkspaceFolder>,
        client: Rc<dyn Client>,
    ) -> String {
        let key = if self.clients.contains_key(&name) {
            match &folder {
                Some(f) => format!("{} ({})", name, f.path.display()),
                None => format!("{} ({})", name, self.clients.len()),
            }
        } else {
            name
        };

        self.clients
            .insert(key.clone(), ClientEntry { folder, client });
        key
    }

    pub fn get(&self, key: &str) -> Option<Rc<dyn Client>> {
        self.clients.get(key).map(|e| e.client.clone())
    }

    pub fn count(&self) -> usize {
        self.clients.len()
    }

    /// Workspace names in folder-open order.
    pub fn names(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    /// Clients with their keys, in folder-open order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rc<dyn Client>)> {
        self.clients.iter().map(|(key, e)| (key.as_str(), &e.client))
    }

    pub fn for_each(&self, mut f: impl FnMut(&dyn Client)) {
        for entry in self.clients.values() {
            f(entry.client.as_ref());
        }
    }

    pub fn active_key(&self) -> &str {
        &self.active_key
    }

    pub fn active_client(&self) -> Rc<dyn Client> {
        self.active.clone()
    }

    /// Key of the client owning `file`: the folder with the longest matching
    /// root, or the first client when no folder contains it.
    pub fn key_for(&self, file: &Path) -> &str {
        self.clients
            .iter()
            .filter_map(|(key, entry)| {
                let folder = entry.folder.as_ref()?;
                folder
                    .contains(file)
                    .then(|| (key, folder.path.components().count()))
            })
            .max_by_key(|(_, depth)| *depth)
            .map(|(key, _)| key.as_str())
            .or_else(|| self.clients.keys().next().map(|k| k.as_str()))
            .unwrap_or(DEFAULT_CLIENT_KEY)
    }

    /// Route a newly focused document to its client and move the "active"
    /// designation there if needed.
    pub fn active_document_changed(&mut self, document: &TextDocument) {
        let key = self.key_for(&document.file_name).to_string();
        let Some(entry) = self.clients.get(&key) else {
            return;
        };
        entry.client.active_document_changed(document);

        if key != self.active_key {
            tracing::debug!("Active client changed: {} -> {}", self.active_key, key);
            entry.client.activate();
            self.active.deactivate();
            self.active = entry.client.clone();
            self.active_key = key;
        }
    }

    /// Resolve the client a workspace-scoped command should act on.
    ///
    /// With a single client this never consults the UI.
    pub async fn select_client(&self, ui: &dyn Ui) -> Result<Rc<dyn Client>, SelectionError> {
        if self.count() == 1 {
            return Ok(self.active_client());
        }

        match ui.show_workspaces(&self.names()).await {
            Some(key) if !key.is_empty() => self
                .get(&key)
                .ok_or(SelectionError::NoClientSelected(key)),
            _ => Err(SelectionError::Cancelled),
        }
    }

    /// Dispose every client. The registry is consumed.
    pub fn dispose(self) {
        for (key, entry) in self.clients {
            tracing::debug!("Disposing client {}", key);
            entry.client.dispose();
        }
    }
}
