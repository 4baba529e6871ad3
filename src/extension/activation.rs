//! Lazy activation.
//!
//! Starting the language service is expensive, so the extension stays
//! dormant until something shows it is needed: a flag persisted by the last
//! session, an explicit activation event, a configuration file in a
//! workspace folder, an open c/cpp document, or a command.

use super::ExtensionContext;
use crate::clients::ClientRegistry;
use crate::language_config::LanguageConfiguration;
use crate::services::crash_report::{self, CrashLogWatcher};
use crate::services::timer::IntervalTimer;
use crate::settings::ACTIVATED_PREVIOUSLY_KEY;
use crate::types::TextDocument;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// Nothing registered yet.
    Dormant,
    /// Waiting for a c/cpp document to be opened.
    Watching,
    /// Fully activated. Terminal.
    Active,
}

/// What caused full activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTrigger {
    /// The previous session in this workspace was activated.
    PersistedFlag,
    /// The host reported an activation event before calling us.
    ActivationEvent,
    /// A workspace folder holds the configuration marker file.
    WorkspaceMarker,
    /// A c/cpp document was already open.
    OpenDocument,
    /// A c/cpp document was opened while watching.
    DocumentOpened,
    Command,
}

/// Subscriptions that only live until full activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingWatcher {
    DocumentOpen,
}

/// Forward-only `Dormant -> Watching -> Active` state machine.
#[derive(Debug)]
pub struct ActivationGate {
    state: ActivationState,
    pending: Vec<PendingWatcher>,
    trigger: Option<ActivationTrigger>,
}

impl Default for ActivationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationGate {
    pub fn new() -> Self {
        Self {
            state: ActivationState::Dormant,
            pending: Vec::new(),
            trigger: None,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    /// The trigger that activated the gate, if any.
    pub fn trigger(&self) -> Option<ActivationTrigger> {
        self.trigger
    }

    pub fn pending_watchers(&self) -> &[PendingWatcher] {
        &self.pending
    }

    pub fn is_watching(&self, watcher: PendingWatcher) -> bool {
        self.pending.contains(&watcher)
    }

    /// Register the document-open watcher. Only moves out of `Dormant`.
    pub fn arm(&mut self) -> bool {
        if self.state != ActivationState::Dormant {
            return false;
        }
        self.state = ActivationState::Watching;
        self.pending.push(PendingWatcher::DocumentOpen);
        true
    }

    /// Move to `Active`. Returns true only for the call that made the
    /// transition; pending watchers are gone by the time it returns.
    pub fn fire(&mut self, trigger: ActivationTrigger) -> bool {
        if self.is_active() {
            return false;
        }
        self.pending.clear();
        self.state = ActivationState::Active;
        self.trigger = Some(trigger);
        true
    }

    /// Drop pending watchers without activating (shutdown).
    pub fn dispose_watchers(&mut self) {
        self.pending.clear();
    }
}

/// Whether `folder` contains the configuration marker file.
///
/// Any I/O error counts as "not found".
pub fn has_config_marker(folder: &Path, marker: &Path) -> bool {
    match fs::metadata(folder.join(marker)) {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!("Probing {:?} for {:?} failed: {}", folder, marker, e);
            }
            false
        }
    }
}

impl ExtensionContext {
    /// Process entry point.
    ///
    /// `activation_event_occurred` is true when the host already knows the
    /// extension is needed.
    pub fn activate(&mut self, activation_event_occurred: bool) {
        if self.deactivated {
            return;
        }

        let workspace_state = self.host.workspace_state.clone();
        if workspace_state
            .get_bool(ACTIVATED_PREVIOUSLY_KEY)
            .unwrap_or(false)
        {
            workspace_state.set_bool(ACTIVATED_PREVIOUSLY_KEY, false);
            self.activate_with(ActivationTrigger::PersistedFlag);
        }

        self.register_commands();
        if self.gate.arm() {
            tracing::debug!("Watching for c/cpp documents");
        }

        if activation_event_occurred {
            self.activate_with(ActivationTrigger::ActivationEvent);
            return;
        }
        if self.is_active() {
            return;
        }

        let marker = self.config.config_marker.clone();
        let folders = self.host.workbench.workspace_folders();
        if folders.iter().any(|f| has_config_marker(&f.path, &marker)) {
            self.activate_with(ActivationTrigger::WorkspaceMarker);
            return;
        }

        let documents = self.host.workbench.text_documents();
        if documents.iter().any(|d| self.is_relevant(d)) {
            self.activate_with(ActivationTrigger::OpenDocument);
        }
    }

    /// Host notification that a text document was opened.
    ///
    /// Only the pending document-open watcher listens to this.
    pub fn on_did_open_text_document(&mut self, document: &TextDocument) {
        if self.deactivated || !self.gate.is_watching(PendingWatcher::DocumentOpen) {
            return;
        }
        if self.is_relevant(document) {
            self.activate_with(ActivationTrigger::DocumentOpened);
        }
    }

    /// Called by every command before doing its work.
    pub fn ensure_activated(&mut self) {
        self.activate_with(ActivationTrigger::Command);
    }

    fn register_commands(&mut self) {
        if self.commands_registered {
            return;
        }
        self.commands_registered = true;
        let ids = super::CommandId::ALL.map(super::CommandId::id);
        self.host.workbench.register_commands(&ids);
    }

    fn activate_with(&mut self, trigger: ActivationTrigger) {
        if self.deactivated {
            return;
        }
        if self.gate.fire(trigger) {
            self.full_activation(trigger);
        }
    }

    fn full_activation(&mut self, trigger: ActivationTrigger) {
        tracing::info!(?trigger, "Activating");

        let folders = self.host.workbench.workspace_folders();
        self.clients = Some(ClientRegistry::new(
            &folders,
            self.host.client_factory.as_ref(),
        ));

        // Editors open before activation never report a change on their own.
        if let Some(editor) = self.host.workbench.active_text_editor() {
            self.route_active_editor_changed(Some(&editor));
        }

        if let Some(clients) = &self.clients {
            for provider in &self.providers {
                clients.for_each(|c| c.on_register_custom_configuration_provider(provider));
            }
        }

        self.listeners_subscribed = true;

        let root = self
            .clients
            .as_ref()
            .and_then(|c| c.active_client().root_path());
        let language_config =
            LanguageConfiguration::for_resource(self.host.settings.as_ref(), root.as_deref());
        for language in &self.config.languages {
            self.host
                .workbench
                .set_language_configuration(language, root.as_deref(), &language_config);
        }

        if cfg!(target_os = "macos") || self.config.watch_crash_reports {
            self.start_crash_watcher();
        }

        self.heartbeat = Some(IntervalTimer::start(
            self.config.heartbeat_interval(),
            self.time_source.clone(),
        ));

        self.host
            .workspace_state
            .set_bool(ACTIVATED_PREVIOUSLY_KEY, true);
    }

    fn start_crash_watcher(&mut self) {
        let Some(folder) = self
            .config
            .crash_folder
            .clone()
            .or_else(crash_report::default_crash_folder)
        else {
            tracing::debug!("No crash report folder");
            return;
        };
        self.crash_watcher = CrashLogWatcher::start(
            &folder,
            self.time_source.clone(),
            self.host.telemetry.as_ref(),
        );
    }
}
