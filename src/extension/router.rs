//! Editor event handlers.
//!
//! Each handler is a no-op until full activation subscribed the listeners,
//! and again after deactivation.

use super::ExtensionContext;
use crate::settings::{
    ChangedSettings, CLANG_FORMAT_ON_SAVE_KEY, DEFAULT_UPDATE_CHANNEL, UPDATE_CHANNEL_KEY,
};
use crate::types::{TextDocument, TextEditor};

const FORMAT_ON_SAVE_REMOVED: &str = "\"C_Cpp.clang_format_formatOnSave\" has been removed. \
Please use \"editor.formatOnSave\" instead.";

impl ExtensionContext {
    fn is_routing(&self) -> bool {
        self.listeners_subscribed && !self.deactivated
    }

    pub fn on_did_change_active_text_editor(&mut self, editor: Option<&TextEditor>) {
        if self.is_routing() {
            self.route_active_editor_changed(editor);
        }
    }

    pub(super) fn route_active_editor_changed(&mut self, editor: Option<&TextEditor>) {
        let Some(clients) = self.clients.as_mut() else {
            return;
        };

        match editor {
            Some(editor) if self.config.handles_language(&editor.document.language_id) => {
                self.active_document = editor.document.uri.clone();
                clients.active_document_changed(&editor.document);
                clients.active_client().selection_changed(editor.cursor);
                self.host.ui.active_document_changed(Some(&editor.document));
            }
            _ => {
                self.active_document.clear();
                self.host.ui.active_document_changed(None);
            }
        }
    }

    /// Selection moved in `editor`.
    ///
    /// The host does not always report focus changes, so a selection in a
    /// document other than the tracked one counts as a focus change first.
    pub fn on_did_change_text_editor_selection(&mut self, editor: &TextEditor) {
        if !self.is_routing() || !self.is_relevant(&editor.document) {
            return;
        }
        let Some(clients) = self.clients.as_mut() else {
            return;
        };

        if self.active_document != editor.document.uri {
            tracing::debug!(
                "Selection in untracked document {}, treating as focus change",
                editor.document.uri
            );
            self.active_document = editor.document.uri.clone();
            clients.active_document_changed(&editor.document);
            self.host.ui.active_document_changed(Some(&editor.document));
        }
        clients.active_client().selection_changed(editor.cursor);
    }

    pub fn on_did_change_visible_text_editors(&mut self, editors: &[TextEditor]) {
        if !self.is_routing() {
            return;
        }
        if let Some(clients) = &self.clients {
            clients.for_each(|c| c.on_did_change_visible_text_editors(editors));
        }
    }

    /// Every client re-reads its settings before the active client's diff is
    /// inspected for an update-channel switch.
    pub fn on_did_change_settings(&mut self) {
        if !self.is_routing() {
            return;
        }
        let Some(clients) = &self.clients else {
            return;
        };

        let active_key = clients.active_key();
        let mut active_changes = ChangedSettings::new();
        for (key, client) in clients.iter() {
            let changes = client.on_did_change_settings();
            if key == active_key {
                active_changes = changes;
            }
        }

        let Some(channel) = active_changes.get(UPDATE_CHANNEL_KEY) else {
            return;
        };
        if channel == DEFAULT_UPDATE_CHANNEL {
            self.updater.cancel();
        } else {
            tracing::info!("Update channel switched to {}", channel);
            self.updater.arm();
            self.updater.check_now();
        }
    }

    pub fn on_did_save_text_document(&mut self, document: &TextDocument) {
        if !self.is_routing() || self.save_message_shown || !self.is_relevant(document) {
            return;
        }
        let is_active = self
            .host
            .workbench
            .active_text_editor()
            .is_some_and(|e| e.document.uri == document.uri);
        if !is_active {
            return;
        }

        if self
            .host
            .settings
            .get_bool(Some(document.file_name.as_path()), CLANG_FORMAT_ON_SAVE_KEY)
        {
            self.save_message_shown = true;
            self.host.ui.show_information_message(FORMAT_ON_SAVE_REMOVED);
        }
    }
}
