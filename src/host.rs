//! The editor host, as far as the extension needs to see it.

use crate::language_config::LanguageConfiguration;
use crate::types::{NavigationItem, TextDocument, TextEditor, ViewColumn, WorkspaceFolder};
use async_trait::async_trait;
use std::path::Path;

/// Extension-owned UI surface (status bar items, pickers, messages).
#[async_trait(?Send)]
pub trait Ui {
    fn show_navigation_options(&self, items: Vec<NavigationItem>);

    /// Let the user pick a workspace by name.
    ///
    /// Returns `None` (or an empty string) when the picker was dismissed.
    async fn show_workspaces(&self, names: &[String]) -> Option<String>;

    /// The focused document changed; `None` means no c/cpp document is focused.
    fn active_document_changed(&self, document: Option<&TextDocument>);

    fn show_information_message(&self, message: &str);

    fn show_release_notes(&self);

    /// Ask the user to reload the host so manifest changes take effect.
    fn prompt_for_reload(&self, reason: &str);

    fn dispose(&self);
}

/// Workspace and window state of the host.
#[async_trait(?Send)]
pub trait Workbench {
    fn workspace_folders(&self) -> Vec<WorkspaceFolder>;

    fn text_documents(&self) -> Vec<TextDocument>;

    fn active_text_editor(&self) -> Option<TextEditor>;

    fn visible_text_editors(&self) -> Vec<TextEditor>;

    async fn open_text_document(&self, path: &Path) -> anyhow::Result<TextDocument>;

    fn show_text_document(&self, document: &TextDocument, column: ViewColumn);

    /// Run a command owned by the host (e.g. its built-in go-to-declaration).
    async fn execute_command(&self, command: &str) -> anyhow::Result<()>;

    fn open_external(&self, url: &str);

    /// Advertise the extension's command identifiers.
    fn register_commands(&self, ids: &[&'static str]);

    /// Install indentation/comment rules for a language, scoped to `root`.
    fn set_language_configuration(
        &self,
        language_id: &str,
        root: Option<&Path>,
        configuration: &LanguageConfiguration,
    );
}
