//! Command dispatch.
//!
//! Every command first makes sure the extension is active, then resolves
//! the client it acts on and delegates. Failures never surface as errors;
//! they come back as a [`CommandOutcome`].

use super::ExtensionContext;
use crate::clients::{Client, SelectionError};
use crate::services::telemetry::{TelemetryEvent, TelemetryProperties};
use crate::settings::{DIM_INACTIVE_REGIONS_KEY, ERROR_SQUIGGLES_KEY, INCLUDE_FALLBACK_KEY};
use crate::snippets::{self, SnippetsState};
use crate::types::{TextDocument, TextEditor, ViewColumn};
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use thiserror::Error;

const GO_TO_DECLARATION: &str = "editor.action.goToDeclaration";
const PEEK_DEFINITION: &str = "editor.action.peekDefinition";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Navigate,
    GoToDeclaration,
    PeekDeclaration,
    SwitchHeaderSource,
    ResetDatabase,
    ConfigurationSelect,
    ConfigurationProviderSelect,
    ConfigurationEdit,
    AddToIncludePath,
    ToggleErrorSquiggles,
    ToggleIncludeFallback,
    ToggleDimInactiveRegions,
    ToggleSnippets,
    ShowReleaseNotes,
    PauseParsing,
    ResumeParsing,
    ShowParsingCommands,
    TakeSurvey,
}

impl CommandId {
    pub const ALL: [CommandId; 18] = [
        CommandId::Navigate,
        CommandId::GoToDeclaration,
        CommandId::PeekDeclaration,
        CommandId::SwitchHeaderSource,
        CommandId::ResetDatabase,
        CommandId::ConfigurationSelect,
        CommandId::ConfigurationProviderSelect,
        CommandId::ConfigurationEdit,
        CommandId::AddToIncludePath,
        CommandId::ToggleErrorSquiggles,
        CommandId::ToggleIncludeFallback,
        CommandId::ToggleDimInactiveRegions,
        CommandId::ToggleSnippets,
        CommandId::ShowReleaseNotes,
        CommandId::PauseParsing,
        CommandId::ResumeParsing,
        CommandId::ShowParsingCommands,
        CommandId::TakeSurvey,
    ];

    /// The identifier the host invokes the command by.
    pub fn id(self) -> &'static str {
        match self {
            CommandId::Navigate => "C_Cpp.Navigate",
            CommandId::GoToDeclaration => "C_Cpp.GoToDeclaration",
            CommandId::PeekDeclaration => "C_Cpp.PeekDeclaration",
            CommandId::SwitchHeaderSource => "C_Cpp.SwitchHeaderSource",
            CommandId::ResetDatabase => "C_Cpp.ResetDatabase",
            CommandId::ConfigurationSelect => "C_Cpp.ConfigurationSelect",
            CommandId::ConfigurationProviderSelect => "C_Cpp.ConfigurationProviderSelect",
            CommandId::ConfigurationEdit => "C_Cpp.ConfigurationEdit",
            CommandId::AddToIncludePath => "C_Cpp.AddToIncludePath",
            CommandId::ToggleErrorSquiggles => "C_Cpp.ToggleErrorSquiggles",
            CommandId::ToggleIncludeFallback => "C_Cpp.ToggleIncludeFallback",
            CommandId::ToggleDimInactiveRegions => "C_Cpp.ToggleDimInactiveRegions",
            CommandId::ToggleSnippets => "C_Cpp.ToggleSnippets",
            CommandId::ShowReleaseNotes => "C_Cpp.ShowReleaseNotes",
            CommandId::PauseParsing => "C_Cpp.PauseParsing",
            CommandId::ResumeParsing => "C_Cpp.ResumeParsing",
            CommandId::ShowParsingCommands => "C_Cpp.ShowParsingCommands",
            CommandId::TakeSurvey => "C_Cpp.TakeSurvey",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandId {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandId::ALL
            .into_iter()
            .find(|c| c.id() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// How a command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    /// The workspace picker returned a name without a client.
    NoClientSelected(String),
    /// The workspace picker was dismissed.
    Cancelled,
    /// A precondition failed; the message was shown to the user.
    PreconditionFailed(String),
    /// Nothing to act on (no c/cpp editor, missing argument, shut down).
    Ignored,
    /// A client request or file operation failed. Only logged.
    Failed(String),
}

impl From<SelectionError> for CommandOutcome {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NoClientSelected(name) => CommandOutcome::NoClientSelected(name),
            SelectionError::Cancelled => CommandOutcome::Cancelled,
        }
    }
}

fn failed(command: CommandId, e: impl fmt::Display) -> CommandOutcome {
    tracing::debug!("{} failed: {}", command, e);
    CommandOutcome::Failed(e.to_string())
}

/// Column to show `document` in after switching header/source: the first
/// visible editor already showing it, else the active editor's column.
pub(crate) fn target_column(
    document: &TextDocument,
    visible: &[TextEditor],
    active: Option<&TextEditor>,
) -> ViewColumn {
    visible
        .iter()
        .find(|e| e.document.uri == document.uri)
        .or(active)
        .and_then(|e| e.view_column)
        .unwrap_or(ViewColumn::Default)
}

impl ExtensionContext {
    /// Run a command. `arg` carries the command's argument where it has one
    /// (the path for `AddToIncludePath`).
    pub async fn execute_command(&mut self, command: CommandId, arg: Option<&str>) -> CommandOutcome {
        if self.deactivated {
            return CommandOutcome::Ignored;
        }
        self.ensure_activated();
        tracing::debug!("Executing {}", command);

        match command {
            CommandId::Navigate => self.navigate().await,
            CommandId::GoToDeclaration => self.go_to_declaration(command, GO_TO_DECLARATION).await,
            CommandId::PeekDeclaration => self.go_to_declaration(command, PEEK_DEFINITION).await,
            CommandId::SwitchHeaderSource => self.switch_header_source().await,
            CommandId::ResetDatabase => self.with_selected_client(|c| c.reset_database()).await,
            CommandId::ConfigurationSelect => {
                if let Err(outcome) = self.require_folder("select a configuration") {
                    return outcome;
                }
                self.with_selected_client(|c| c.handle_configuration_select_command())
                    .await
            }
            CommandId::ConfigurationProviderSelect => {
                if let Err(outcome) = self.require_folder("select a configuration provider") {
                    return outcome;
                }
                self.with_selected_client(|c| c.handle_configuration_provider_select_command())
                    .await
            }
            CommandId::ConfigurationEdit => {
                if let Err(outcome) = self.require_folder("edit configurations") {
                    return outcome;
                }
                self.with_selected_client(|c| c.handle_configuration_edit_command())
                    .await
            }
            CommandId::AddToIncludePath => {
                if let Err(outcome) = self.require_folder("add to includePath") {
                    return outcome;
                }
                let Some(path) = arg else {
                    return CommandOutcome::Ignored;
                };
                self.with_active_client(|c| c.handle_add_to_include_path_command(path))
            }
            CommandId::ToggleErrorSquiggles => {
                self.toggle_setting(ERROR_SQUIGGLES_KEY, "Enabled", "Disabled")
            }
            CommandId::ToggleIncludeFallback => {
                self.toggle_setting(INCLUDE_FALLBACK_KEY, "Enabled", "Disabled")
            }
            CommandId::ToggleDimInactiveRegions => {
                self.toggle_setting(DIM_INACTIVE_REGIONS_KEY, "true", "false")
            }
            CommandId::ToggleSnippets => self.toggle_snippets(),
            CommandId::ShowReleaseNotes => {
                self.host.ui.show_release_notes();
                CommandOutcome::Done
            }
            CommandId::PauseParsing => self.with_selected_client(|c| c.pause_parsing()).await,
            CommandId::ResumeParsing => self.with_selected_client(|c| c.resume_parsing()).await,
            CommandId::ShowParsingCommands => {
                self.with_selected_client(|c| c.handle_show_parsing_commands())
                    .await
            }
            CommandId::TakeSurvey => {
                self.host
                    .telemetry
                    .log_event(TelemetryEvent::TakeSurvey, TelemetryProperties::new());
                self.host.workbench.open_external(&self.config.survey_url);
                CommandOutcome::Done
            }
        }
    }

    fn active_client(&self) -> Option<Rc<dyn Client>> {
        self.clients.as_ref().map(|c| c.active_client())
    }

    fn with_active_client(&self, f: impl FnOnce(&dyn Client)) -> CommandOutcome {
        match self.active_client() {
            Some(client) => {
                f(client.as_ref());
                CommandOutcome::Done
            }
            None => CommandOutcome::Ignored,
        }
    }

    async fn with_selected_client(&self, f: impl FnOnce(&dyn Client)) -> CommandOutcome {
        let Some(clients) = &self.clients else {
            return CommandOutcome::Ignored;
        };
        match clients.select_client(self.host.ui.as_ref()).await {
            Ok(client) => {
                f(client.as_ref());
                CommandOutcome::Done
            }
            Err(e) => {
                tracing::debug!("No client selected: {}", e);
                e.into()
            }
        }
    }

    fn require_folder(&self, action: &str) -> Result<(), CommandOutcome> {
        if !self.host.workbench.workspace_folders().is_empty() {
            return Ok(());
        }
        let message = format!("Open a folder first to {}", action);
        self.host.ui.show_information_message(&message);
        Err(CommandOutcome::PreconditionFailed(message))
    }

    fn active_c_or_cpp_editor(&self) -> Option<TextEditor> {
        self.host
            .workbench
            .active_text_editor()
            .filter(|e| self.is_relevant(&e.document))
    }

    async fn navigate(&self) -> CommandOutcome {
        let Some(editor) = self.active_c_or_cpp_editor() else {
            return CommandOutcome::Ignored;
        };
        let Some(client) = self.active_client() else {
            return CommandOutcome::Ignored;
        };
        match client.request_navigation_list(&editor.document).await {
            Ok(items) => {
                self.host.ui.show_navigation_options(items);
                CommandOutcome::Done
            }
            Err(e) => failed(CommandId::Navigate, e),
        }
    }

    async fn go_to_declaration(&self, command: CommandId, host_command: &str) -> CommandOutcome {
        let Some(client) = self.active_client() else {
            return CommandOutcome::Ignored;
        };
        if let Err(e) = client.request_go_to_declaration().await {
            return failed(command, e);
        }
        match self.host.workbench.execute_command(host_command).await {
            Ok(()) => CommandOutcome::Done,
            Err(e) => failed(command, e),
        }
    }

    async fn switch_header_source(&self) -> CommandOutcome {
        let Some(editor) = self.active_c_or_cpp_editor() else {
            return CommandOutcome::Ignored;
        };
        let Some(client) = self.active_client() else {
            return CommandOutcome::Ignored;
        };

        let file_name = editor.document.file_name.clone();
        let root_path = client
            .root_path()
            .or_else(|| file_name.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        let target = match client
            .request_switch_header_source(&root_path, &file_name)
            .await
        {
            Ok(target) => target,
            Err(e) => return failed(CommandId::SwitchHeaderSource, e),
        };

        let document = match self.host.workbench.open_text_document(&target).await {
            Ok(document) => document,
            Err(e) => return failed(CommandId::SwitchHeaderSource, e),
        };

        // Look again: the open may have taken a while.
        let visible = self.host.workbench.visible_text_editors();
        let active = self.host.workbench.active_text_editor();
        let column = target_column(&document, &visible, active.as_ref());
        self.host.workbench.show_text_document(&document, column);
        CommandOutcome::Done
    }

    fn toggle_setting(&self, key: &str, first: &str, second: &str) -> CommandOutcome {
        let root = self.active_client().and_then(|c| c.root_path());
        self.host
            .settings
            .toggle(root.as_deref(), key, first, second);
        CommandOutcome::Done
    }

    fn toggle_snippets(&self) -> CommandOutcome {
        let Some(manifest) = &self.config.snippets_manifest else {
            return failed(CommandId::ToggleSnippets, "no extension manifest configured");
        };
        match snippets::toggle_snippets_file(manifest) {
            Ok(state) => {
                tracing::info!(
                    "Snippets {}",
                    match state {
                        SnippetsState::Enabled => "enabled",
                        SnippetsState::Disabled => "disabled",
                    }
                );
                self.host.ui.prompt_for_reload("Snippets");
                CommandOutcome::Done
            }
            Err(e) => failed(CommandId::ToggleSnippets, e),
        }
    }
}
