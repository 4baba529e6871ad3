//! Command dispatch against fake clients and host

use crate::common::harness::{editor, ExtensionHarness};
use cpp_ext_host::extension::{CommandId, CommandOutcome};
use cpp_ext_host::services::telemetry::TelemetryEvent;
use cpp_ext_host::settings::{
    DIM_INACTIVE_REGIONS_KEY, ERROR_SQUIGGLES_KEY, INCLUDE_FALLBACK_KEY,
};
use cpp_ext_host::types::{NavigationItem, Position, ViewColumn};
use serde_json::json;

#[tokio::test]
async fn test_navigate_shows_client_list() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();
    let items = vec![NavigationItem {
        label: "main()".to_string(),
        position: Position::new(4, 0),
    }];
    *harness.client(0).navigation_items.borrow_mut() = items.clone();

    // Without a c/cpp editor there is nothing to navigate.
    assert_eq!(
        context.execute_command(CommandId::Navigate, None).await,
        CommandOutcome::Ignored
    );

    harness.set_active_editor(Some(editor(harness.folder_path("proj").join("main.cpp"))));
    assert_eq!(
        context.execute_command(CommandId::Navigate, None).await,
        CommandOutcome::Done
    );
    assert_eq!(*harness.ui.navigation_options.borrow(), vec![items]);
}

#[tokio::test]
async fn test_go_to_and_peek_declaration_run_host_commands() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();

    context
        .execute_command(CommandId::GoToDeclaration, None)
        .await;
    context
        .execute_command(CommandId::PeekDeclaration, None)
        .await;

    assert_eq!(
        harness.calls(),
        vec![
            "proj:request_go_to_declaration",
            "workbench:execute editor.action.goToDeclaration",
            "proj:request_go_to_declaration",
            "workbench:execute editor.action.peekDefinition",
        ]
    );
}

#[tokio::test]
async fn test_failed_requests_are_swallowed() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();
    harness.client(0).fail_requests.set(true);
    harness.set_active_editor(Some(editor(harness.folder_path("proj").join("main.cpp"))));

    for command in [
        CommandId::GoToDeclaration,
        CommandId::Navigate,
        CommandId::SwitchHeaderSource,
    ] {
        let outcome = context.execute_command(command, None).await;
        assert!(
            matches!(outcome, CommandOutcome::Failed(_)),
            "{} gave {:?}",
            command,
            outcome
        );
    }
    assert!(harness.workbench.executed.borrow().is_empty());
    assert!(harness.ui.messages.borrow().is_empty());
}

#[tokio::test]
async fn test_switch_header_source_reuses_visible_column() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();
    let source = harness.folder_path("proj").join("widget.cpp");
    let header = harness.folder_path("proj").join("widget.h");
    *harness.client(0).switch_target.borrow_mut() = Some(header.clone());

    harness.set_active_editor(Some(
        editor(&source).with_column(ViewColumn::Column(1)),
    ));
    harness.workbench.visible_editors.borrow_mut().extend([
        editor(&source).with_column(ViewColumn::Column(1)),
        editor(&header).with_column(ViewColumn::Column(2)),
    ]);

    assert_eq!(
        context
            .execute_command(CommandId::SwitchHeaderSource, None)
            .await,
        CommandOutcome::Done
    );

    assert_eq!(
        harness.calls_matching("request_switch_header_source"),
        vec![format!(
            "proj:request_switch_header_source {} {}",
            harness.folder_path("proj").display(),
            source.display()
        )]
    );
    let shown = harness.workbench.shown.borrow();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].1, ViewColumn::Column(2));
}

#[tokio::test]
async fn test_switch_header_source_falls_back_to_active_column() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();
    let source = harness.folder_path("proj").join("widget.cpp");
    *harness.client(0).switch_target.borrow_mut() =
        Some(harness.folder_path("proj").join("widget.h"));
    harness.set_active_editor(Some(
        editor(&source).with_column(ViewColumn::Column(3)),
    ));

    context
        .execute_command(CommandId::SwitchHeaderSource, None)
        .await;

    assert_eq!(harness.workbench.shown.borrow()[0].1, ViewColumn::Column(3));
}

#[tokio::test]
async fn test_switch_header_source_without_folder_uses_file_directory() {
    let harness = ExtensionHarness::new();
    let mut context = harness.active_context();
    let dir = harness.temp_dir.path().join("loose");
    let source = dir.join("a.c");
    *harness.client(0).switch_target.borrow_mut() = Some(dir.join("a.h"));
    harness.set_active_editor(Some(editor(&source)));

    context
        .execute_command(CommandId::SwitchHeaderSource, None)
        .await;

    assert_eq!(
        harness.calls_matching("request_switch_header_source"),
        vec![format!(
            "(no folder):request_switch_header_source {} {}",
            dir.display(),
            source.display()
        )]
    );
}

#[tokio::test]
async fn test_folder_commands_need_a_folder() {
    let harness = ExtensionHarness::new();
    let mut context = harness.active_context();

    let cases = [
        (CommandId::ConfigurationSelect, "select a configuration"),
        (
            CommandId::ConfigurationProviderSelect,
            "select a configuration provider",
        ),
        (CommandId::ConfigurationEdit, "edit configurations"),
        (CommandId::AddToIncludePath, "add to includePath"),
    ];
    for (command, action) in cases {
        let outcome = context.execute_command(command, Some("/usr/include")).await;
        let message = format!("Open a folder first to {}", action);
        assert_eq!(outcome, CommandOutcome::PreconditionFailed(message.clone()));
        assert_eq!(harness.ui.messages.borrow().last(), Some(&message));
    }
    assert!(harness.calls().is_empty());
}

#[tokio::test]
async fn test_workspace_commands_reach_selected_client() {
    let harness = ExtensionHarness::new()
        .with_folder("app")
        .with_folder("lib");
    let mut context = harness.active_context();
    *harness.ui.workspace_choice.borrow_mut() = Some("lib".to_string());

    for command in [
        CommandId::ResetDatabase,
        CommandId::ConfigurationSelect,
        CommandId::ConfigurationProviderSelect,
        CommandId::ConfigurationEdit,
        CommandId::PauseParsing,
        CommandId::ResumeParsing,
        CommandId::ShowParsingCommands,
    ] {
        assert_eq!(
            context.execute_command(command, None).await,
            CommandOutcome::Done
        );
    }

    assert_eq!(harness.ui.picker_calls.get(), 7);
    assert_eq!(
        harness.calls_matching("lib:"),
        vec![
            "lib:reset_database",
            "lib:configuration_select",
            "lib:configuration_provider_select",
            "lib:configuration_edit",
            "lib:pause_parsing",
            "lib:resume_parsing",
            "lib:show_parsing_commands",
        ]
    );
    assert!(harness.calls_matching("app:").is_empty());
}

#[tokio::test]
async fn test_add_to_include_path_uses_active_client() {
    let harness = ExtensionHarness::new()
        .with_folder("app")
        .with_folder("lib");
    let mut context = harness.active_context();

    assert_eq!(
        context.execute_command(CommandId::AddToIncludePath, None).await,
        CommandOutcome::Ignored
    );
    assert_eq!(
        context
            .execute_command(CommandId::AddToIncludePath, Some("/opt/include"))
            .await,
        CommandOutcome::Done
    );

    assert_eq!(harness.ui.picker_calls.get(), 0);
    assert_eq!(
        harness.calls(),
        vec!["app:add_to_include_path /opt/include"]
    );
}

#[tokio::test]
async fn test_toggles_flip_settings_in_active_root() {
    let harness = ExtensionHarness::new().with_folder("proj");
    let mut context = harness.active_context();
    let root = harness.folder_path("proj");

    context
        .execute_command(CommandId::ToggleErrorSquiggles, None)
        .await;
    context
        .execute_command(CommandId::ToggleIncludeFallback, None)
        .await;
    context
        .execute_command(CommandId::ToggleDimInactiveRegions, None)
        .await;

    let get = |key| harness.settings.value(Some(root.as_path()), key);
    assert_eq!(get(ERROR_SQUIGGLES_KEY).as_deref(), Some("Enabled"));
    assert_eq!(get(INCLUDE_FALLBACK_KEY).as_deref(), Some("Enabled"));
    assert_eq!(get(DIM_INACTIVE_REGIONS_KEY).as_deref(), Some("true"));

    context
        .execute_command(CommandId::ToggleErrorSquiggles, None)
        .await;
    context
        .execute_command(CommandId::ToggleDimInactiveRegions, None)
        .await;
    assert_eq!(get(ERROR_SQUIGGLES_KEY).as_deref(), Some("Disabled"));
    assert_eq!(get(DIM_INACTIVE_REGIONS_KEY).as_deref(), Some("false"));
}

#[tokio::test]
async fn test_toggle_snippets_twice_restores_manifest() {
    let mut harness = ExtensionHarness::new();
    let manifest_path = harness.temp_dir.path().join("package.json");
    let original = json!({
        "name": "cpptools",
        "categories": ["Programming Languages", "Debuggers"],
        "contributes": { "languages": [] }
    });
    std::fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&original).unwrap(),
    )
    .unwrap();
    harness.config.snippets_manifest = Some(manifest_path.clone());
    let mut context = harness.active_context();

    assert_eq!(
        context.execute_command(CommandId::ToggleSnippets, None).await,
        CommandOutcome::Done
    );
    let enabled: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(
        enabled["categories"],
        json!(["Programming Languages", "Debuggers", "Snippets"])
    );
    assert_eq!(enabled["contributes"]["snippets"][1]["language"], "cpp");

    context.execute_command(CommandId::ToggleSnippets, None).await;
    let restored: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest_path).unwrap()).unwrap();
    assert_eq!(restored, original);
    assert_eq!(
        *harness.ui.reload_prompts.borrow(),
        vec!["Snippets", "Snippets"]
    );
}

#[tokio::test]
async fn test_toggle_snippets_without_manifest_fails_quietly() {
    let harness = ExtensionHarness::new();
    let mut context = harness.active_context();

    let outcome = context.execute_command(CommandId::ToggleSnippets, None).await;

    assert!(matches!(outcome, CommandOutcome::Failed(_)));
    assert!(harness.ui.reload_prompts.borrow().is_empty());
}

#[tokio::test]
async fn test_survey_and_release_notes() {
    let harness = ExtensionHarness::new();
    let mut context = harness.active_context();

    context.execute_command(CommandId::TakeSurvey, None).await;
    context
        .execute_command(CommandId::ShowReleaseNotes, None)
        .await;

    assert_eq!(harness.telemetry.events.borrow()[0].0, TelemetryEvent::TakeSurvey);
    assert_eq!(
        *harness.workbench.opened_external.borrow(),
        vec!["https://www.research.net/r/VBVV6C6"]
    );
    assert_eq!(harness.ui.release_notes_shown.get(), 1);
}

#[test]
fn test_every_command_is_registered() {
    let harness = ExtensionHarness::new();
    let mut context = harness.context();
    context.activate(false);

    let registered = harness.workbench.registered_commands.borrow();
    for command in CommandId::ALL {
        assert!(registered.contains(&command.id().to_string()));
    }
}
