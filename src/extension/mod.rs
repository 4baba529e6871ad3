//! The extension host context.
//!
//! [`ExtensionContext`] owns everything the extension keeps between host
//! callbacks: the activation gate, the client registry once active, the
//! focused-document tracker, timers and watchers. The host drives it through
//! [`ExtensionContext::activate`], the event handlers in `router`, the
//! commands in `commands`, periodic [`ExtensionContext::tick`] calls and a
//! final [`ExtensionContext::deactivate`].

mod activation;
mod commands;
mod router;

pub use activation::{
    has_config_marker, ActivationGate, ActivationState, ActivationTrigger, PendingWatcher,
};
pub use commands::{CommandId, CommandOutcome, UnknownCommand};

use crate::clients::{ClientFactory, ClientRegistry};
use crate::config::HostConfig;
use crate::host::{Ui, Workbench};
use crate::services::crash_report::CrashLogWatcher;
use crate::services::log_dirs;
use crate::services::self_update::{
    ExtensionInstaller, SelfUpdateChecker, UpdateConfig, UpdateError, UpdateOutcome,
};
use crate::services::telemetry::{Telemetry, TelemetryEvent, TelemetryProperties};
use crate::services::time_source::SharedTimeSource;
use crate::services::timer::IntervalTimer;
use crate::settings::{Settings, WorkspaceState};
use crate::types::{ConfigurationProvider, TextDocument};
use std::rc::Rc;
use std::sync::Arc;

/// The host collaborators the extension talks to.
#[derive(Clone)]
pub struct Host {
    pub workbench: Rc<dyn Workbench>,
    pub ui: Rc<dyn Ui>,
    pub settings: Rc<dyn Settings>,
    pub workspace_state: Rc<dyn WorkspaceState>,
    pub telemetry: Rc<dyn Telemetry>,
    pub client_factory: Rc<dyn ClientFactory>,
    /// Used from the self-update thread, hence `Arc`.
    pub installer: Arc<dyn ExtensionInstaller>,
}

pub struct ExtensionContext {
    host: Host,
    config: HostConfig,
    time_source: SharedTimeSource,

    gate: ActivationGate,
    commands_registered: bool,
    listeners_subscribed: bool,
    deactivated: bool,

    clients: Option<ClientRegistry>,
    /// URI of the focused c/cpp document, empty when there is none.
    active_document: String,

    heartbeat: Option<IntervalTimer>,
    updater: SelfUpdateChecker,
    crash_watcher: Option<CrashLogWatcher>,

    save_message_shown: bool,
    providers: Vec<ConfigurationProvider>,
}

impl ExtensionContext {
    pub fn new(host: Host, config: HostConfig, time_source: SharedTimeSource) -> Self {
        let download_dir = config
            .download_dir
            .clone()
            .unwrap_or_else(log_dirs::downloads_dir);
        let mut update_config =
            UpdateConfig::for_current_platform(config.manifest_url.clone(), download_dir);
        update_config.interval = config.update_interval();
        let updater =
            SelfUpdateChecker::new(update_config, host.installer.clone(), time_source.clone());

        Self {
            host,
            config,
            time_source,
            gate: ActivationGate::new(),
            commands_registered: false,
            listeners_subscribed: false,
            deactivated: false,
            clients: None,
            active_document: String::new(),
            heartbeat: None,
            updater,
            crash_watcher: None,
            save_message_shown: false,
            providers: Vec::new(),
        }
    }

    /// Replace the self-update settings (endpoint, package version, download
    /// folder). Only meaningful before the first check runs.
    pub fn with_update_config(mut self, update_config: UpdateConfig) -> Self {
        self.updater = SelfUpdateChecker::new(
            update_config,
            self.host.installer.clone(),
            self.time_source.clone(),
        );
        self
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn activation_state(&self) -> ActivationState {
        self.gate.state()
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn is_deactivated(&self) -> bool {
        self.deactivated
    }

    pub fn activation_trigger(&self) -> Option<ActivationTrigger> {
        self.gate.trigger()
    }

    pub fn pending_watchers(&self) -> &[PendingWatcher] {
        self.gate.pending_watchers()
    }

    pub fn clients(&self) -> Option<&ClientRegistry> {
        self.clients.as_ref()
    }

    /// URI of the focused c/cpp document, empty when none is focused.
    pub fn active_document(&self) -> &str {
        &self.active_document
    }

    pub fn is_update_timer_armed(&self) -> bool {
        self.updater.is_armed()
    }

    pub fn update_checks_in_flight(&self) -> usize {
        self.updater.in_flight()
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat.is_some()
    }

    pub fn is_watching_crash_reports(&self) -> bool {
        self.crash_watcher.is_some()
    }

    fn is_relevant(&self, document: &TextDocument) -> bool {
        self.config.handles_language(&document.language_id)
    }

    /// Make a custom configuration provider known to every client, now or
    /// once the clients exist. Returns false if the extension already
    /// registered one.
    pub fn register_custom_configuration_provider(
        &mut self,
        provider: ConfigurationProvider,
    ) -> bool {
        if self
            .providers
            .iter()
            .any(|p| p.extension_id == provider.extension_id)
        {
            tracing::warn!(
                "Configuration provider {} registered twice",
                provider.extension_id
            );
            return false;
        }

        tracing::info!("Registered configuration provider {}", provider.name);
        if let Some(clients) = &self.clients {
            clients.for_each(|c| c.on_register_custom_configuration_provider(&provider));
        }
        self.providers.push(provider);
        true
    }

    /// Pump timers and watchers. Returns the self-update checks that
    /// finished since the last call.
    pub fn tick(&mut self) -> Vec<Result<UpdateOutcome, UpdateError>> {
        if self.deactivated {
            return Vec::new();
        }

        if self.heartbeat.as_mut().is_some_and(|t| t.poll()) {
            if let Some(clients) = &self.clients {
                clients.active_client().on_interval();
            }
        }

        if let Some(watcher) = self.crash_watcher.as_mut() {
            watcher.poll(self.host.telemetry.as_ref());
        }

        self.updater.poll()
    }

    /// Tear everything down. Events and commands are ignored afterwards.
    pub fn deactivate(&mut self) {
        if self.deactivated {
            return;
        }
        self.deactivated = true;
        tracing::info!("Deactivating");

        self.host.telemetry.log_event(
            TelemetryEvent::LanguageServerShutdown,
            TelemetryProperties::new(),
        );
        self.host.telemetry.flush();

        self.heartbeat = None;
        self.updater.cancel();
        self.crash_watcher = None;
        self.gate.dispose_watchers();
        self.listeners_subscribed = false;

        self.host.ui.dispose();
        if let Some(clients) = self.clients.take() {
            clients.dispose();
        }
        self.active_document.clear();
    }
}
