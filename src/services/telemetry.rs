use serde::Serialize;
use std::collections::BTreeMap;
use std::env::consts::{ARCH, OS};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Free-form string properties attached to an event.
pub type TelemetryProperties = BTreeMap<String, String>;

/// The events the extension reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryEvent {
    MacCrash,
    TakeSurvey,
    LanguageServerShutdown,
}

impl TelemetryEvent {
    pub fn name(self) -> &'static str {
        match self {
            TelemetryEvent::MacCrash => "MacCrash",
            TelemetryEvent::TakeSurvey => "onTakeSurvey",
            TelemetryEvent::LanguageServerShutdown => "LanguageServerShutdown",
        }
    }
}

pub trait Telemetry {
    fn log_event(&self, event: TelemetryEvent, properties: TelemetryProperties);

    /// Wait for events still being delivered.
    fn flush(&self) {}
}

/// Records events in the log only.
#[derive(Debug, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn log_event(&self, event: TelemetryEvent, properties: TelemetryProperties) {
        tracing::info!(event = event.name(), ?properties, "telemetry");
    }
}

#[derive(Serialize)]
struct Payload {
    event: &'static str,
    version: &'static str,
    os: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: TelemetryProperties,
}

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts events as JSON to a collector endpoint.
///
/// Each event is sent on its own thread; failures are only logged.
#[derive(Debug)]
pub struct HttpTelemetry {
    endpoint: String,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl HttpTelemetry {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl Telemetry for HttpTelemetry {
    fn log_event(&self, event: TelemetryEvent, properties: TelemetryProperties) {
        let payload = Payload {
            event: event.name(),
            version: env!("CARGO_PKG_VERSION"),
            os: format!("{}-{}", OS, ARCH),
            properties,
        };
        // Serialize to JSON string to own the data for the thread
        let Ok(body) = serde_json::to_string(&payload) else {
            return;
        };

        let endpoint = self.endpoint.clone();
        let spawned = thread::Builder::new()
            .name("telemetry".to_string())
            .spawn(move || {
                if let Err(e) = ureq::post(&endpoint)
                    .set("Content-Type", "application/json")
                    .timeout(SEND_TIMEOUT)
                    .send_bytes(body.as_bytes())
                {
                    tracing::debug!("Telemetry send failed: {}", e);
                }
            });
        match spawned {
            Ok(handle) => {
                if let Ok(mut pending) = self.pending.lock() {
                    pending.retain(|h| !h.is_finished());
                    pending.push(handle);
                }
            }
            Err(e) => tracing::debug!("Failed to spawn telemetry thread: {}", e),
        }
    }

    fn flush(&self) {
        let handles = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}
