//! Crash-log reporting for the language server on macOS.
//!
//! macOS writes a diagnostic report for every crashing process. We watch the
//! report folder, pick up reports written by our own binaries and send the
//! crashing thread's call stack as `MacCrash` telemetry. The stack is
//! normalised (addresses, system frames and process prefixes removed) so that
//! identical crashes aggregate.

use super::telemetry::{Telemetry, TelemetryEvent, TelemetryProperties};
use super::time_source::SharedTimeSource;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

pub const CRASH_FILE_PREFIX: &str = "Microsoft.VSCode.CPP.";

/// Reports are read this long after they appear, so the OS can finish writing.
pub const READ_DELAY: Duration = Duration::from_secs(5);

pub const CALL_STACK_PROPERTY: &str = "CrashingThreadCallStack";

const MAX_CALL_STACK_LEN: usize = 8192;
const CRASH_START: &str = " Crashed:";
const PROCESS_NAMES: &[&str] = &[
    "Microsoft.VSCode.CPP.IntelliSense.Msvc.darwin\t",
    "Microsoft.VSCode.CPP.Extension.darwin\t",
];

static ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"0x.{16} ").expect("static pattern"));

/// `~/Library/Logs/DiagnosticReports`
pub fn default_crash_folder() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join("Library")
            .join("Logs")
            .join("DiagnosticReports")
    })
}

/// Reduce a crash report to the normalised call stack of the crashing thread.
///
/// When the report has an unexpected shape, a short reason is returned
/// instead so the failure itself is visible in telemetry.
pub fn summarize_crash_log(report: &str) -> String {
    let mut data = match report.find("Version:") {
        Some(start) => &report[start..],
        None => report,
    };

    let Some(crash_pos) = data.find(CRASH_START) else {
        return "No crash start".to_string();
    };
    // Skip the marker and the line break after it.
    let start = crash_pos + CRASH_START.len() + 1;
    let Some(rest) = data.get(start..) else {
        return "No crash end".to_string();
    };
    let end = rest.find("Thread ").unwrap_or(rest.len().saturating_sub(1));
    if end == 0 {
        return "No crash end".to_string();
    }
    data = rest.get(..end).unwrap_or(rest);

    let mut stack = ADDRESS.replace_all(data, "").into_owned();

    let Some(process) = PROCESS_NAMES.iter().find(|p| stack.contains(*p)) else {
        return "No process".to_string();
    };
    stack = format!("{}\n{}", process, stack.replace(process, ""));

    let mut summary = String::new();
    for line in stack.split('\n') {
        if line.contains(".dylib") || line.contains("???") {
            continue;
        }
        summary.push_str(line);
        summary.push('\n');
    }
    let summary = summary.trim_end();

    if summary.chars().count() > MAX_CALL_STACK_LEN {
        let truncated: String = summary.chars().take(MAX_CALL_STACK_LEN - 3).collect();
        format!("{}...", truncated)
    } else {
        summary.to_string()
    }
}

/// Send a `MacCrash` event carrying `call_stack`.
pub fn report_crash(telemetry: &dyn Telemetry, call_stack: String) {
    let mut properties = TelemetryProperties::new();
    properties.insert(CALL_STACK_PROPERTY.to_string(), call_stack);
    telemetry.log_event(TelemetryEvent::MacCrash, properties);
}

#[derive(Debug)]
struct PendingRead {
    path: PathBuf,
    due: Instant,
    retried: bool,
}

/// Watches the diagnostic report folder and reports our crashes.
pub struct CrashLogWatcher {
    folder: PathBuf,
    time_source: SharedTimeSource,
    events: Option<Receiver<String>>,
    // Dropping the watcher stops the OS-level watch.
    _watcher: Option<RecommendedWatcher>,
    previous_file: String,
    pending: Vec<PendingRead>,
}

impl CrashLogWatcher {
    /// A watcher fed only through [`CrashLogWatcher::on_file_event`].
    pub fn detached(folder: impl Into<PathBuf>, time_source: SharedTimeSource) -> Self {
        Self {
            folder: folder.into(),
            time_source,
            events: None,
            _watcher: None,
            previous_file: String::new(),
            pending: Vec::new(),
        }
    }

    /// Start watching `folder`.
    ///
    /// A folder that cannot be stat'ed is reported as a `MacCrash` event
    /// carrying the error kind, and no watcher is returned.
    pub fn start(
        folder: &Path,
        time_source: SharedTimeSource,
        telemetry: &dyn Telemetry,
    ) -> Option<Self> {
        if let Err(e) = fs::metadata(folder) {
            let mut properties = TelemetryProperties::new();
            properties.insert("fs.stat: err.code".to_string(), format!("{:?}", e.kind()));
            telemetry.log_event(TelemetryEvent::MacCrash, properties);
            return None;
        }

        let mut this = Self::detached(folder, time_source);
        let (tx, rx) = mpsc::channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else {
                return;
            };
            let relevant = matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(notify::event::ModifyKind::Name(_))
            );
            if !relevant {
                return;
            }
            for path in event.paths {
                if let Some(name) = path.file_name() {
                    let _ = tx.send(name.to_string_lossy().into_owned());
                }
            }
        })
        .and_then(|mut w| w.watch(folder, RecursiveMode::NonRecursive).map(|_| w));

        match watcher {
            Ok(w) => {
                tracing::debug!("Watching crash reports in {:?}", folder);
                this._watcher = Some(w);
                this.events = Some(rx);
            }
            // e.g. the watch limit was hit; crash reporting is optional
            Err(e) => tracing::debug!("Crash report watcher unavailable: {}", e),
        }
        Some(this)
    }

    /// A report file appeared or was renamed in the folder.
    pub fn on_file_event(&mut self, file_name: &str) {
        if file_name == self.previous_file {
            return;
        }
        self.previous_file = file_name.to_string();
        if !file_name.starts_with(CRASH_FILE_PREFIX) {
            return;
        }
        tracing::info!("Crash report detected: {}", file_name);
        self.pending.push(PendingRead {
            path: self.folder.join(file_name),
            due: self.time_source.now() + READ_DELAY,
            retried: false,
        });
    }

    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    /// Drain watcher events and read reports whose delay has passed.
    pub fn poll(&mut self, telemetry: &dyn Telemetry) {
        let names: Vec<String> = self
            .events
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default();
        for name in names {
            self.on_file_event(&name);
        }

        let now = self.time_source.now();
        let (due, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = waiting;

        for mut read in due {
            match fs::read_to_string(&read.path) {
                Ok(report) => report_crash(telemetry, summarize_crash_log(&report)),
                Err(e) if !read.retried => {
                    tracing::debug!("Retrying crash report read {:?}: {}", read.path, e);
                    read.retried = true;
                    self.pending.push(read);
                }
                Err(e) => report_crash(telemetry, format!("readFile: {:?}", e.kind())),
            }
        }
    }
}
