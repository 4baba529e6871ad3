//! Settings and persisted workspace state as seen through the host.
//!
//! Both are owned by the editor; the extension only reads and writes keys.

use indexmap::IndexMap;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

/// Key under which the fast-path activation flag is persisted.
pub const ACTIVATED_PREVIOUSLY_KEY: &str = "activatedPreviously";

pub const UPDATE_CHANNEL_KEY: &str = "updateChannel";
pub const DEFAULT_UPDATE_CHANNEL: &str = "Default";
pub const INSIDERS_UPDATE_CHANNEL: &str = "Insiders";

/// Removed setting; only inspected to tell users about its replacement.
pub const CLANG_FORMAT_ON_SAVE_KEY: &str = "clang_format_formatOnSave";

pub const ERROR_SQUIGGLES_KEY: &str = "errorSquiggles";
pub const INCLUDE_FALLBACK_KEY: &str = "intelliSenseEngineFallback";
pub const DIM_INACTIVE_REGIONS_KEY: &str = "dimInactiveRegions";

/// Settings whose value changed since a client last looked, keyed by setting name.
pub type ChangedSettings = IndexMap<String, String>;

/// Per-resource key/value settings store.
///
/// `resource` scopes a lookup to a workspace folder; `None` means the
/// user/global scope.
pub trait Settings {
    fn get(&self, resource: Option<&Path>, key: &str) -> Option<String>;

    fn update(&self, resource: Option<&Path>, key: &str, value: &str);

    /// Flip a setting between two literal values.
    ///
    /// Anything other than `first` (including unset) becomes `first`.
    fn toggle(&self, resource: Option<&Path>, key: &str, first: &str, second: &str) {
        let next = if self.get(resource, key).as_deref() == Some(first) {
            second
        } else {
            first
        };
        tracing::debug!("Toggling {} to {}", key, next);
        self.update(resource, key, next);
    }

    fn get_bool(&self, resource: Option<&Path>, key: &str) -> bool {
        matches!(self.get(resource, key).as_deref(), Some("true"))
    }
}

/// Opaque per-workspace memento, surviving process restarts.
pub trait WorkspaceState {
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn set_bool(&self, key: &str, value: bool);
}

/// Workspace state kept in a small JSON object on disk.
///
/// Writes are best effort: a failed write is logged and the in-memory value
/// still changes, so the current process behaves consistently.
#[derive(Debug)]
pub struct JsonWorkspaceState {
    path: PathBuf,
    values: RefCell<serde_json::Map<String, serde_json::Value>>,
}

impl JsonWorkspaceState {
    /// Open (or lazily create) the state file at `path`.
    ///
    /// A missing or malformed file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(serde_json::Value::Object(map)) => Some(map),
                Ok(_) | Err(_) => {
                    tracing::warn!("Ignoring malformed workspace state at {:?}", path);
                    None
                }
            })
            .unwrap_or_default();
        Self {
            path,
            values: RefCell::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        let body = match serde_json::to_string_pretty(&*self.values.borrow()) {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!("Failed to serialize workspace state: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                tracing::debug!("Failed to create workspace state directory: {}", e);
                return;
            }
        }
        if let Err(e) = fs::write(&self.path, body) {
            tracing::debug!("Failed to write workspace state {:?}: {}", self.path, e);
        }
    }
}

impl WorkspaceState for JsonWorkspaceState {
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.borrow().get(key).and_then(|v| v.as_bool())
    }

    fn set_bool(&self, key: &str, value: bool) {
        self.values
            .borrow_mut()
            .insert(key.to_string(), serde_json::Value::Bool(value));
        self.flush();
    }
}
