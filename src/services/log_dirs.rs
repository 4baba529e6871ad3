//! XDG-compliant state and log directory management
//!
//! Logs live in `$XDG_STATE_HOME/cpp-ext-host/logs/` (typically
//! `~/.local/state/cpp-ext-host/logs/`), one file per process so concurrent
//! editor windows do not interleave their output. Downloaded update packages
//! go to a sibling `downloads/` directory.

use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

const APP_DIR_NAME: &str = "cpp-ext-host";

static STATE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Base state directory, falling back to the system temp directory when no
/// home directory can be determined.
pub fn state_dir() -> &'static PathBuf {
    STATE_DIR.get_or_init(|| {
        std::env::var_os("XDG_STATE_HOME")
            .map(PathBuf::from)
            .filter(|p| p.is_absolute())
            .or_else(dirs::state_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("state")))
            .map(|base| base.join(APP_DIR_NAME))
            .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
    })
}

fn ensure_dir(dir: PathBuf) -> PathBuf {
    if let Err(e) = fs::create_dir_all(&dir) {
        tracing::warn!("Failed to create directory {:?}: {}", dir, e);
    }
    dir
}

/// `{state_dir}/logs/`, created on demand.
pub fn log_dir() -> PathBuf {
    ensure_dir(state_dir().join("logs"))
}

/// `{log_dir}/cpp-ext-host-{PID}.log`
pub fn main_log_path() -> PathBuf {
    log_dir().join(format!("{}-{}.log", APP_DIR_NAME, std::process::id()))
}

/// `{state_dir}/downloads/`, created on demand.
pub fn downloads_dir() -> PathBuf {
    ensure_dir(state_dir().join("downloads"))
}

/// `{state_dir}/workspace-state.json`
pub fn workspace_state_path() -> PathBuf {
    state_dir().join("workspace-state.json")
}

/// Print every directory the host uses, one per line.
pub fn print_all_paths() {
    println!("State directory:     {}", state_dir().display());
    println!("Log directory:       {}", log_dir().display());
    println!("Downloads:           {}", downloads_dir().display());
    println!("Workspace state:     {}", workspace_state_path().display());
}
