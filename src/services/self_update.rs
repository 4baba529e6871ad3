//! Background self-update for insiders builds.
//!
//! Dormant unless the update channel is switched away from the default. Each
//! check fetches the releases manifest, compares versions, downloads the
//! package for this platform and hands it to the host's launcher to install.
//! Every failure aborts the check quietly; this is a convenience, not a
//! critical path.
//!
//! Checks run on a background thread (the HTTP client is blocking) and report
//! through a channel that [`SelfUpdateChecker::poll`] drains on the host's
//! event thread.

use super::time_source::SharedTimeSource;
use super::timer::IntervalTimer;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MANIFEST_URL: &str =
    "https://api.github.com/repos/Microsoft/vscode-cpptools/releases";

/// Build suffix that marks a package as eligible for self-update.
pub const INSIDERS_SUFFIX: &str = "insiders";

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Whole-request limit for the releases manifest.
pub const DEFAULT_MANIFEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Packages are large; a download only fails when the connection stalls.
const DOWNLOAD_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: u32 = 5;

/// One entry of the releases manifest (newest first).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("package version '{0}' is not an insiders build")]
    NotInsiders(String),
    #[error("failed to fetch releases manifest: {0}")]
    Fetch(String),
    #[error("failed to parse releases manifest: {0}")]
    Manifest(String),
    #[error("releases manifest is empty")]
    NoReleases,
    #[error("no update package for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },
    #[error("release {release} has no asset named {asset}")]
    AssetMissing { release: String, asset: String },
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("could not locate the host launcher: {0}")]
    Launcher(String),
    #[error("install failed: {0}")]
    Install(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { current: String, latest: String },
    Installed { version: String, package: PathBuf },
}

/// Everything a check needs; shared with the background thread.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    pub manifest_url: String,
    /// Version string of the running package, e.g. `1.2.0-insiders`.
    pub package_version: String,
    pub download_dir: PathBuf,
    pub os: String,
    pub arch: String,
    pub interval: Duration,
    pub manifest_timeout: Duration,
}

impl UpdateConfig {
    pub fn for_current_platform(
        manifest_url: impl Into<String>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            package_version: env!("CARGO_PKG_VERSION").to_string(),
            download_dir: download_dir.into(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            interval: DEFAULT_CHECK_INTERVAL,
            manifest_timeout: DEFAULT_MANIFEST_TIMEOUT,
        }
    }
}

/// Installs a downloaded package into the host.
pub trait ExtensionInstaller: Send + Sync {
    fn install(&self, package: &Path) -> anyhow::Result<()>;
}

/// Installs through the host's command-line launcher
/// (`<launcher> --install-extension <package>`).
#[derive(Debug, Clone)]
pub struct LauncherInstaller {
    pub os: String,
    pub host_executable: PathBuf,
}

impl LauncherInstaller {
    pub fn for_current_process() -> io::Result<Self> {
        Ok(Self {
            os: std::env::consts::OS.to_string(),
            host_executable: std::env::current_exe()?,
        })
    }
}

impl ExtensionInstaller for LauncherInstaller {
    fn install(&self, package: &Path) -> anyhow::Result<()> {
        let launcher = launcher_path(&self.os, &self.host_executable, std::env::var_os("PATH"))
            .map_err(|e| anyhow::anyhow!(e))?;
        tracing::info!(
            "Installing {} with {}",
            package.display(),
            launcher.display()
        );
        let status = Command::new(&launcher)
            .arg("--install-extension")
            .arg(package)
            .status()?;
        if !status.success() {
            anyhow::bail!("{} exited with {}", launcher.display(), status);
        }
        Ok(())
    }
}

/// Version of the running package with its build suffix stripped.
///
/// Returns `None` unless the suffix is the insiders tag, so stable builds
/// never pull an insiders release.
pub fn current_version(package_version: &str) -> Option<&str> {
    match package_version.split_once('-') {
        Some((version, INSIDERS_SUFFIX)) => Some(version),
        _ => None,
    }
}

/// Whether `latest` should replace `current`.
///
/// Plain string ordering, not semantic versioning: `"1.10.0"` sorts before
/// `"1.9.0"`.
pub fn is_update_available(current: &str, latest: &str) -> bool {
    current < latest
}

/// Package name for this platform. Only Linux builds are published for
/// self-update.
pub fn platform_asset_name(os: &str, arch: &str) -> Option<&'static str> {
    match (os, arch) {
        ("linux", "x86_64") => Some("cpptools-linux.vsix"),
        ("linux", "x86") => Some("cpptools-linux32.vsix"),
        _ => None,
    }
}

pub fn find_asset<'a>(release: &'a Release, asset_name: &str) -> Option<&'a ReleaseAsset> {
    release.assets.iter().find(|a| a.name == asset_name)
}

/// Path of the host's command-line launcher, derived from the host binary.
///
/// `search_path` is the `PATH` used on Linux, where the launcher is the host
/// binary's name resolved like a shell would.
pub fn launcher_path(
    os: &str,
    host_executable: &Path,
    search_path: Option<OsString>,
) -> Result<PathBuf, UpdateError> {
    let bin_name = host_executable
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| UpdateError::Launcher(host_executable.display().to_string()))?;

    match os {
        "windows" => {
            let cmd_file = match bin_name.as_str() {
                "Code - Insiders.exe" => "code-insiders.cmd",
                "Code - Exploration.exe" => "code-exploration.cmd",
                _ => "code.cmd",
            };
            let exe_dir = host_executable
                .parent()
                .ok_or_else(|| UpdateError::Launcher(host_executable.display().to_string()))?;
            Ok(exe_dir.join("bin").join(cmd_file))
        }
        "macos" => {
            // The extension host runs from a helper bundle nested in
            // <App>.app/Contents/Frameworks; the launcher is in the outer bundle.
            let contents = host_executable
                .ancestors()
                .nth(5)
                .ok_or_else(|| UpdateError::Launcher(host_executable.display().to_string()))?;
            Ok(contents
                .join("Resources")
                .join("app")
                .join("bin")
                .join("code"))
        }
        _ => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
            which::which_in(&bin_name, search_path, cwd)
                .map_err(|e| UpdateError::Launcher(format!("{}: {}", bin_name, e)))
        }
    }
}

fn agent_builder() -> ureq::AgentBuilder {
    ureq::AgentBuilder::new()
        .timeout_connect(CONNECT_TIMEOUT)
        .redirects(MAX_REDIRECTS)
        .user_agent(concat!("cpp-ext-host/", env!("CARGO_PKG_VERSION")))
}

/// Agent for the manifest: the whole request must finish within `timeout`.
fn manifest_agent(timeout: Duration) -> ureq::Agent {
    agent_builder().timeout(timeout).build()
}

/// Agent for packages: no overall limit, only a per-read idle timeout.
fn download_agent() -> ureq::Agent {
    agent_builder().timeout_read(DOWNLOAD_IDLE_TIMEOUT).build()
}

/// Fetch and decode the releases manifest, following redirects.
pub fn fetch_releases(agent: &ureq::Agent, url: &str) -> Result<Vec<Release>, UpdateError> {
    let response = agent
        .get(url)
        .call()
        .map_err(|e| UpdateError::Fetch(e.to_string()))?;
    response
        .into_json::<Vec<Release>>()
        .map_err(|e| UpdateError::Manifest(e.to_string()))
}

/// Download `url` to `destination`, replacing any previous file.
pub fn download_asset(
    agent: &ureq::Agent,
    url: &str,
    destination: &Path,
) -> Result<PathBuf, UpdateError> {
    let download_error = |reason: String| UpdateError::Download {
        url: url.to_string(),
        reason,
    };

    let response = agent.get(url).call().map_err(|e| download_error(e.to_string()))?;
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| download_error(e.to_string()))?;
    }
    let mut file = File::create(destination).map_err(|e| download_error(e.to_string()))?;
    io::copy(&mut response.into_reader(), &mut file).map_err(|e| download_error(e.to_string()))?;
    Ok(destination.to_path_buf())
}

/// Run one complete check: manifest, version gate, asset, download, install.
pub fn run_update_check(
    config: &UpdateConfig,
    installer: &dyn ExtensionInstaller,
) -> Result<UpdateOutcome, UpdateError> {
    let current = current_version(&config.package_version)
        .ok_or_else(|| UpdateError::NotInsiders(config.package_version.clone()))?;

    let releases = fetch_releases(
        &manifest_agent(config.manifest_timeout),
        &config.manifest_url,
    )?;
    let latest = releases.first().ok_or(UpdateError::NoReleases)?;

    if !is_update_available(current, &latest.name) {
        return Ok(UpdateOutcome::UpToDate {
            current: current.to_string(),
            latest: latest.name.clone(),
        });
    }

    let asset_name = platform_asset_name(&config.os, &config.arch).ok_or_else(|| {
        UpdateError::UnsupportedPlatform {
            os: config.os.clone(),
            arch: config.arch.clone(),
        }
    })?;
    let asset = find_asset(latest, asset_name).ok_or_else(|| UpdateError::AssetMissing {
        release: latest.name.clone(),
        asset: asset_name.to_string(),
    })?;

    let package = download_asset(
        &download_agent(),
        &asset.browser_download_url,
        &config.download_dir.join(asset_name),
    )?;
    installer.install(&package).map_err(UpdateError::Install)?;

    Ok(UpdateOutcome::Installed {
        version: latest.name.clone(),
        package,
    })
}

/// Timer plus in-flight checks.
pub struct SelfUpdateChecker {
    config: Arc<UpdateConfig>,
    installer: Arc<dyn ExtensionInstaller>,
    time_source: SharedTimeSource,
    timer: Option<IntervalTimer>,
    in_flight: Vec<Receiver<Result<UpdateOutcome, UpdateError>>>,
}

impl SelfUpdateChecker {
    pub fn new(
        config: UpdateConfig,
        installer: Arc<dyn ExtensionInstaller>,
        time_source: SharedTimeSource,
    ) -> Self {
        Self {
            config: Arc::new(config),
            installer,
            time_source,
            timer: None,
            in_flight: Vec::new(),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// (Re)start the periodic timer.
    pub fn arm(&mut self) {
        tracing::debug!("Arming self-update timer ({:?})", self.config.interval);
        self.timer = Some(IntervalTimer::start(
            self.config.interval,
            self.time_source.clone(),
        ));
    }

    /// Stop the periodic timer. Checks already running still finish.
    pub fn cancel(&mut self) {
        if self.timer.take().is_some() {
            tracing::debug!("Self-update timer cancelled");
        }
    }

    /// Start a check on a background thread, unless one is still running.
    ///
    /// Overlapping checks would download to the same package path.
    pub fn check_now(&mut self) {
        if !self.in_flight.is_empty() {
            tracing::debug!("Self-update check already running");
            return;
        }
        let (tx, rx) = mpsc::channel();
        let config = self.config.clone();
        let installer = self.installer.clone();
        let spawned = thread::Builder::new()
            .name("self-update".to_string())
            .spawn(move || {
                let _ = tx.send(run_update_check(&config, installer.as_ref()));
            });
        match spawned {
            Ok(_) => self.in_flight.push(rx),
            Err(e) => tracing::debug!("Failed to spawn self-update thread: {}", e),
        }
    }

    /// Fire the timer if due and collect finished checks.
    pub fn poll(&mut self) -> Vec<Result<UpdateOutcome, UpdateError>> {
        if self.timer.as_mut().is_some_and(|t| t.poll()) {
            self.check_now();
        }

        let mut finished = Vec::new();
        self.in_flight.retain(|rx| match rx.try_recv() {
            Ok(result) => {
                finished.push(result);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => false,
        });

        for result in &finished {
            match result {
                Ok(UpdateOutcome::Installed { version, .. }) => {
                    tracing::info!("Installed update {}", version)
                }
                Ok(UpdateOutcome::UpToDate { current, latest }) => {
                    tracing::debug!("Up to date ({} >= {})", current, latest)
                }
                Err(e) => tracing::debug!("Self-update check aborted: {}", e),
            }
        }
        finished
    }
}
