use anyhow::{Context, Result as AnyhowResult};
use clap::{Parser, Subcommand};
use cpp_ext_host::config::HostConfig;
use cpp_ext_host::extension::has_config_marker;
use cpp_ext_host::services::crash_report::{report_crash, summarize_crash_log};
use cpp_ext_host::services::self_update::{
    run_update_check, LauncherInstaller, UpdateConfig, UpdateOutcome,
};
use cpp_ext_host::services::{log_dirs, tracing_setup};
use cpp_ext_host::settings::{JsonWorkspaceState, WorkspaceState, ACTIVATED_PREVIOUSLY_KEY};
use cpp_ext_host::snippets::{toggle_snippets_file, SnippetsState};
use std::path::{Path, PathBuf};

/// Command-line entry point
#[derive(Parser, Debug)]
#[command(name = "cpp-ext-host")]
#[command(about = "Activation and self-update tooling for the C/C++ extension host", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file (default: per-process file in the state directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the releases manifest and install a newer insiders build
    CheckUpdate {
        /// Releases manifest to query instead of the configured one
        #[arg(long, value_name = "URL")]
        manifest_url: Option<String>,

        /// Version of the installed package (default: this binary's version)
        #[arg(long, value_name = "VERSION")]
        package_version: Option<String>,
    },

    /// Add or remove the snippets contribution in an extension manifest
    ToggleSnippets {
        #[arg(value_name = "PACKAGE_JSON")]
        manifest: PathBuf,
    },

    /// Summarize a crash report and send it to the configured telemetry sink
    ReportCrash {
        #[arg(value_name = "REPORT")]
        report: PathBuf,
    },

    /// Report whether opening these folders would activate the extension
    Scan {
        #[arg(value_name = "FOLDERS", required = true)]
        folders: Vec<PathBuf>,
    },

    /// Print the directories used by the host and exit
    ShowPaths,

    /// Print the effective configuration as JSON and exit
    DumpConfig,
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();

    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(log_dirs::main_log_path);
    if !tracing_setup::init_global(&log_file) {
        eprintln!("Warning: could not open log file {}", log_file.display());
    }

    let config = HostConfig::load_or_default(args.config.as_deref()).with_context(|| {
        format!(
            "Failed to load config from {}",
            args.config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;

    match args.command {
        Command::CheckUpdate {
            manifest_url,
            package_version,
        } => check_update(&config, manifest_url, package_version),
        Command::ToggleSnippets { manifest } => toggle_snippets(&manifest),
        Command::ReportCrash { report } => send_crash_report(&config, &report),
        Command::Scan { folders } => {
            scan(&config, &folders);
            Ok(())
        }
        Command::ShowPaths => {
            log_dirs::print_all_paths();
            Ok(())
        }
        Command::DumpConfig => {
            let json =
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?;
            println!("{}", json);
            Ok(())
        }
    }
}

fn check_update(
    config: &HostConfig,
    manifest_url: Option<String>,
    package_version: Option<String>,
) -> AnyhowResult<()> {
    let download_dir = config
        .download_dir
        .clone()
        .unwrap_or_else(log_dirs::downloads_dir);
    let mut update_config = UpdateConfig::for_current_platform(
        manifest_url.unwrap_or_else(|| config.manifest_url.clone()),
        download_dir,
    );
    if let Some(version) = package_version {
        update_config.package_version = version;
    }

    let installer =
        LauncherInstaller::for_current_process().context("Failed to locate host executable")?;

    match run_update_check(&update_config, &installer)? {
        UpdateOutcome::UpToDate { current, latest } => {
            println!("Up to date: {} (latest release {})", current, latest);
        }
        UpdateOutcome::Installed { version, package } => {
            println!("Installed {} from {}", version, package.display());
        }
    }
    Ok(())
}

fn toggle_snippets(manifest: &Path) -> AnyhowResult<()> {
    let state = toggle_snippets_file(manifest)
        .with_context(|| format!("Failed to update {}", manifest.display()))?;
    match state {
        SnippetsState::Enabled => println!("Snippets enabled. Reload the host to apply."),
        SnippetsState::Disabled => println!("Snippets disabled. Reload the host to apply."),
    }
    Ok(())
}

fn send_crash_report(config: &HostConfig, report: &Path) -> AnyhowResult<()> {
    let contents = std::fs::read_to_string(report)
        .with_context(|| format!("Failed to read {}", report.display()))?;
    let call_stack = summarize_crash_log(&contents);
    println!("{}", call_stack);

    let telemetry = config.telemetry();
    report_crash(telemetry.as_ref(), call_stack);
    telemetry.flush();
    Ok(())
}

fn scan(config: &HostConfig, folders: &[PathBuf]) {
    let state = JsonWorkspaceState::open(log_dirs::workspace_state_path());
    if state.get_bool(ACTIVATED_PREVIOUSLY_KEY).unwrap_or(false) {
        println!(
            "Previous session was activated ({}): activation is immediate",
            state.path().display()
        );
    }

    for folder in folders {
        let found = has_config_marker(folder, &config.config_marker);
        println!(
            "{}: {}",
            folder.display(),
            if found {
                "configuration found, would activate"
            } else {
                "no configuration, waits for a c/cpp document"
            }
        );
    }
}
