//! Self-update against a local releases endpoint

use crate::common::harness::{ExtensionHarness, RecordingInstaller};
use crate::common::mock_release_server::{MockReleaseServer, PACKAGE_BYTES};
use crate::common::tracing::init_tracing_from_env;
use cpp_ext_host::services::self_update::{
    run_update_check, SelfUpdateChecker, UpdateConfig, UpdateError, UpdateOutcome,
};
use cpp_ext_host::services::time_source::TestTimeSource;
use cpp_ext_host::settings::UPDATE_CHANNEL_KEY;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn linux_config(manifest_url: String, package_version: &str, dir: &Path) -> UpdateConfig {
    UpdateConfig {
        manifest_url,
        package_version: package_version.to_string(),
        download_dir: dir.to_path_buf(),
        os: "linux".to_string(),
        arch: "x86_64".to_string(),
        interval: Duration::from_secs(3600),
        manifest_timeout: Duration::from_secs(30),
    }
}

#[test]
fn test_newer_release_is_downloaded_and_installed() {
    init_tracing_from_env();
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    let outcome = run_update_check(
        &linux_config(server.manifest_url(), "1.2.0-insiders", dir.path()),
        &installer,
    )
    .unwrap();

    let package = dir.path().join("cpptools-linux.vsix");
    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            version: "1.3.0".to_string(),
            package: package.clone(),
        }
    );
    assert_eq!(std::fs::read(&package).unwrap(), PACKAGE_BYTES);
    assert_eq!(installer.installed(), vec![package]);
}

#[test]
fn test_slow_download_outlives_manifest_timeout() {
    init_tracing_from_env();
    let server = MockReleaseServer::start_throttled(
        "1.3.0",
        "cpptools-linux.vsix",
        Duration::from_millis(50),
    );
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();
    let mut config = linux_config(server.manifest_url(), "1.2.0-insiders", dir.path());
    config.manifest_timeout = Duration::from_millis(300);

    let started = Instant::now();
    let outcome = run_update_check(&config, &installer).unwrap();

    // The body alone takes longer than the manifest is allowed to.
    assert!(started.elapsed() > config.manifest_timeout);
    let package = dir.path().join("cpptools-linux.vsix");
    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            version: "1.3.0".to_string(),
            package: package.clone(),
        }
    );
    assert_eq!(std::fs::read(&package).unwrap(), PACKAGE_BYTES);
    assert_eq!(installer.installed(), vec![package]);
}

#[test]
fn test_same_version_is_up_to_date() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    let outcome = run_update_check(
        &linux_config(server.manifest_url(), "1.3.0-insiders", dir.path()),
        &installer,
    )
    .unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::UpToDate {
            current: "1.3.0".to_string(),
            latest: "1.3.0".to_string(),
        }
    );
    assert!(installer.installed().is_empty());
}

#[test]
fn test_versions_compare_as_strings() {
    let server = MockReleaseServer::start("1.9.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    // "1.10.0" sorts before "1.9.0" character by character, so the older
    // release is offered.
    let outcome = run_update_check(
        &linux_config(server.manifest_url(), "1.10.0-insiders", dir.path()),
        &installer,
    );

    assert!(matches!(
        outcome,
        Ok(UpdateOutcome::Installed { ref version, .. }) if version == "1.9.0"
    ));
}

#[test]
fn test_non_insiders_build_never_checks() {
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    // Nothing listens here; the check must stop before any request.
    let outcome = run_update_check(
        &linux_config("http://127.0.0.1:9/".to_string(), "1.2.0-beta", dir.path()),
        &installer,
    );

    assert!(matches!(outcome, Err(UpdateError::NotInsiders(_))));
}

#[test]
fn test_stable_build_never_checks() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    let outcome = run_update_check(
        &linux_config(server.manifest_url(), "1.2.0", dir.path()),
        &installer,
    );

    assert!(matches!(outcome, Err(UpdateError::NotInsiders(v)) if v == "1.2.0"));
    assert!(installer.installed().is_empty());
    assert!(!dir.path().join("cpptools-linux.vsix").exists());
}

#[test]
fn test_missing_platform_asset_aborts() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux32.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();

    let outcome = run_update_check(
        &linux_config(server.manifest_url(), "1.2.0-insiders", dir.path()),
        &installer,
    );

    assert!(matches!(outcome, Err(UpdateError::AssetMissing { .. })));
    assert!(installer.installed().is_empty());
}

#[test]
fn test_non_linux_platforms_abort() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = RecordingInstaller::default();
    let mut config = linux_config(server.manifest_url(), "1.2.0-insiders", dir.path());
    config.os = "windows".to_string();

    let outcome = run_update_check(&config, &installer);

    assert!(matches!(
        outcome,
        Err(UpdateError::UnsupportedPlatform { .. })
    ));
}

fn wait_for_results(
    checker: &mut SelfUpdateChecker,
) -> Vec<Result<UpdateOutcome, UpdateError>> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let results = checker.poll();
        if !results.is_empty() || Instant::now() > deadline {
            return results;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_checker_runs_on_timer() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let dir = tempfile::tempdir().unwrap();
    let installer = Arc::new(RecordingInstaller::default());
    let time = TestTimeSource::shared();
    let mut checker = SelfUpdateChecker::new(
        linux_config(server.manifest_url(), "1.3.0-insiders", dir.path()),
        installer.clone(),
        time.clone(),
    );

    assert!(checker.poll().is_empty());
    checker.arm();
    assert!(checker.poll().is_empty());
    assert_eq!(checker.in_flight(), 0);

    time.advance(Duration::from_secs(3600));
    let results = wait_for_results(&mut checker);
    assert!(matches!(
        results.as_slice(),
        [Ok(UpdateOutcome::UpToDate { .. })]
    ));

    checker.cancel();
    time.advance(Duration::from_secs(7200));
    assert!(checker.poll().is_empty());
    assert_eq!(checker.in_flight(), 0);
}

#[test]
fn test_switching_channel_installs_through_context() {
    let server = MockReleaseServer::start("1.3.0", "cpptools-linux.vsix");
    let harness = ExtensionHarness::new().with_folder("proj");
    let download_dir = harness.temp_dir.path().join("downloads");
    let mut context = harness.active_context().with_update_config(linux_config(
        server.manifest_url(),
        "1.2.0-insiders",
        &download_dir,
    ));

    harness
        .client(0)
        .pending_changes
        .borrow_mut()
        .insert(UPDATE_CHANNEL_KEY.to_string(), "Insiders".to_string());
    context.on_did_change_settings();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut results = Vec::new();
    while results.is_empty() && Instant::now() < deadline {
        results = context.tick();
        std::thread::sleep(Duration::from_millis(20));
    }

    assert!(matches!(
        results.as_slice(),
        [Ok(UpdateOutcome::Installed { version, .. })] if version == "1.3.0"
    ));
    assert_eq!(
        harness.installer.installed(),
        vec![download_dir.join("cpptools-linux.vsix")]
    );
}
