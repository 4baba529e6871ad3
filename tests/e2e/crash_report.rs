//! Crash reports picked up from a watched folder

use crate::common::harness::ExtensionHarness;
use cpp_ext_host::services::crash_report::{summarize_crash_log, CALL_STACK_PROPERTY};
use cpp_ext_host::services::telemetry::TelemetryEvent;
use std::time::{Duration, Instant};

const REPORT: &str = "Process:         Microsoft.VSCode.CPP.IntelliSense.Msvc.darwin [77]\n\
Version:         0.26.0.0\n\
\n\
Thread 5 Crashed:\n\
0   Microsoft.VSCode.CPP.IntelliSense.Msvc.darwin\t0x0000000104f3a2b0 parse_decl + 120\n\
1   libdyld.dylib                 \t0x00007fff6a16fcc9 start + 1\n\
\n\
Thread 6:\n";

#[test]
fn test_summary_keeps_only_our_frames() {
    assert_eq!(
        summarize_crash_log(REPORT),
        "Microsoft.VSCode.CPP.IntelliSense.Msvc.darwin\t\n0   parse_decl + 120"
    );
}

#[test]
fn test_new_report_sends_mac_crash_event() {
    let mut harness = ExtensionHarness::new();
    let crash_folder = harness.temp_dir.path().join("DiagnosticReports");
    std::fs::create_dir_all(&crash_folder).unwrap();
    harness.config.watch_crash_reports = true;
    harness.config.crash_folder = Some(crash_folder.clone());
    let mut context = harness.active_context();
    assert!(context.is_watching_crash_reports());

    std::fs::write(crash_folder.join("Safari_2024-05-01.crash"), "unrelated").unwrap();
    std::fs::write(
        crash_folder.join("Microsoft.VSCode.CPP.IntelliSense.Msvc.darwin_2024-05-01.crash"),
        REPORT,
    )
    .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while harness.telemetry.events.borrow().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
        harness.time.advance(Duration::from_secs(1));
        context.tick();
    }

    let events = harness.telemetry.events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, TelemetryEvent::MacCrash);
    assert!(events[0].1[CALL_STACK_PROPERTY].contains("parse_decl + 120"));
}
