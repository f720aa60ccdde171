//! Logging setup: file output and old-log cleanup.
//!
//! Kept in its own test binary: fern installs a process-global logger, so
//! only one test here may call `setup_logging`.

use std::fs;

use lib_tracker::logger::setup_logging;
use tempfile::tempdir;

#[test]
fn logging_writes_to_a_fresh_file_and_prunes_old_ones() {
    let temp_dir = tempdir().expect("failed to create temporary directory");
    let log_dir = temp_dir.path().to_path_buf();

    // Pre-existing logs from earlier runs; only the newest may survive setup.
    fs::write(log_dir.join("server_tracker_old1.log"), "stale").unwrap();
    fs::write(log_dir.join("server_tracker_old2.log"), "stale").unwrap();

    setup_logging(&log_dir, "debug").expect("logging setup failed");

    log::info!("tracker logging smoke message");
    log::warn!("tracker logging warn message");

    let log_files: Vec<_> = fs::read_dir(&log_dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
        .collect();

    // One survivor of the cleanup plus the freshly created file.
    assert_eq!(log_files.len(), 2, "found: {:?}", log_files);

    let current = log_files
        .iter()
        .find(|path| {
            fs::read_to_string(path)
                .map(|c| c.contains("tracker logging smoke message"))
                .unwrap_or(false)
        })
        .expect("no log file contains the smoke message");

    let contents = fs::read_to_string(current).unwrap();
    assert!(contents.contains("tracker logging warn message"));
    assert!(contents.contains("[INFO]"));

    // The global logger is already installed; a second setup must fail
    // instead of silently stacking dispatchers.
    assert!(setup_logging(&log_dir, "info").is_err());
}
