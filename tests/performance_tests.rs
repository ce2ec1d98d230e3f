use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_large_file_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("large_operations.csv");
    common::generate_csv(&output_path, 20_000).expect("Failed to generate large CSV");

    let output = Command::new(cargo_bin!("shiptrack"))
        .arg(&output_path)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed to process large file");

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Header plus one summary row per shipment.
    assert_eq!(stdout.lines().count(), 20_001);
    assert!(!stdout.contains("GEN-1,created"));
}

#[cfg(feature = "storage-rocksdb")]
#[test]
fn test_large_file_streaming_db() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("large_operations.csv");
    common::generate_csv(&output_path, 5_000).expect("Failed to generate large CSV");

    let status = Command::new(cargo_bin!("shiptrack"))
        .arg(&output_path)
        .arg("--db-path")
        .arg(dir.path().join("test_db"))
        .env("RUST_LOG", "warn")
        .status()
        .expect("Failed to execute command");
    assert!(status.success(), "Binary failed to process large file");
}
