use std::fs;
use std::path::{Path, PathBuf};

use normalizer_core::decode::decode_image;
use normalizer_core::fixtures::DylibBuilder;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::{tempdir, TempDir};

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("dylib-normalizer")
}

fn write(path: &Path, bytes: &[u8]) -> PathBuf {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// A driver tree with one defective, one clean and one stub library.
fn driver_tree() -> (TempDir, PathBuf, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let lib_dir = dir.path().join("qhy/mac_arm64");
    let broken = write(
        &lib_dir.join("libqhyccd.20.bin"),
        &DylibBuilder::new()
            .identity("/usr/local/lib/libqhyccd.20.dylib")
            .dependency("/usr/lib/libSystem.B.dylib")
            .build(),
    );
    let clean = write(
        &lib_dir.join("libASICamera2.bin"),
        &DylibBuilder::new().identity("@rpath/libASICamera2.dylib").build(),
    );
    write(&lib_dir.join("libstub.bin"), &[0u8; 128]);
    (dir, broken, clean)
}

#[test]
fn scan_reports_problems_and_fails() {
    let (dir, broken, _) = driver_tree();
    let before = fs::read(&broken).unwrap();

    cmd()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("qhy (mac_arm64)"))
        .stdout(predicate::str::contains("libqhyccd.20.bin (libqhyccd)"))
        .stdout(predicate::str::contains("Issues found: 1"))
        .stderr(predicate::str::contains("1 of 3 libraries have problems"));

    assert_eq!(fs::read(&broken).unwrap(), before, "scan must not modify files");
}

#[test]
fn scan_clean_tree_succeeds() {
    let dir = tempdir().unwrap();
    write(
        &dir.path().join("zwo/mac/libASICamera2.bin"),
        &DylibBuilder::new().identity("@rpath/libASICamera2.dylib").build(),
    );

    cmd()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Total libraries: 1"))
        .stdout(predicate::str::contains("OK: 1"));
}

#[test]
fn scan_verbose_lists_clean_files_and_slices() {
    let (dir, _, _) = driver_tree();

    cmd()
        .arg("scan")
        .arg("--verbose")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("libASICamera2.bin (libASICamera2)"))
        .stdout(predicate::str::contains("id: @rpath/libASICamera2.dylib"))
        .stdout(predicate::str::contains("libstub.bin"));
}

#[test]
fn scan_json_document_has_summary_and_entries() {
    let (dir, _, _) = driver_tree();

    let output = cmd().arg("scan").arg("--json").arg(dir.path()).output().unwrap();
    assert!(!output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");

    assert_eq!(doc["mode"], "scan");
    assert!(doc["generated_at"].as_str().is_some());
    assert_eq!(doc["summary"]["total"], 3);
    assert_eq!(doc["summary"]["ok"], 1);
    assert_eq!(doc["summary"]["skipped"], 1);
    assert_eq!(doc["summary"]["issues"], 1);

    let files = doc["files"].as_array().unwrap();
    let broken = files.iter().find(|f| f["file_name"] == "libqhyccd.20.bin").unwrap();
    assert_eq!(broken["component"], "qhy");
    assert_eq!(broken["arch"], "mac_arm64");
    assert_eq!(broken["status"], "issues");
    assert_eq!(broken["report"]["verdict"], "has_problems");
    assert_eq!(broken["report"]["problems"][0]["kind"], "identity_mismatch");
    assert_eq!(broken["report"]["problems"][0]["replacement"], "@rpath/libqhyccd.dylib");
}

#[test]
fn fix_rewrites_identity_then_scan_is_clean() {
    let (dir, broken, clean) = driver_tree();
    let clean_before = fs::read(&clean).unwrap();

    cmd()
        .arg("fix")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Fixed ID"))
        .stdout(predicate::str::contains("Issues remaining: 0"));

    let image = decode_image(&fs::read(&broken).unwrap()).unwrap();
    assert_eq!(image.slices[0].identity().unwrap().path_str(), Some("@rpath/libqhyccd.dylib"));
    assert_eq!(fs::read(&clean).unwrap(), clean_before);

    cmd().arg("scan").arg(dir.path()).assert().success();
}

#[test]
fn fix_json_carries_digests() {
    let (dir, _, _) = driver_tree();

    let output =
        cmd().args(["fix", "--json", "--jobs", "2"]).arg(dir.path()).output().unwrap();
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(doc["mode"], "fix");

    let files = doc["files"].as_array().unwrap();
    let fixed = files.iter().find(|f| f["file_name"] == "libqhyccd.20.bin").unwrap();
    assert_eq!(fixed["fix"]["bytes_written"], true);
    assert_eq!(fixed["fix"]["converged"], true);
    assert_eq!(fixed["fix"]["problems_before"], 1);
    assert_ne!(fixed["fix"]["sha256_before"], fixed["fix"]["sha256_after"]);

    let untouched = files.iter().find(|f| f["file_name"] == "libASICamera2.bin").unwrap();
    assert_eq!(untouched["fix"]["bytes_written"], false);
    assert_eq!(untouched["fix"]["sha256_before"], untouched["fix"]["sha256_after"]);
}

#[test]
fn fix_fails_when_replacement_does_not_fit() {
    let dir = tempdir().unwrap();
    // "@rpath/libverylongname.dylib" needs more room than the 24-byte slot.
    let path = write(
        &dir.path().join("mac/libverylongname.bin"),
        &DylibBuilder::new().identity_with_slot("/opt/x/libverylongname", 24).build(),
    );
    let before = fs::read(&path).unwrap();

    cmd()
        .arg("fix")
        .arg(dir.path().join("mac"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unresolved ID"))
        .stdout(predicate::str::contains("slot holds 24"))
        .stderr(predicate::str::contains("still have problems"));

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn diagnose_prints_format_and_size() {
    let (dir, broken, _) = driver_tree();
    let size = fs::metadata(&broken).unwrap().len();

    cmd()
        .arg("diagnose")
        .arg(&broken)
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: MACHO_64 (64-bit Mach-O binary)"))
        .stdout(predicate::str::contains(format!("Size: {} bytes", size)));

    cmd()
        .arg("diagnose")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Format: EMPTY"));
}

#[test]
fn policy_prints_defaults_as_yaml_and_json() {
    cmd()
        .arg("policy")
        .assert()
        .success()
        .stdout(predicate::str::contains("relocatable_prefix:"))
        .stdout(predicate::str::contains("@rpath/"))
        .stdout(predicate::str::contains("libusb-1.0.0"));

    let output = cmd().arg("policy").arg("--json").output().unwrap();
    assert!(output.status.success());
    let doc: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["stub_threshold"], 50000);
}

#[test]
fn bad_policy_file_aborts_run() {
    let (dir, _, _) = driver_tree();
    let policy = dir.path().join("policy.ini");
    fs::write(&policy, "x=1").unwrap();

    cmd()
        .arg("scan")
        .arg("--policy")
        .arg(&policy)
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported policy file extension"));
}

#[test]
fn missing_path_is_reported() {
    let dir = tempdir().unwrap();
    cmd()
        .arg("scan")
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path does not exist"));
}

#[test]
fn tree_without_library_dirs_is_not_an_error() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("linux_x64")).unwrap();

    cmd()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No macOS libraries found"));
}
