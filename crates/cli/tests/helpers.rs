use std::fs;

use dylib_normalizer::{canonicalize_or_current, sha256_file};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current(".").expect("canonicalize");
    assert_eq!(result, cwd);
}

#[test]
fn canonicalize_or_current_resolves_existing_path() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("mac_arm64");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(nested.to_str().unwrap()).expect("canonicalize");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested"));
}

#[test]
fn canonicalize_or_current_keeps_missing_paths_absolute() {
    let result = canonicalize_or_current("definitely/not/here").expect("canonicalize");
    assert!(result.is_absolute());
    assert!(result.ends_with("definitely/not/here"));
}

#[test]
fn sha256_file_hashes_contents() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("libempty.bin");
    fs::write(&path, b"abc").expect("write");

    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn sha256_file_reports_missing_file() {
    let tmp = tempdir().expect("tempdir");
    let err = sha256_file(&tmp.path().join("missing.bin")).unwrap_err();
    assert!(err.to_string().contains("Failed to open library for hashing"));
}
