#![forbid(unsafe_code)]

use std::fs;

use kilt_loader::{FsLoader, Loader};

#[test]
fn reads_relative_files_and_canonicalizes_bases() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("base");
    let overlay = tmp.path().join("overlays").join("prod");
    fs::create_dir_all(&base).unwrap();
    fs::create_dir_all(&overlay).unwrap();
    fs::write(base.join("cm.yaml"), "apiVersion: v1\n").unwrap();

    let ldr = FsLoader::new(&overlay).unwrap();
    let nested = ldr.new_loader("../../base").unwrap();
    assert_eq!(nested.root(), fs::canonicalize(&base).unwrap());
    assert_eq!(nested.load("cm.yaml").unwrap(), b"apiVersion: v1\n");
    assert!(nested.is_file("cm.yaml"));
    assert!(!nested.is_file("missing.yaml"));
}

#[test]
fn missing_file_error_names_resolved_path() {
    let tmp = tempfile::tempdir().unwrap();
    let ldr = FsLoader::new(tmp.path()).unwrap();
    let expected = ldr.root().join("nope.yaml");
    let err = ldr.load("nope.yaml").unwrap_err().to_string();
    assert!(err.contains(&format!("cannot read file \"{}\"", expected.display())), "err={}", err);
}

#[test]
fn base_must_be_a_directory() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("file"), "x").unwrap();
    let ldr = FsLoader::new(tmp.path()).unwrap();
    assert!(ldr.new_loader("file").is_err());
    assert!(ldr.new_loader("does-not-exist").is_err());
}
