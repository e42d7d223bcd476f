#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use kilt_generate::{exec, generate, GeneratedKind, GeneratorArgs, GeneratorOptions};
use kilt_loader::{FakeLoader, FsLoader};

fn secret(yaml: &str) -> GeneratorArgs {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn command_output_becomes_secret_data() {
    let ldr = FakeLoader::new("/testpath");
    let args = secret("name: secret\ntimeoutSeconds: 5\ncommands:\n  DB_USERNAME: \"printf admin\"\n  DB_PASSWORD: \"echo somepw\"\n");
    let r = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap();
    assert_eq!(r.doc()["data"]["DB_USERNAME"], "YWRtaW4=");
    assert_eq!(r.doc()["data"]["DB_PASSWORD"], "c29tZXB3");
    assert_eq!(r.doc()["type"], "Opaque");
}

#[test]
fn commands_run_in_the_kustomization_root() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("token.txt"), "t0k3n").unwrap();
    let ldr = FsLoader::new(tmp.path()).unwrap();
    let args = secret("name: s\ncommands:\n  token: \"cat token.txt\"\n");
    let r = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap();
    assert_eq!(r.doc()["data"]["token"], "dDBrM24=");
}

#[test]
fn timed_out_command_is_killed() {
    let ldr = FakeLoader::new("/testpath");
    let args = secret("name: slow\ntimeoutSeconds: 1\ncommands:\n  USER: \"sleep 30\"\n");
    let started = Instant::now();
    let err = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap_err().to_string();
    assert!(err.contains("killed"), "err={}", err);
    assert!(err.contains("USER"), "err={}", err);
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
}

#[test]
fn timeout_kills_background_children_too() {
    let ldr = FakeLoader::new("/testpath");
    let args = secret("name: slow\ntimeoutSeconds: 1\ncommands:\n  USER: \"sleep 30 & sleep 30; wait\"\n");
    let started = Instant::now();
    let err = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap_err().to_string();
    assert!(err.contains("killed"), "err={}", err);
    assert!(started.elapsed() < Duration::from_secs(10), "took {:?}", started.elapsed());
}

#[cfg(target_os = "linux")]
#[test]
fn background_child_holding_stdout_is_reaped_after_exit() {
    let ldr = FakeLoader::new("/testpath");
    let args = secret("name: bg\ntimeoutSeconds: 5\ncommands:\n  USER: \"sleep 30 & printf admin\"\n");
    let started = Instant::now();
    let r = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap();
    assert_eq!(r.doc()["data"]["USER"], "YWRtaW4=");
    assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
}

#[cfg(target_os = "linux")]
#[test]
fn deadline_covers_output_held_by_escaped_descendant() {
    let started = Instant::now();
    let err = exec::run("setsid sleep 6 & printf x", Path::new("/"), Some(Duration::from_secs(1))).unwrap_err();
    assert!(matches!(err, exec::ExecError::Killed { .. }), "err={}", err);
    assert!(err.to_string().contains("killed"), "err={}", err);
    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
}

#[test]
fn failing_command_reports_exit_status() {
    let ldr = FakeLoader::new("/testpath");
    let args = secret("name: broken\ncommands:\n  K: \"echo nope >&2; exit 7\"\n");
    let err = generate(&ldr, &args, GeneratedKind::Secret, &GeneratorOptions::default()).unwrap_err().to_string();
    assert!(err.contains("generator broken"), "err={}", err);
    assert!(err.contains("exit status 7"), "err={}", err);
    assert!(err.contains("nope"), "err={}", err);
}
