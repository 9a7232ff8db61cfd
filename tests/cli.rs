use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn assetpack() -> Command {
    Command::cargo_bin("assetpack").unwrap()
}

#[test]
fn init_then_build_produces_static_output() {
    let dir = TempDir::new().unwrap();

    assetpack()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Created assetpack.toml"));

    assert!(dir.path().join("frontend/index.js").is_file());
    assert!(dir.path().join("frontend/sass/main.scss").is_file());

    assetpack()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .success()
        .stderr(predicate::str::contains("Wrote 2 file(s)"));

    let css = fs::read_to_string(dir.path().join("static/styles.css")).unwrap();
    assert!(css.contains("color:#213547"));
    assert!(dir.path().join("static/bundle.js").is_file());
}

#[test]
fn init_keeps_existing_files_without_force() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("frontend")).unwrap();
    fs::write(dir.path().join("frontend/index.js"), "// mine\n").unwrap();

    assetpack()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stderr(predicate::str::contains("Kept existing frontend/index.js"));

    assert_eq!(
        fs::read_to_string(dir.path().join("frontend/index.js")).unwrap(),
        "// mine\n"
    );
}

#[test]
fn build_without_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("frontend/sass")).unwrap();
    fs::write(dir.path().join("frontend/index.js"), "import './sass/main.scss';\n").unwrap();
    fs::write(dir.path().join("frontend/sass/main.scss"), "body { color: red; }\n").unwrap();

    assetpack()
        .current_dir(dir.path())
        .args(["build", "--outdir", "out"])
        .assert()
        .success();

    let css = fs::read_to_string(dir.path().join("out/styles.css")).unwrap();
    assert!(css.contains("body{color:red}"));
    assert!(!dir.path().join("static").exists());
}

#[test]
fn build_with_missing_entry_fails() {
    let dir = TempDir::new().unwrap();

    assetpack()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Entry module not found"));

    assert!(!dir.path().join("static").exists());
}

#[test]
fn explicit_missing_config_fails() {
    let dir = TempDir::new().unwrap();

    assetpack()
        .current_dir(dir.path())
        .args(["--config", "custom.toml", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("custom.toml"));
}

#[test]
fn explicit_default_named_config_must_exist() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("frontend")).unwrap();
    fs::write(dir.path().join("frontend/index.js"), "").unwrap();

    assetpack()
        .current_dir(dir.path())
        .args(["-c", "assetpack.toml", "build"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));

    assetpack()
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .success();
}
