mod common;

use assert_cmd::Command;
use common::{ELECTRON_VERSION, Workspace};
use predicates::prelude::*;

fn bundler() -> Command {
    let mut cmd = Command::cargo_bin("kodegen_bundler_electron").unwrap();
    cmd.env_remove("ELECTRON_BUNDLER_QUIET");
    cmd
}

#[test]
fn help_lists_packaging_flags() {
    bundler()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SOURCEDIR"))
        .stdout(predicate::str::contains("--electron-zip-dir"))
        .stdout(predicate::str::contains("--no-prune"));
}

#[test]
fn missing_source_dir_argument_is_a_usage_error() {
    bundler().assert().failure().code(2);
}

#[test]
fn nonexistent_source_dir_is_rejected() {
    let ws = Workspace::new();
    bundler()
        .arg(ws.root.path().join("no-such-app"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn explicit_missing_config_is_reported() {
    let ws = Workspace::new();
    bundler()
        .arg(ws.app())
        .arg("--config")
        .arg(ws.root.path().join("missing.toml"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn packages_linux_bundle_and_prints_its_path() {
    let ws = Workspace::new();
    ws.write_release("linux", "x64");

    let bundle = ws.out().join("Cli App-linux-x64");
    bundler()
        .arg(ws.app())
        .arg("Cli App")
        .args(["--platform", "linux", "--arch", "x64"])
        .args(["--electron-version", ELECTRON_VERSION])
        .arg("--out")
        .arg(ws.out())
        .arg("--tmpdir")
        .arg(ws.tmp())
        .arg("--electron-zip-dir")
        .arg(ws.zips())
        .assert()
        .success()
        .stdout(predicate::str::contains(bundle.display().to_string()));

    assert!(bundle.join("Cli App").is_file());
    assert!(bundle.join("resources/app/main.js").is_file());
}

#[test]
fn config_file_supplies_options_and_flags_override_it() {
    let ws = Workspace::new();
    ws.write_release("linux", "x64");
    std::fs::write(
        ws.app().join("packager.toml"),
        format!(
            "name = \"From Config\"\nelectronVersion = \"{ELECTRON_VERSION}\"\n\
             platform = \"linux\"\narch = \"x64\"\nasar = true\nout = \"../out\"\n"
        ),
    )
    .unwrap();

    bundler()
        .arg(ws.app())
        .arg("--no-tmpdir")
        .arg("--electron-zip-dir")
        .arg(ws.zips())
        .arg("--executable-name")
        .arg("flagged")
        .assert()
        .success();

    let bundle = ws.out().join("From Config-linux-x64");
    assert!(bundle.join("flagged").is_file());
    assert!(bundle.join("resources/app.asar").is_file());
}
