//! Integration tests for the runnel binary.
// The cargo_bin function is marked deprecated in favor of cargo_bin! macro,
// but both work correctly. Suppressing until assert_cmd stabilizes the new API.
#![allow(deprecated)]

use assert_cmd::cargo::cargo_bin;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup_project(config: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    fs::write(project.join("pipeline.yml"), config).unwrap();
    temp
}

fn runnel(temp: &TempDir) -> Command {
    let mut cmd = Command::new(cargo_bin("runnel"));
    cmd.current_dir(temp.path().join("project"));
    cmd.env("NO_COLOR", "1");
    cmd
}

const SPLIT_MERGE: &str = r#"
params:
  out: results
  chroms: [1, 2, 3]
tasks:
  - name: split
    description: One file per chromosome
    mkdir: ${out}
    outputs: ["${out}/chr${chrom}.txt"]
    fan_out: { name: chrom, param: chroms }
    command: { program: touch, args: ["${outputs}"] }
  - name: merge
    inputs: ["${out}/chr*.txt"]
    outputs: ["${out}/all.txt"]
    command: { program: touch, args: ["${outputs}"] }
"#;

#[test]
fn cli_shows_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("runnel"));
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("pipeline"));
    Ok(())
}

#[test]
fn cli_shows_version() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin("runnel"));
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn make_builds_everything() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp)
        .arg("make")
        .assert()
        .success()
        .stdout(predicate::str::contains("4 succeeded"));

    let results = temp.path().join("project/results");
    assert!(results.join("chr3.txt").exists());
    assert!(results.join("all.txt").exists());
    Ok(())
}

#[test]
fn no_subcommand_runs_make() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp).assert().success();
    assert!(temp.path().join("project/results/all.txt").exists());
    Ok(())
}

#[test]
fn second_make_is_up_to_date() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp).arg("make").assert().success();

    runnel(&temp)
        .arg("make")
        .assert()
        .success()
        .stdout(predicate::str::contains("4 up to date"))
        .stdout(predicate::str::contains("succeeded").not());
    Ok(())
}

#[test]
fn dry_run_creates_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp)
        .args(["make", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 would run"));

    assert!(!temp.path().join("project/results").exists());
    Ok(())
}

#[test]
fn show_json_reports_order() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    let output = runnel(&temp).args(["show", "--json"]).output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["order"][3], "merge");
    assert_eq!(json["outcomes"][0]["id"], "split[chrom=1]");
    assert_eq!(json["outcomes"][0]["state"], "would_run");
    Ok(())
}

#[test]
fn list_shows_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("One file per chromosome"))
        .stdout(predicate::str::contains("split[chrom=2]"))
        .stdout(predicate::str::contains("Default targets: merge"));
    Ok(())
}

#[test]
fn missing_config_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let project = temp.path().join("empty");
    fs::create_dir_all(&project)?;
    Command::new(cargo_bin("runnel"))
        .current_dir(&project)
        .arg("make")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No configuration found"));
    Ok(())
}

#[test]
fn explicit_config_path() -> Result<(), Box<dyn std::error::Error>> {
    let temp = TempDir::new()?;
    let project = temp.path().join("work");
    fs::create_dir_all(&project)?;
    fs::write(temp.path().join("custom.yml"), "tasks:\n  - name: only\n")?;

    Command::new(cargo_bin("runnel"))
        .current_dir(&project)
        .args(["list", "--config"])
        .arg(temp.path().join("custom.yml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("only"));
    Ok(())
}

#[test]
fn directory_flag_changes_project() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    Command::new(cargo_bin("runnel"))
        .current_dir(temp.path())
        .args(["-C", "project", "make"])
        .assert()
        .success();
    assert!(temp.path().join("project/results/all.txt").exists());
    Ok(())
}

#[test]
fn cycle_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        "tasks:\n  - name: a\n    follows: [b]\n  - name: b\n    follows: [a]\n",
    );
    runnel(&temp)
        .arg("make")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cyclic dependency"));
    Ok(())
}

#[test]
fn collision_exits_two_before_running() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
tasks:
  - name: a
    outputs: [same.txt]
    command: { program: touch, args: ["${outputs}"] }
  - name: b
    outputs: [same.txt]
    command: { program: touch, args: ["${outputs}"] }
"#,
    );
    runnel(&temp)
        .arg("make")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("declared by both"));
    assert!(!temp.path().join("project/same.txt").exists());
    Ok(())
}

#[test]
fn failure_exits_one_and_keeps_independent_work() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(
        r#"
tasks:
  - name: broken
    outputs: [broken.txt]
    command: { program: "false" }
  - name: after
    inputs: [broken.txt]
    outputs: [after.txt]
    command: { program: touch, args: ["${outputs}"] }
  - name: independent
    outputs: [independent.txt]
    command: { program: touch, args: ["${outputs}"] }
"#,
    );
    runnel(&temp)
        .args(["make", "-j", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("broken"))
        .stderr(predicate::str::contains("after not run"));

    let project = temp.path().join("project");
    assert!(project.join("independent.txt").exists());
    assert!(!project.join("after.txt").exists());
    Ok(())
}

#[test]
fn force_reruns_up_to_date_task() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp).arg("make").assert().success();

    runnel(&temp)
        .args(["make", "--force", "merge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 succeeded"));
    Ok(())
}

#[test]
fn unknown_target_exits_two() -> Result<(), Box<dyn std::error::Error>> {
    let temp = setup_project(SPLIT_MERGE);
    runnel(&temp)
        .args(["make", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown target 'nope'"));
    Ok(())
}
