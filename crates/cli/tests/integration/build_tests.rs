//! Single-level build integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn build_is_idempotent() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo run >> runs.log\necho x > \"$3\"\n");

  env.redo_cmd().arg("x").assert().success();
  env
    .redo_cmd()
    .arg("x")
    .assert()
    .success()
    .stderr(predicate::str::contains("up to date"));

  assert_eq!(env.read_file("runs.log"), "run\n");
}

#[test]
fn force_rebuilds() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo run >> runs.log\necho x > \"$3\"\n");

  env.redo_cmd().arg("x").assert().success();
  env.redo_cmd().args(["-f", "x"]).assert().success();

  assert_eq!(env.read_file("runs.log"), "run\nrun\n");
}

#[test]
fn default_procedure_and_stdout_output() {
  let env = TestEnv::new();
  env.write_file("default.txt.do", "echo \"target=$1 stem=$2\"\n");

  env.redo_cmd().arg("page.txt").assert().success();

  assert_eq!(env.read_file("page.txt"), "target=page.txt stem=page\n");
}

#[test]
fn exact_procedure_wins_over_default() {
  let env = TestEnv::new();
  env.write_file("default.txt.do", "echo default\n");
  env.write_file("page.txt.do", "echo exact\n");

  env.redo_cmd().arg("page.txt").assert().success();

  assert_eq!(env.read_file("page.txt"), "exact\n");
}

#[test]
fn failed_build_keeps_previous_output() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo good > \"$3\"\n");
  env.redo_cmd().arg("x").assert().success();

  env.write_file("x.do", "echo bad > \"$3\"\nexit 1\n");
  env
    .redo_cmd()
    .arg("x")
    .assert()
    .failure()
    .stderr(predicate::str::contains("x.do failed for x (exit code 1)"));

  assert_eq!(env.read_file("x"), "good\n");
}

#[test]
fn conflicting_outputs_fail() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo a\necho b > \"$3\"\n");

  env.redo_cmd().arg("x").assert().failure();

  assert!(!env.exists("x"));
}

#[test]
fn one_failure_does_not_stop_other_targets() {
  let env = TestEnv::new();
  env.write_file("good.do", "echo ok > \"$3\"\n");

  env.redo_cmd().args(["missing", "good"]).assert().failure();

  assert_eq!(env.read_file("good"), "ok\n");
}

#[test]
fn directory_flag_changes_root() {
  let env = TestEnv::new();
  env.write_file("proj/x.do", "echo x > \"$3\"\n");

  env.redo_cmd().args(["-C", "proj", "x"]).assert().success();

  assert!(env.exists("proj/x"));
  assert!(env.exists("proj/.redo"));
}

#[test]
fn json_report() {
  let env = TestEnv::new();
  env.write_file("x.do", "printf abc > \"$3\"\n");

  let json = env.json_output(&["x", "missing"]);

  assert_eq!(json["success"], false);
  assert_eq!(json["results"][0]["report"]["status"], "built");
  assert_eq!(json["results"][0]["report"]["output"]["bytes"], 3);
  assert_eq!(json["results"][1]["stage"], "resolution");
}

#[test]
fn failure_is_reported_once() {
  let env = TestEnv::new();

  let output = env.redo_cmd().arg("nope").output().unwrap();

  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert_eq!(stderr.matches("don't know how to build nope").count(), 1);
}

#[test]
fn metadata_directory_is_not_a_target() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo x > \"$3\"\n");
  env.redo_cmd().arg("x").assert().success();

  env
    .redo_cmd()
    .arg(".redo/.locks")
    .assert()
    .failure()
    .stderr(predicate::str::contains("inside the metadata directory"));
}
