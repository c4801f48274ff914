//! `--check` integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn never_built_target_is_stale() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo x > \"$3\"\n");

  env
    .redo_cmd()
    .args(["--check", "x"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("never built"));

  assert!(!env.exists("x"));
}

#[test]
fn check_reports_changed_dependency() {
  let env = TestEnv::new();
  env.write_file("in.txt", "a\n");
  env.write_file("x.do", "\"$REDO\" in.txt\ncat in.txt > \"$3\"\n");
  env.redo_cmd().arg("x").assert().success();

  env.redo_cmd().args(["--check", "x"]).assert().success();

  env.write_file("in.txt", "b\n");
  env
    .redo_cmd()
    .args(["--check", "x"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency in.txt changed"));
}

#[test]
fn check_json_output() {
  let env = TestEnv::new();
  env.write_file("x.do", "echo x > \"$3\"\n");
  env.redo_cmd().arg("x").assert().success();

  let json = env.json_output(&["--check", "x", "y"]);

  assert_eq!(json[0]["up_to_date"], true);
  assert_eq!(json[0]["freshness"]["state"], "up_to_date");
  assert_eq!(json[1]["up_to_date"], false);
  assert_eq!(json[1]["freshness"]["state"], "never_built");
}
