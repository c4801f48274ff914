//! Nested builds: procedures that call `"$REDO"` for their dependencies.

use predicates::prelude::*;

use super::common::TestEnv;

fn scenario() -> TestEnv {
  let env = TestEnv::new();
  env.write_file("a.src", "one\n");
  env.write_file("default.out.do", "\"$REDO\" a.src b.gen\ncat a.src b.gen > \"$3\"\n");
  env.write_file("b.gen.do", "echo run >> b.runs\necho gen > \"$3\"\n");
  env
}

#[test]
fn nested_dependencies_are_recorded() {
  let env = scenario();

  env.redo_cmd().arg("a.out").assert().success();

  assert_eq!(env.read_file("a.out"), "one\ngen\n");
  let json = env.json_output(&["--deps", "a.out"]);
  let mut paths: Vec<_> = json[0]["dependencies"]
    .as_array()
    .unwrap()
    .iter()
    .map(|d| d["path"].as_str().unwrap().to_string())
    .collect();
  paths.sort();
  assert_eq!(paths, vec!["a.src", "b.gen", "default.out.do"]);
}

#[test]
fn changed_source_rebuilds_only_what_depends_on_it() {
  let env = scenario();
  env.redo_cmd().arg("a.out").assert().success();

  env.write_file("a.src", "two\n");
  env.redo_cmd().arg("a.out").assert().success();

  assert_eq!(env.read_file("a.out"), "two\ngen\n");
  assert_eq!(env.read_file("b.runs"), "run\n");
}

#[test]
fn nested_output_is_indented_and_stdout_stays_clean() {
  let env = scenario();

  env
    .redo_cmd()
    .arg("a.out")
    .assert()
    .success()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("  ✓ b.gen"));

  assert!(!env.read_file("a.out").contains('✓'));
}

#[test]
fn nested_cycle_is_reported() {
  let env = TestEnv::new();
  env.write_file("x.do", "\"$REDO\" y\n");
  env.write_file("y.do", "\"$REDO\" x\n");

  env
    .redo_cmd()
    .arg("x")
    .assert()
    .failure()
    .stderr(predicate::str::contains("dependency cycle: x -> y -> x"));
}

#[test]
fn failing_dependency_fails_parent() {
  let env = TestEnv::new();
  env.write_file("top", "old\n");
  env.write_file("top.do", "\"$REDO\" broken\necho new > \"$3\"\n");
  env.write_file("broken.do", "exit 2\n");

  env.redo_cmd().arg("top").assert().failure();

  assert_eq!(env.read_file("top"), "old\n");
}

#[test]
fn nested_directory_flag_builds_in_that_directory() {
  let env = TestEnv::new();
  env.write_file("top.do", "\"$REDO\" -C sub x.o\ncat sub/x.o > \"$3\"\n");
  env.write_file("sub/x.o.do", "echo sub > \"$3\"\n");

  env.redo_cmd().arg("top").assert().success();

  assert_eq!(env.read_file("sub/x.o"), "sub\n");
  assert_eq!(env.read_file("top"), "sub\n");
  assert!(!env.exists("x.o"));
  let json = env.json_output(&["--deps", "top"]);
  let paths: Vec<_> = json[0]["dependencies"]
    .as_array()
    .unwrap()
    .iter()
    .map(|d| d["path"].as_str().unwrap().to_string())
    .collect();
  assert!(paths.contains(&"sub/x.o".to_string()));
}

#[test]
fn nested_call_from_subdirectory_uses_that_directory() {
  let env = TestEnv::new();
  env.write_file("top.do", "(cd sub && \"$REDO\" x.o)\ncat sub/x.o > \"$3\"\n");
  env.write_file("sub/x.o.do", "echo sub > \"$3\"\n");

  env.redo_cmd().arg("top").assert().success();

  assert_eq!(env.read_file("top"), "sub\n");
}

#[test]
fn phony_target_beside_directory_of_targets_runs() {
  let env = TestEnv::new();
  env.write_file("test/x.o.do", "echo x > \"$3\"\n");
  env.write_file("test.do", "touch ran_test\n");

  env.redo_cmd().arg("test/x.o").assert().success();
  env.redo_cmd().arg("test").assert().success();

  assert!(env.exists("ran_test"));
}
