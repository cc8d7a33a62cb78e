//! Integration tests for the plan file commands.
//!
//! Tests cover:
//! - Checking plan files
//! - Running plan files with and without a transaction
//! - Report files

use dbtasks::cli::commands::{check, run};
use dbtasks::models::plan::PlanShape;
use dbtasks::{Config, Error};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

const STAGED_PLAN: &str = r#"[
    { "create": { "sql": "CREATE TABLE t (id int)", "kind": "command" } },
    [
        { "sql": "INSERT INTO t VALUES (@id)", "kind": "command",
          "params": [{ "name": "id", "type": "int", "value": 1 }] },
        { "sql": "PRINT 'hello'", "kind": "command" }
    ],
    { "count": { "sql": "SELECT COUNT(*) AS n FROM t", "kind": "row" } }
]"#;

#[test]
fn test_check_plan() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(temp_dir.path(), "plan.json", STAGED_PLAN);

    let plan = check::check_plan(&path).unwrap();
    assert_eq!(plan.shape(), PlanShape::Staged);
    assert_eq!(plan.stages().len(), 3);
    assert_eq!(plan.unit_count(), 4);
}

#[test]
fn test_check_malformed_plan() {
    let temp_dir = TempDir::new().unwrap();
    let path = write(
        temp_dir.path(),
        "plan.json",
        r#"[{ "sql": "SELECT 1" }, [{ "sql": "SELECT 2" }]]"#,
    );
    assert!(matches!(check::check_plan(&path), Err(Error::MalformedSpec(_))));
}

#[tokio::test]
async fn test_run_plan_writes_report() {
    let temp_dir = TempDir::new().unwrap();
    let plan = write(temp_dir.path(), "plan.json", STAGED_PLAN);
    let output = temp_dir.path().join("report.json");

    let report = run::run_plan(&Config::default(), &plan, false, None, Some(&output))
        .await
        .unwrap();
    assert!(report.succeeded());

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(saved["error"], Value::Null);
    assert_eq!(saved["results"][2]["count"], json!({ "n": 1 }));
    assert_eq!(saved["stats"][1][1]["notices"][0]["message"], json!("hello"));
}

#[tokio::test]
async fn test_run_transactional_plan_with_seed() {
    let temp_dir = TempDir::new().unwrap();
    let seed = write(temp_dir.path(), "seed.sql", "CREATE TABLE t (id int PRIMARY KEY); INSERT INTO t VALUES (1)");
    let plan = write(
        temp_dir.path(),
        "plan.json",
        r#"[
            { "add": { "sql": "INSERT INTO t VALUES (2)", "kind": "command" } },
            { "dup": { "sql": "INSERT INTO t VALUES (1)", "kind": "command" } }
        ]"#,
    );

    let report = run::run_plan(&Config::default(), &plan, true, Some(&seed), None)
        .await
        .unwrap();
    assert!(!report.succeeded());
    assert!(report.error.unwrap().contains("PRIMARY KEY"));
    assert_eq!(report.results.len(), 1);
}

#[tokio::test]
async fn test_run_missing_plan() {
    let result = run::run_plan(
        &Config::default(),
        &PathBuf::from("/nonexistent/plan.json"),
        false,
        None,
        None,
    )
    .await;
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_run_stdout_is_only_the_report() {
    let temp_dir = TempDir::new().unwrap();
    let plan = write(temp_dir.path(), "plan.json", STAGED_PLAN);
    let config = write(temp_dir.path(), "config.toml", "");

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_dbtasks"))
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&plan)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["error"], Value::Null);
    assert_eq!(report["results"][2]["count"], json!({ "n": 1 }));
    assert!(String::from_utf8_lossy(&output.stderr).contains("[INFO] Loading plan"));
}
