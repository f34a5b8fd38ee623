use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

const ORDER_CONFIG: &str = r#"
sagas:
  - name: order
    description: Reserve, charge and ship an order
    steps:
      - name: reserve
        action: inventory.reserve
        compensating_action: inventory.release
      - name: charge
        action: payments.charge
        compensating_action: payments.refund
        requires: [reserve]
        timeout: 5s
      - name: ship
        action: warehouse.ship
        requires: [charge]
      - name: email
        action: notify.send
  - name: refund
    steps:
      - name: refund
        action: payments.refund
"#;

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn saga() -> Command {
    let mut cmd = Command::cargo_bin("saga").unwrap();
    cmd.env("RUST_LOG", "error");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn validate_accepts_valid_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);

    let output = saga()
        .args(["validate", path.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .clone();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ok: 2 saga(s) valid"), "{stdout}");
}

#[test]
fn validate_reports_cycle_with_exit_2() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "cycle.json",
        r#"{"sagas":[{"name":"loop","steps":[
            {"name":"a","action":"do_a","requires":["b"]},
            {"name":"b","action":"do_b","requires":["a"]}
        ]}]}"#,
    );

    let output = saga()
        .args(["validate", path.to_str().unwrap(), "--format", "json"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let result = stdout_json(&output);
    assert_eq!(result["valid"], false);
    let errors = result["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e.as_str().unwrap().contains("cycle")), "{errors:?}");
}

#[test]
fn validate_collects_errors_across_sagas() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "bad.yaml",
        r#"
sagas:
  - name: empty
    steps: []
  - name: dangling
    steps:
      - name: a
        action: do_a
        requires: [ghost]
"#,
    );

    let output = saga()
        .args(["validate", path.to_str().unwrap(), "--format", "json"])
        .assert()
        .code(2)
        .get_output()
        .clone();
    let result = stdout_json(&output);
    let errors: Vec<String> = result["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e.as_str().unwrap().to_string())
        .collect();
    assert!(errors.iter().any(|e| e.starts_with("empty:")), "{errors:?}");
    assert!(errors.iter().any(|e| e.contains("ghost")), "{errors:?}");
}

#[test]
fn unparseable_config_exits_2_and_missing_file_exits_4() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "garbage.yaml", "sagas: [[[");
    saga().args(["validate", path.to_str().unwrap()]).assert().code(2);

    let missing = dir.path().join("nope.yaml");
    saga().args(["validate", missing.to_str().unwrap()]).assert().code(4);
}

#[test]
fn sagas_lists_names_and_step_counts() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);

    let output = saga()
        .args(["sagas", path.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .get_output()
        .clone();
    let result = stdout_json(&output);
    let sagas = result["sagas"].as_array().unwrap();
    assert_eq!(sagas.len(), 2);
    assert_eq!(sagas[0]["name"], "order");
    assert_eq!(sagas[0]["step_count"], 4);
    assert_eq!(sagas[0]["compensable_steps"], 2);
    assert_eq!(sagas[1]["name"], "refund");
}

#[test]
fn plan_prints_levels_and_dot() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);

    let output = saga()
        .args(["plan", path.to_str().unwrap(), "--saga", "order", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .clone();
    let plan = stdout_json(&output);
    assert_eq!(plan["levels"][0], serde_json::json!(["email", "reserve"]));
    assert_eq!(plan["levels"][2], serde_json::json!(["ship"]));
    let charge = plan["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == "charge")
        .unwrap();
    assert_eq!(charge["timeout"], "5s");

    let output = saga()
        .args(["plan", path.to_str().unwrap(), "--saga", "order", "--format", "dot"])
        .assert()
        .success()
        .get_output()
        .clone();
    let dot = String::from_utf8_lossy(&output.stdout);
    assert!(dot.starts_with("digraph"), "{dot}");
    assert!(dot.contains("\"reserve\" -> \"charge\""), "{dot}");
}

#[test]
fn plan_unknown_saga_exits_4() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);
    saga()
        .args(["plan", path.to_str().unwrap(), "--saga", "missing"])
        .assert()
        .code(4);
}

#[test]
fn execute_with_echo_dispatcher_succeeds() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);

    let output = saga()
        .args([
            "execute",
            path.to_str().unwrap(),
            "--saga",
            "order",
            "--dispatcher",
            "echo",
            "--events",
            "none",
            "--set",
            "order_id=17",
            "--trace-id",
            "cli-trace",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .get_output()
        .clone();
    let result = stdout_json(&output);
    assert_eq!(result["status"], "succeeded");
    assert_eq!(result["details"]["trace_id"], "cli-trace");
    assert_eq!(
        result["details"]["steps"]["ship"]["output"]["payload"]["order_id"],
        17
    );
}

#[test]
fn execute_with_rejecting_dispatcher_exits_3() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);
    let payload = write_config(&dir, "payload.json", r#"{"amount": 12}"#);

    let output = saga()
        .args([
            "execute",
            path.to_str().unwrap(),
            "--saga",
            "order",
            "--payload",
            payload.to_str().unwrap(),
            "--events",
            "none",
            "--format",
            "json",
        ])
        .assert()
        .code(3)
        .get_output()
        .clone();
    let result = stdout_json(&output);
    assert_eq!(result["status"], "failed");
    assert!(result["details"]["failed_step"].is_string());
}

#[test]
fn execute_unknown_saga_exits_4() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);
    saga()
        .args(["execute", path.to_str().unwrap(), "--saga", "nope", "--dispatcher", "echo"])
        .assert()
        .code(4);
}

#[test]
fn execute_http_dispatcher_requires_url() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);
    saga()
        .env_remove("SAGA_DISPATCHER_URL")
        .args(["execute", path.to_str().unwrap(), "--saga", "order", "--dispatcher", "http"])
        .assert()
        .code(4);
}

#[test]
fn execute_streams_events_to_stdout() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "sagas.yaml", ORDER_CONFIG);

    let output = saga()
        .args([
            "execute",
            path.to_str().unwrap(),
            "--saga",
            "refund",
            "--dispatcher",
            "echo",
            "--events",
            "stdout",
            "--quiet",
        ])
        .assert()
        .success()
        .get_output()
        .clone();
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.first().unwrap()["type"], "saga.started");
    assert_eq!(lines.last().unwrap()["type"], "saga.completed");
}
