//! CLI integration tests

use std::process::Command;
use tempfile::TempDir;

fn aof(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "aof-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = aof(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Synthesize the Airflow on Fargate stack"),
        "Should show about text"
    );
    assert!(stdout.contains("synth"), "Should show synth command");
    assert!(stdout.contains("ls"), "Should show ls command");
    assert!(stdout.contains("env"), "Should show env command");
    assert!(stdout.contains("outputs"), "Should show outputs command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = aof(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("aof"), "Should show binary name");
}

/// Test synth subcommand help
#[test]
fn test_synth_help() {
    let output = aof(&["synth", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Synth help should succeed");
    assert!(stdout.contains("--out"), "Should show out option");
    assert!(stdout.contains("--stdout"), "Should show stdout option");
    assert!(
        stdout.contains("--metrics-file"),
        "Should show metrics file option"
    );
}

/// Test that the template printed to stdout is valid JSON
#[test]
fn test_synth_to_stdout() {
    let output = aof(&["synth", "--stdout"]);
    assert!(output.status.success(), "Synth should succeed");

    let template: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Template should be JSON");
    assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
    assert!(template["Outputs"].as_object().unwrap().len() >= 2);
}

/// Test that synth writes the cloud assembly and metrics
#[test]
fn test_synth_writes_assembly() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("cdk.out");
    let metrics = dir.path().join("metrics.prom");

    let output = aof(&[
        "synth",
        "--out",
        out.to_str().unwrap(),
        "--metrics-file",
        metrics.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "Synth should succeed");

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["stack"], "AirflowOnFargateStack");
    assert_eq!(summary["files"].as_array().unwrap().len(), 3);

    assert!(out.join("AirflowOnFargateStack.template.json").exists());
    assert!(out.join("AirflowOnFargateStack.assets.json").exists());
    assert!(out.join("manifest.json").exists());

    let metrics = std::fs::read_to_string(metrics).unwrap();
    assert!(metrics.contains("stack_resources_declared_total"));
}

/// Test that env masks the admin password in tables only
#[test]
fn test_env_masks_admin_password() {
    let table = aof(&["env"]);
    assert!(table.status.success(), "Env should succeed");
    let stdout = String::from_utf8_lossy(&table.stdout);
    assert!(stdout.contains("AIRFLOW__CORE__EXECUTOR"));
    assert!(stdout.contains("********"));

    let json = aof(&["env", "--format", "json"]);
    let rows: serde_json::Value = serde_json::from_slice(&json.stdout).unwrap();
    let password = rows
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "ADMIN_PASSWORD")
        .unwrap();
    assert_ne!(password["value"], "********");
}

/// Test resource listing with a type filter
#[test]
fn test_ls_filters_by_type() {
    let output = aof(&["ls", "--type", "AWS::ECS::Cluster", "--format", "json"]);
    assert!(output.status.success(), "Ls should succeed");

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["resource_type"], "AWS::ECS::Cluster");
}

/// Test that a missing settings file is reported
#[test]
fn test_missing_config_fails() {
    let output = aof(&["--config", "/nonexistent/aof.toml", "outputs"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Missing config should fail");
    assert!(stderr.contains("Failed to load settings"));
}
