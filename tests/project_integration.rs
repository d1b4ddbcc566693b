//! Project file and command-line runner tests

mod common;

use common::builders::staff;
use dataforge_rs::config::{
    ConnectionDefinition, DataSourceDefinition, NodeDefinition, PipelineDefinition,
};
use dataforge_rs::{EngineSettings, PipelineError, ProjectFile, Value};
use serde_json::json;
use std::process::Command;

fn sales_project() -> ProjectFile {
    ProjectFile::new(PipelineDefinition {
        id: "sales".to_string(),
        name: "Sales".to_string(),
        description: "Pay by department".to_string(),
        nodes: vec![
            NodeDefinition {
                id: "high".to_string(),
                kind: "filter".to_string(),
                name: String::new(),
                description: String::new(),
                config: json!({
                    "conditions": [{ "column": "sal", "operator": "greater_than", "value": 75 }]
                }),
            },
            NodeDefinition {
                id: "by_dept".to_string(),
                kind: "group".to_string(),
                name: "By department".to_string(),
                description: String::new(),
                config: json!({
                    "groupBy": ["dept"],
                    "aggregations": [{ "column": "sal", "function": "sum", "alias": "total" }]
                }),
            },
        ],
        connections: vec![ConnectionDefinition {
            source_id: "high".to_string(),
            target_id: "by_dept".to_string(),
            source_port: "output".to_string(),
            target_port: "input".to_string(),
        }],
        data_sources: vec![DataSourceDefinition {
            target_id: "high".to_string(),
            target_port: "input".to_string(),
            dataset: staff(),
        }],
    })
}

#[test]
fn test_project_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sales.json");
    let project = sales_project().with_settings(EngineSettings::new().with_parallel_branches(true));
    project.save(&path).unwrap();

    let loaded = ProjectFile::load(&path).unwrap();
    assert_eq!(loaded, project);

    let mut built = loaded.build().unwrap();
    assert!(built.pipeline.settings().parallel_branches);
    let outputs = built.pipeline.execute().unwrap();
    let named = built.name_outputs(&outputs);
    assert_eq!(named["by_dept"].rows.len(), 1);
    assert_eq!(named["by_dept"].rows[0]["total"], Value::from(300));
}

#[test]
fn test_cyclic_project_fails_structurally() {
    let mut project = sales_project();
    project.pipeline.connections.push(ConnectionDefinition {
        source_id: "by_dept".to_string(),
        target_id: "high".to_string(),
        source_port: "output".to_string(),
        target_port: "input".to_string(),
    });
    // The back edge takes precedence over the seed on `high`.
    let mut built = project.build().unwrap();
    assert!(matches!(
        built.pipeline.execute(),
        Err(PipelineError::Cycle { .. })
    ));
}

#[test]
fn test_cli_prints_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let project_path = dir.path().join("sales.json");
    let settings_path = dir.path().join("engine.toml");
    sales_project().save(&project_path).unwrap();
    EngineSettings::new()
        .with_parallel_branches(true)
        .save(&settings_path)
        .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_dataforge"))
        .arg(&project_path)
        .arg(&settings_path)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let printed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(printed["high"]["rows"].as_array().unwrap().len(), 2);
    assert_eq!(printed["by_dept"]["rows"][0]["total"], json!(300));
    assert_eq!(printed["by_dept"]["provenance"], json!({ "operator": "group" }));
}

#[test]
fn test_cli_reports_missing_project() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_dataforge"))
        .arg(dir.path().join("absent.json"))
        .env("RUST_LOG", "off")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("loading project"));
}
