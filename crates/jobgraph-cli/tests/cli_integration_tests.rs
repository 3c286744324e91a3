//! CLI integration tests for jobgraph
//!
//! Runs the jobgraph binary end-to-end against a throwaway config directory
//! and graph database, with taxonomy payloads read from a file.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TAXONOMY: &str = r#"{
  "15-1252.00": {
    "title": "Software Developers",
    "skills": [
      { "element_name": "Programming", "level": 4.1 },
      { "element_name": "Critical Thinking", "level": 3.9 }
    ],
    "technology_skills": [
      { "name": "Java", "category": "Object or component oriented development software" },
      { "name": "JavaScript", "category": "Web platform development software" }
    ],
    "tasks": [
      { "statement": "Modify existing software to correct errors", "category": "Core" }
    ],
    "work_activities": [
      { "name": "Working with Computers", "importance": 4.5 }
    ]
  }
}"#;

const ANALYZE_INPUT: &str = r#"{
  "job": {
    "id": "exp-1",
    "jobTitle": "Backend Engineer",
    "companyName": "Acme",
    "startDate": "2021-03",
    "description": "- Built payment APIs in Java\n- Led a team of four\n"
  },
  "normalized": {
    "normalizedTitle": "Software Engineer",
    "occupations": [
      { "code": "15-1252.00", "title": "Software Developers", "confidence": 0.92 }
    ]
  },
  "skills": [
    { "name": "Java", "isPrimary": true },
    { "name": "Leadership", "isTechnical": false }
  ]
}"#;

/// Isolated config directory, database and input files for one test
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> PathBuf {
        self.path().join("graph.db")
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("jobgraph").unwrap();
        cmd.current_dir(self.path());
        cmd.env("JOBGRAPH_CONFIG_DIR", self.path().join("config"));
        cmd.env_remove("JOBGRAPH_API_KEY");
        cmd.env_remove("OPENROUTER_API_KEY");
        cmd.env_remove("ONET_USERNAME");
        cmd.env_remove("ONET_PASSWORD");
        cmd.arg("--db").arg(self.db());
        cmd
    }

    fn analyze(&self) -> assert_cmd::assert::Assert {
        let input = self.write("job.json", ANALYZE_INPUT);
        let taxonomy = self.write("taxonomy.json", TAXONOMY);
        self.cmd()
            .arg("analyze")
            .arg("--input")
            .arg(input)
            .arg("--taxonomy-file")
            .arg(taxonomy)
            .arg("--offline")
            .assert()
    }
}

#[test]
fn test_help_lists_commands() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("stale"))
        .stdout(predicate::str::contains("ingest"));
}

#[test]
fn test_stats_on_empty_graph() {
    let ws = Workspace::new();
    ws.cmd()
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes (0):"))
        .stdout(predicate::str::contains("Edges (0):"));
    assert!(ws.db().exists(), "database file should be created");
}

#[test]
fn test_unknown_occupation_is_stale() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["stale", "15-1252.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("15-1252.00: stale (never ingested)"));
}

#[test]
fn test_ingest_then_fresh() {
    let ws = Workspace::new();
    let taxonomy = ws.write("taxonomy.json", TAXONOMY);

    ws.cmd()
        .args(["ingest", "15-1252.00", "--taxonomy-file"])
        .arg(&taxonomy)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingested taxonomy for 15-1252.00"))
        .stdout(predicate::str::contains("Technologies: 2"));

    ws.cmd()
        .args(["--format", "json", "stale", "15-1252.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stale\": false"))
        .stdout(predicate::str::contains("\"threshold_days\": 30"));
}

#[test]
fn test_ingest_unknown_code_fails() {
    let ws = Workspace::new();
    let taxonomy = ws.write("taxonomy.json", TAXONOMY);

    ws.cmd()
        .args(["ingest", "99-9999.00", "--taxonomy-file"])
        .arg(&taxonomy)
        .assert()
        .failure();
}

#[test]
fn test_analyze_offline_text_report() {
    let ws = Workspace::new();
    ws.analyze()
        .success()
        .stdout(predicate::str::contains("Analysis of 'exp-1'"))
        .stdout(predicate::str::contains("[OK] CLEANUP"))
        .stdout(predicate::str::contains("[OK] INGEST_TAXONOMY [15-1252.00]"))
        .stdout(predicate::str::contains("Occupations mapped: 1"))
        .stdout(predicate::str::contains("Skills written:     2"))
        .stdout(predicate::str::contains("Description lines:  2"));

    ws.cmd()
        .args(["stale", "15-1252.00"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fresh"));
}

#[test]
fn test_analyze_json_report() {
    let ws = Workspace::new();
    let input = ws.write("job.json", ANALYZE_INPUT);
    let taxonomy = ws.write("taxonomy.json", TAXONOMY);

    let output = ws
        .cmd()
        .args(["--format", "json", "analyze", "--offline", "--input"])
        .arg(input)
        .arg("--taxonomy-file")
        .arg(taxonomy)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["experience_id"], "exp-1");
    assert_eq!(report["occupations_mapped"], 1);
    assert_eq!(report["mapping"]["strategy"], "rule_based");
    assert_eq!(report["mapping"]["related"], 1);
    assert_eq!(report["steps"][0]["step"], "CLEANUP");
    assert_eq!(report["steps"][0]["status"], "completed");
}

#[test]
fn test_analyze_twice_is_idempotent() {
    let ws = Workspace::new();
    ws.analyze().success();

    let first = ws
        .cmd()
        .args(["--format", "json", "stats"])
        .output()
        .unwrap();
    ws.analyze().success();
    let second = ws
        .cmd()
        .args(["--format", "json", "stats"])
        .output()
        .unwrap();

    assert!(first.status.success() && second.status.success());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_analyze_missing_input_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["analyze", "--offline", "--input", "does-not-exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}

#[test]
fn test_config_set_get_roundtrip() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "set", "analysis.staleness_days", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set analysis.staleness_days = 7"));

    ws.cmd()
        .args(["config", "get", "analysis.staleness_days"])
        .assert()
        .success()
        .stdout(predicate::str::diff("7\n"));

    ws.cmd()
        .args(["config", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration reset to defaults."));

    ws.cmd()
        .args(["config", "get", "analysis.staleness_days"])
        .assert()
        .success()
        .stdout(predicate::str::diff("30\n"));
}

#[test]
fn test_config_unknown_key_fails() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "get", "nope.nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
