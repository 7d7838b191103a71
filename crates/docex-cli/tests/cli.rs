use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const TEMPLATE: &str = r#"{
    "id": "incident-report",
    "name": "Incident Report",
    "required_keywords": ["incident"],
    "optional_keywords": ["threat", "analysis"],
    "minimum_confidence_threshold": 0.5,
    "auto_application_threshold": 0.8,
    "fields": [
        {"name": "incident_id", "required": true, "methods": [
            {"kind": "regex", "priority": 1, "pattern": "Incident ID:\\s*([A-Z0-9-]+)"}
        ]},
        {"name": "severity", "methods": [
            {"kind": "keyword_proximity", "priority": 1, "keywords": ["Severity"]}
        ], "validation": {"kind": "one_of", "values": ["low", "medium", "high"]}}
    ]
}"#;

const REPORT: &str = "Incident ID: SEC-2025-001\nThreat analysis of a phishing wave\nSeverity: high\n";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::create_dir_all(dir.path().join("xdg")).unwrap();
        fs::write(dir.path().join("templates/incident.json"), TEMPLATE).unwrap();
        Self { dir }
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.dir.path().join(rel)
    }

    fn write(&self, rel: &str, content: &str) {
        fs::write(self.path(rel), content).unwrap();
    }

    fn docex(&self) -> Command {
        let mut cmd = Command::cargo_bin("docex").unwrap();
        cmd.current_dir(self.dir.path())
            .env("XDG_CONFIG_HOME", self.path("xdg"));
        cmd
    }
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn test_process_prints_json_result() {
    let ws = Workspace::new();
    ws.write("docs/report.txt", REPORT);

    ws.docex()
        .args(["process", "docs/report.txt", "--templates", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"success\""))
        .stdout(predicate::str::contains("SEC-2025-001"))
        .stdout(predicate::str::contains("auto_selected"));
}

#[test]
fn test_process_text_output_to_file() {
    let ws = Workspace::new();
    ws.write("docs/report.txt", REPORT);

    ws.docex()
        .args([
            "process",
            "docs/report.txt",
            "-t",
            "templates",
            "-f",
            "text",
            "-o",
            "out.txt",
            "--show-confidence",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written to"))
        .stdout(predicate::str::contains("Extraction confidence: 90.0%"));

    let output = read(&ws.path("out.txt"));
    assert!(output.contains("Template: Incident Report"));
    assert!(output.contains("*incident_id: SEC-2025-001"));
    assert!(output.contains("severity: high"));
}

#[test]
fn test_process_csv_lists_fields() {
    let ws = Workspace::new();
    ws.write("docs/report.txt", REPORT);

    ws.docex()
        .args(["process", "docs/report.txt", "-t", "templates", "-f", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("field,value,method,confidence,validation,error"))
        .stdout(predicate::str::contains("incident_id,SEC-2025-001,regex,0.80,not_configured,"))
        .stdout(predicate::str::contains("severity,high,keyword_proximity,1.00,passed,"));
}

#[test]
fn test_process_without_matching_template_fails() {
    let ws = Workspace::new();
    ws.write("docs/notes.txt", "Quarterly budget review\n");

    ws.docex()
        .args(["process", "docs/notes.txt", "-t", "templates", "-f", "text"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("NO_TEMPLATE_MATCH"))
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn test_process_missing_input() {
    let ws = Workspace::new();

    ws.docex()
        .args(["process", "docs/missing.pdf", "-t", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_writes_outputs_and_summary() {
    let ws = Workspace::new();
    ws.write("docs/a.txt", REPORT);
    ws.write("docs/b.txt", "Incident ID: SEC-2025-002\nSeverity: low\n");
    ws.write("docs/c.txt", "Quarterly budget review\n");
    ws.write("docs/d.7z", "not a document");

    ws.docex()
        .args([
            "batch",
            "docs/*",
            "-t",
            "templates",
            "-o",
            "out",
            "-j",
            "2",
            "--summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files to process"))
        .stdout(predicate::str::contains("Summary written to"))
        .stdout(predicate::str::contains("NO_TEMPLATE_MATCH"));

    assert!(ws.path("out/a.json").exists());
    assert!(ws.path("out/b.json").exists());
    assert!(ws.path("out/c.json").exists());
    assert!(!ws.path("out/d.json").exists());

    let summary = read(&ws.path("out/summary.csv"));
    let mut lines = summary.lines();
    assert!(lines.next().unwrap().starts_with("filename,status,template,decision"));
    assert!(summary.contains("a.txt,success,incident-report,auto_selected"));
    assert!(summary.contains("c.txt,failed,,below_threshold"));
}

#[test]
fn test_batch_fail_fast_skips_remaining() {
    let ws = Workspace::new();
    ws.write("docs/a.pdf", "this is not a pdf");
    ws.write("docs/b.txt", REPORT);
    ws.write("docs/c.txt", REPORT);

    ws.docex()
        .args([
            "batch",
            "docs/*",
            "-t",
            "templates",
            "-j",
            "1",
            "--fail-fast",
            "--summary",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("CORRUPT_DOCUMENT"))
        .stderr(predicate::str::contains("2 files were not processed"));

    let summary = read(&ws.path("summary.csv"));
    assert!(summary.contains("a.pdf,failed"));
    assert!(summary.contains("b.txt,skipped"));
    assert!(summary.contains("c.txt,skipped"));
}

#[test]
fn test_batch_without_matches() {
    let ws = Workspace::new();

    ws.docex()
        .args(["batch", "docs/*.pdf", "-t", "templates"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files found"));
}

#[test]
fn test_templates_list_and_validate() {
    let ws = Workspace::new();

    ws.docex()
        .args(["templates", "list", "-t", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("incident-report"))
        .stdout(predicate::str::contains("2 fields"));

    ws.docex()
        .args(["templates", "validate", "-t", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 templates are valid"));

    ws.write("templates/copy.json", TEMPLATE);
    ws.docex()
        .args(["templates", "validate", "-t", "templates"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("duplicate template id"));
}

#[test]
fn test_templates_match_shows_ranking() {
    let ws = Workspace::new();
    ws.write("docs/report.txt", REPORT);

    ws.docex()
        .args(["templates", "match", "docs/report.txt", "-t", "templates"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.00 incident-report"))
        .stdout(predicate::str::contains("Decision: auto_selected"))
        .stdout(predicate::str::contains("Fields extracted: 2/2"));
}

#[test]
fn test_formats_lists_readers() {
    let ws = Workspace::new();

    ws.docex()
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("pdf"))
        .stdout(predicate::str::contains("docx"))
        .stdout(predicate::str::contains("xlsx"))
        .stdout(predicate::str::contains("OCR: disabled"));
}

#[test]
fn test_config_init_set_get() {
    let ws = Workspace::new();
    let config = ws.path("cfg/config.json");
    let config = config.to_str().unwrap();

    ws.docex()
        .args(["--config", config, "config", "init"])
        .assert()
        .success();

    ws.docex()
        .args(["--config", config, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    ws.docex()
        .args(["--config", config, "config", "set", "matching.min_confidence_gap", "0.3"])
        .assert()
        .success();

    ws.docex()
        .args(["--config", config, "config", "get", "matching.min_confidence_gap"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.3"));

    ws.docex()
        .args(["--config", config, "config", "get", "matching.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));

    ws.docex()
        .args(["--config", config, "config", "set", "batch.max_concurrent", "many"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value"));
}
