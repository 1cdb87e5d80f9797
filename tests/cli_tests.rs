//! End-to-end tests for the depimpact binary
//!
//! These tests verify:
//! - Argument validation and exit codes
//! - Config file errors surface as failures
//! - JSON output schema for repositories that need no registry access
//!
//! Every run points the registry at a closed local port so nothing leaves
//! the machine.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const OFFLINE_REGISTRY: &str = "http://127.0.0.1:9";

fn depimpact() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("depimpact"));
    cmd.env_remove("DEPIMPACT_LOG");
    cmd
}

/// A repository with Python sources and no manifests
fn create_manifestless_repo() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    fs::write(
        temp_dir.path().join("app.py"),
        "import flask\n\nflask.Flask(__name__)\n",
    )
    .unwrap();
    temp_dir
}

fn parse_json(stdout: &[u8]) -> serde_json::Value {
    serde_json::from_slice(stdout).expect("stdout should be valid JSON")
}

mod arguments {
    use super::*;

    #[test]
    fn test_help_describes_tool() {
        depimpact()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("depimpact"))
            .stdout(predicate::str::contains("--watch"));
    }

    #[test]
    fn test_version_flag() {
        depimpact()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_interval_requires_watch() {
        let repo = create_manifestless_repo();
        depimpact()
            .arg(repo.path())
            .args(["--interval", "10s"])
            .assert()
            .failure();
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let repo = create_manifestless_repo();
        depimpact()
            .arg(repo.path())
            .args(["--watch", "--interval", "soon"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("soon"));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        depimpact()
            .args(["--verbose", "--quiet"])
            .assert()
            .failure();
    }

    #[test]
    fn test_missing_repository_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let missing = temp_dir.path().join("nope");
        depimpact()
            .arg(&missing)
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Error"));
    }
}

mod config_file {
    use super::*;

    #[test]
    fn test_malformed_config_fails() {
        let repo = create_manifestless_repo();
        fs::write(repo.path().join("depimpact.toml"), "concurrency = [").unwrap();
        depimpact()
            .arg(repo.path())
            .args(["--registry-url", OFFLINE_REGISTRY])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("depimpact.toml"));
    }

    #[test]
    fn test_unknown_config_key_fails() {
        let repo = create_manifestless_repo();
        fs::write(repo.path().join("depimpact.toml"), "colour = true\n").unwrap();
        depimpact()
            .arg(repo.path())
            .args(["--registry-url", OFFLINE_REGISTRY])
            .assert()
            .code(1);
    }

    #[test]
    fn test_explicit_config_path_missing() {
        let repo = create_manifestless_repo();
        depimpact()
            .arg(repo.path())
            .arg("--config")
            .arg(repo.path().join("absent.toml"))
            .assert()
            .code(1)
            .stderr(predicate::str::contains("absent.toml"));
    }

    #[test]
    fn test_invalid_registry_url_fails() {
        let repo = create_manifestless_repo();
        depimpact()
            .arg(repo.path())
            .args(["--registry-url", "ftp://mirror.local"])
            .assert()
            .code(1);
    }
}

mod reports {
    use super::*;

    #[test]
    fn test_json_report_without_dependencies() {
        let repo = create_manifestless_repo();
        let output = depimpact()
            .arg(repo.path())
            .args(["--json", "--registry-url", OFFLINE_REGISTRY])
            .output()
            .unwrap();

        assert!(output.status.success());
        let json = parse_json(&output.stdout);
        assert_eq!(json["total_dependencies"], 0);
        assert_eq!(json["total_updates"], 0);
        assert_eq!(json["breaking_changes"], 0);
        assert!(json["results"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_text_report_without_dependencies() {
        let repo = create_manifestless_repo();
        depimpact()
            .arg(repo.path())
            .args(["--registry-url", OFFLINE_REGISTRY])
            .env("NO_COLOR", "1")
            .assert()
            .success()
            .stdout(predicate::str::contains("All dependencies are up to date"));
    }

    #[test]
    fn test_report_written_to_file() {
        let repo = create_manifestless_repo();
        let out = repo.path().join("report.json");
        depimpact()
            .arg(repo.path())
            .args(["--json", "--registry-url", OFFLINE_REGISTRY])
            .arg("--output")
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let json = parse_json(&fs::read(&out).unwrap());
        assert_eq!(json["total_dependencies"], 0);
    }

    #[test]
    fn test_unreachable_registry_marks_unknown() {
        let repo = create_manifestless_repo();
        fs::write(repo.path().join("requirements.txt"), "flask==2.0.0\n").unwrap();

        let output = depimpact()
            .arg(repo.path())
            .args(["--json", "--fail-on-breaking", "--registry-url", OFFLINE_REGISTRY])
            .output()
            .unwrap();

        // unknown is not breaking
        assert!(output.status.success());
        let json = parse_json(&output.stdout);
        assert_eq!(json["total_dependencies"], 1);
        assert_eq!(json["unknown_packages"], 1);
        assert_eq!(json["total_updates"], 0);
        assert_eq!(json["results"][0]["package"], "flask");
        assert_eq!(json["results"][0]["status"], "unknown");
        assert!(!json["warnings"].as_array().unwrap().is_empty());
    }
}
