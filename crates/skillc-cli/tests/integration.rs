#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn skillc(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skillc").unwrap();
    cmd.current_dir(dir.path()).env("SKILLC_ROOT", dir.path());
    cmd
}

const SECTIONS: &str = "# Sections\n\n\
## 1. Query Patterns (query)\n\n\
**Impact:** CRITICAL\n\
**Description:** How queries are shaped.\n\n\
## 2. Indexing (index)\n\n\
**Impact:** HIGH\n\
**Description:** Index design.\n";

fn rule(title: &str, extra: &str) -> String {
    format!(
        "---\ntitle: {title}\nimpact: HIGH\ntags: mongodb, query\n---\n\n{extra}\n\n\
**Incorrect (unbounded):**\n\n```js\ndb.orders.find()\n```\n\n\
**Correct (bounded):**\n\n```js\ndb.orders.find().limit(20)\n```\n"
    )
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// A two-skill corpus that passes every offline check.
fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    for skill in ["mongodb-query", "mongodb-schema"] {
        write(dir.path(), &format!("skills/{skill}/_sections.md"), SECTIONS);
        write(
            dir.path(),
            &format!("skills/{skill}/rules/query-limit.md"),
            &rule("Always limit result sets", "Unbounded reads exhaust memory."),
        );
        write(
            dir.path(),
            &format!("skills/{skill}/rules/index-esr.md"),
            &rule("Order compound keys by ESR", "Equality, sort, range."),
        );
    }
    dir
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_clean_corpus_passes() {
    let dir = corpus();
    skillc(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Validated 4 rule(s) in 2 skill(s)."))
        .stdout(predicate::str::contains("Gate: PASS"));
}

#[test]
fn validate_missing_section_fails_gate() {
    let dir = corpus();
    write(
        dir.path(),
        "skillc.yaml",
        "required_sections:\n  skills:\n    mongodb-query: [Incorrect, Correct, Verify with]\n",
    );
    skillc(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("missing required section 'Verify with'"))
        .stderr(predicate::str::contains("release gate failed: 2 blocking finding(s)"));
}

#[test]
fn validate_json_reports_findings_and_gate() {
    let dir = corpus();
    write(
        dir.path(),
        "skills/mongodb-query/rules/query-broken.md",
        "no frontmatter here\n",
    );
    let output = skillc(&dir).args(["validate", "--json"]).output().unwrap();
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["gate"]["pass"], false);
    let loader = value["findings"]["SkillLoader"].as_array().unwrap();
    assert_eq!(loader.len(), 1);
    assert_eq!(loader[0]["ruleId"], "query-broken");
    assert_eq!(loader[0]["severity"], "P1");
}

#[test]
fn skill_filter_limits_the_run() {
    let dir = corpus();
    skillc(&dir)
        .args(["validate", "--skill", "mongodb-schema"])
        .assert()
        .success()
        .stdout(predicate::str::contains("in 1 skill(s)"));

    skillc(&dir)
        .args(["validate", "--skill", "mongodb-nothing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("skill not found: mongodb-nothing"));
}

#[test]
fn duplicate_rule_id_is_fatal() {
    let dir = corpus();
    write(
        dir.path(),
        "skills/mongodb-query/rules/query-copy.md",
        "---\nid: query-limit\ntitle: Copy\nimpact: HIGH\ntags: x\n---\nbody\n",
    );
    skillc(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("duplicate rule id 'query-limit'"));
}

#[test]
fn malformed_taxonomy_is_fatal() {
    let dir = corpus();
    write(
        dir.path(),
        "skills/mongodb-query/_sections.md",
        "## Query Patterns\n**Impact:** HIGH\n",
    );
    skillc(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed taxonomy"));
}

#[test]
fn invalid_config_is_fatal() {
    let dir = corpus();
    write(dir.path(), "skillc.yaml", "links:\n  concurrency: 0\n");
    skillc(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("links.concurrency"));
}

// ---------------------------------------------------------------------------
// registries
// ---------------------------------------------------------------------------

const PROHIBITED: &str = r#"{"version": 1, "entries": [
    {"id": "no-unbounded-find", "scope": "query-limit.md", "kind": "prohibited-phrase",
     "pattern": "Unbounded reads", "severity": "P0", "appliesToSkills": ["mongodb-query"]}
]}"#;

#[test]
fn check_version_claims_reports_prohibited_phrase() {
    let dir = corpus();
    write(dir.path(), "registry/version-claims.json", PROHIBITED);
    skillc(&dir)
        .arg("check-version-claims")
        .assert()
        .failure()
        .stdout(predicate::str::contains("no-unbounded-find"))
        .stderr(predicate::str::contains("1 blocking version-claims violation(s)"));
}

#[test]
fn check_version_claims_without_registry_fails() {
    let dir = corpus();
    skillc(&dir)
        .arg("check-version-claims")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no version-claims registry"));
}

#[test]
fn malformed_registry_is_fatal() {
    let dir = corpus();
    write(
        dir.path(),
        "registry/semantic-invariants.json",
        r#"{"entries": [{"id": "bad", "scope": "*.md", "kind": "required-phrase", "pattern": "(oops"}]}"#,
    );
    skillc(&dir)
        .arg("check-semantic-invariants")
        .assert()
        .failure()
        .stderr(predicate::str::contains("entry 'bad'"));
}

#[test]
fn semantic_invariants_check_named_sections() {
    let dir = corpus();
    write(
        dir.path(),
        "registry/semantic-invariants.json",
        r#"{"entries": [{"id": "correct-limits", "scope": "*.md", "kind": "required-token",
            "section": "Correct", "pattern": "\\.limit\\(", "severity": "P1"}]}"#,
    );
    skillc(&dir)
        .arg("check-semantic-invariants")
        .assert()
        .success()
        .stdout(predicate::str::contains("No findings."));
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

#[test]
fn build_writes_artifacts_and_check_sees_no_drift() {
    let dir = corpus();
    skillc(&dir)
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("written"));

    let guide =
        std::fs::read_to_string(dir.path().join("skills/mongodb-query/AGENTS.md")).unwrap();
    assert!(guide.contains("Rules: 2"));
    assert!(guide.contains("<!-- rule-id: query-limit -->"));
    let cases: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("skills/mongodb-query/test-cases.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(cases.as_array().unwrap().len(), 2);
    assert_eq!(cases[0]["ruleId"], "query-limit");

    skillc(&dir)
        .args(["build", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Artifacts are up to date."));
}

#[test]
fn rebuild_is_byte_identical() {
    let dir = corpus();
    skillc(&dir).arg("build").assert().success();
    let path = dir.path().join("skills/mongodb-schema/AGENTS.md");
    let first = std::fs::read(&path).unwrap();
    skillc(&dir)
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("unchanged"));
    assert_eq!(first, std::fs::read(&path).unwrap());
}

#[test]
fn build_check_detects_drift_after_rule_added() {
    let dir = corpus();
    skillc(&dir).arg("build").assert().success();
    write(
        dir.path(),
        "skills/mongodb-query/rules/query-project.md",
        &rule("Project only needed fields", ""),
    );
    skillc(&dir)
        .args(["build", "--check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("differs"))
        .stderr(predicate::str::contains("2 artifact(s) out of date"));
}

#[test]
fn gated_build_refuses_and_force_builds() {
    let dir = corpus();
    write(dir.path(), "registry/version-claims.json", PROHIBITED);

    skillc(&dir)
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("use --force"));
    assert!(!dir.path().join("skills/mongodb-query/AGENTS.md").exists());

    skillc(&dir)
        .args(["build", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Gate: FAIL"));
    assert!(dir.path().join("skills/mongodb-query/AGENTS.md").exists());
}

#[test]
fn gate_skip_links_runs_offline() {
    let dir = corpus();
    let output = skillc(&dir)
        .args(["gate", "--skip-links", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["pass"], true);
    assert_eq!(value["counts"]["p0"], 0);
}

#[test]
fn check_links_with_only_ignored_urls_succeeds() {
    let dir = corpus();
    write(
        dir.path(),
        "skills/mongodb-query/rules/query-docs.md",
        &rule("Read the docs", "See https://docs.example.invalid/manual/ for details."),
    );
    write(dir.path(), "skillc.yaml", "links:\n  ignore: ['example\\.invalid']\n");
    skillc(&dir)
        .arg("check-links")
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored"));
}
