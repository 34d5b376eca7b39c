use crate::output::{print_findings, print_gate, print_json, print_table};
use anyhow::Context;
use skillc_core::compiler::CompiledArtifact;
use skillc_core::pipeline::{
    compile_all, detect_drift, evaluate_gate, run_checks, write_artifacts, Corpus, DriftKind,
};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Write artifacts only when the release gate passes.
    Gated,
    /// Write artifacts whatever the gate says.
    Force,
    /// Compare against the artifacts on disk; write nothing.
    Check,
}

impl BuildMode {
    pub fn from_flags(force: bool, check: bool) -> Self {
        match (force, check) {
            (_, true) => BuildMode::Check,
            (true, false) => BuildMode::Force,
            (false, false) => BuildMode::Gated,
        }
    }
}

pub fn run(
    root: &Path,
    skills: &[String],
    mode: BuildMode,
    with_links: bool,
    json: bool,
) -> anyhow::Result<()> {
    if mode == BuildMode::Check {
        return check(root, skills, json);
    }

    let (corpus, registries) = super::load(root, skills)?;
    let links = if with_links {
        Some(super::links::check(&corpus)?)
    } else {
        None
    };
    let report = run_checks(&corpus, &registries, links.as_ref());
    let gate = evaluate_gate(&report);

    if !gate.pass {
        if mode == BuildMode::Gated {
            if json {
                print_json(&serde_json::json!({ "gate": gate, "findings": report.findings }))?;
            } else {
                print_findings(&report);
                print_gate(&gate);
            }
            anyhow::bail!(
                "release gate failed: {} blocking finding(s); use --force to build anyway",
                gate.blocking_findings.len()
            );
        }
        tracing::warn!(
            blocking = gate.blocking_findings.len(),
            "release gate failed; building anyway"
        );
    }

    let artifacts = compile_all(&corpus).context("compilation failed")?;
    let writes = write_artifacts(&corpus, &artifacts).context("failed to write artifacts")?;
    let warnings = compiler_warnings(&artifacts);

    if json {
        print_json(&serde_json::json!({
            "gate": gate,
            "artifacts": writes,
            "warnings": warnings,
        }))?;
    } else {
        let rows = writes
            .iter()
            .map(|w| {
                vec![
                    w.skill.clone(),
                    if w.changed { "written" } else { "unchanged" }.to_string(),
                    w.path.clone(),
                ]
            })
            .collect();
        print_table(&["SKILL", "STATUS", "PATH"], rows);
        for w in &warnings {
            println!("warning: {w}");
        }
        print_gate(&gate);
    }
    Ok(())
}

fn check(root: &Path, skills: &[String], json: bool) -> anyhow::Result<()> {
    let corpus = Corpus::load(root, skills)
        .with_context(|| format!("failed to load corpus at {}", root.display()))?;
    let artifacts = compile_all(&corpus).context("compilation failed")?;
    let drift = detect_drift(&corpus, &artifacts)?;

    if json {
        print_json(&serde_json::json!({ "drift": drift }))?;
    } else if drift.is_empty() {
        println!("Artifacts are up to date.");
    } else {
        let rows = drift
            .iter()
            .map(|d| {
                let kind = match d.kind {
                    DriftKind::Missing => "missing",
                    DriftKind::Differs => "differs",
                };
                vec![d.skill.clone(), kind.to_string(), d.path.clone()]
            })
            .collect();
        print_table(&["SKILL", "DRIFT", "PATH"], rows);
    }

    if !drift.is_empty() {
        anyhow::bail!(
            "{} artifact(s) out of date; run `skillc build`",
            drift.len()
        );
    }
    Ok(())
}

fn compiler_warnings(artifacts: &[CompiledArtifact]) -> Vec<String> {
    artifacts
        .iter()
        .flat_map(|a| a.warnings.iter().map(move |w| format!("{}: {w}", a.skill)))
        .collect()
}
