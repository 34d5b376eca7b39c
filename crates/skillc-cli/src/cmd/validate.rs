use crate::output::{print_findings, print_gate, print_json};
use skillc_core::pipeline::{evaluate_gate, run_checks};
use std::path::Path;

pub fn run(root: &Path, skills: &[String], json: bool) -> anyhow::Result<()> {
    let (corpus, registries) = super::load(root, skills)?;
    let report = run_checks(&corpus, &registries, None);
    let gate = evaluate_gate(&report);

    if json {
        print_json(&serde_json::json!({
            "skills": corpus.skills.len(),
            "rules": corpus.rule_count(),
            "findings": report.findings,
            "gate": gate,
        }))?;
    } else {
        println!(
            "Validated {} rule(s) in {} skill(s).",
            corpus.rule_count(),
            corpus.skills.len()
        );
        print_findings(&report);
        print_gate(&gate);
    }

    if !gate.pass {
        anyhow::bail!(
            "release gate failed: {} blocking finding(s)",
            gate.blocking_findings.len()
        );
    }
    Ok(())
}
