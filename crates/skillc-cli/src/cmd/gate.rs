use crate::output::{print_findings, print_gate, print_json};
use skillc_core::pipeline::{evaluate_gate, run_checks};
use std::path::Path;

pub fn run(root: &Path, skills: &[String], with_links: bool, json: bool) -> anyhow::Result<()> {
    let (corpus, registries) = super::load(root, skills)?;
    let links = if with_links {
        Some(super::links::check(&corpus)?)
    } else {
        tracing::info!("link check skipped");
        None
    };
    let report = run_checks(&corpus, &registries, links.as_ref());
    let gate = evaluate_gate(&report);

    if json {
        print_json(&gate)?;
    } else {
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
