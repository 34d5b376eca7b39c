use crate::output::{print_json, print_table};
use anyhow::Context;
use skillc_core::links::{LinkReport, LinkStatus};
use skillc_core::pipeline::{self, Corpus};
use std::path::Path;

pub fn run(root: &Path, skills: &[String], json: bool) -> anyhow::Result<()> {
    let corpus = Corpus::load(root, skills)
        .with_context(|| format!("failed to load corpus at {}", root.display()))?;
    let report = check(&corpus)?;

    if json {
        print_json(&report)?;
    } else if report.urls.is_empty() {
        println!("No reference URLs.");
    } else {
        let rows = report
            .urls
            .iter()
            .map(|u| {
                vec![
                    status_label(&u.status),
                    u.attempts.to_string(),
                    u.references.len().to_string(),
                    u.url.clone(),
                ]
            })
            .collect();
        print_table(&["STATUS", "TRIES", "REFS", "URL"], rows);
        println!(
            "\n{} of {} URL(s) healthy.",
            report.healthy(),
            report.urls.len()
        );
    }

    let failed = report.urls.iter().filter(|u| u.status.is_failure()).count();
    if failed > 0 {
        anyhow::bail!("{failed} reference URL(s) are unhealthy");
    }
    Ok(())
}

/// Run the async link check on a private runtime.
pub fn check(corpus: &Corpus) -> anyhow::Result<LinkReport> {
    let rt = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    rt.block_on(pipeline::check_links(corpus))
        .context("link check failed")
}

fn status_label(status: &LinkStatus) -> String {
    match status {
        LinkStatus::Healthy { code } => format!("ok {code}"),
        LinkStatus::Broken { code } => format!("broken {code}"),
        LinkStatus::Unreachable { .. } => "unreachable".to_string(),
        LinkStatus::Ignored => "ignored".to_string(),
        LinkStatus::NotChecked => "not checked".to_string(),
    }
}
