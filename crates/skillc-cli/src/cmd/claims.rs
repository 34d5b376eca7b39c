use crate::output::{print_findings, print_json};
use skillc_core::paths;
use skillc_core::pipeline::{check_semantic_invariants_all, check_version_claims_all};
use skillc_core::registry::ClaimRegistry;
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub enum Registry {
    VersionClaims,
    SemanticInvariants,
}

impl Registry {
    fn label(self) -> &'static str {
        match self {
            Registry::VersionClaims => "version-claims",
            Registry::SemanticInvariants => "semantic-invariants",
        }
    }

    fn default_path(self) -> &'static str {
        match self {
            Registry::VersionClaims => paths::DEFAULT_VERSION_CLAIMS,
            Registry::SemanticInvariants => paths::DEFAULT_SEMANTIC_INVARIANTS,
        }
    }
}

pub fn run(root: &Path, skills: &[String], which: Registry, json: bool) -> anyhow::Result<()> {
    let (corpus, registries) = super::load(root, skills)?;

    let loaded: Option<&ClaimRegistry> = match which {
        Registry::VersionClaims => registries.version_claims.as_ref(),
        Registry::SemanticInvariants => registries.semantic_invariants.as_ref(),
    };
    let Some(registry) = loaded else {
        anyhow::bail!(
            "no {} registry: configure registries in {} or create {}",
            which.label(),
            paths::CONFIG_FILE,
            which.default_path()
        );
    };

    let report = match which {
        Registry::VersionClaims => check_version_claims_all(&corpus, registry),
        Registry::SemanticInvariants => check_semantic_invariants_all(&corpus, registry),
    };

    if json {
        print_json(&serde_json::json!({
            "registry": registry.name(),
            "entries": registry.entries().len(),
            "findings": report.findings,
        }))?;
    } else {
        println!(
            "Applied {} {} entries from {} to {} skill(s).",
            registry.entries().len(),
            which.label(),
            registry.name(),
            corpus.skills.len()
        );
        print_findings(&report);
    }

    let blocking = report.all().filter(|f| f.severity.is_blocking()).count();
    if blocking > 0 {
        anyhow::bail!("{blocking} blocking {} violation(s)", which.label());
    }
    Ok(())
}
