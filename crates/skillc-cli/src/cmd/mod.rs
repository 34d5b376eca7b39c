pub mod build;
pub mod claims;
pub mod gate;
pub mod links;
pub mod validate;

use anyhow::Context;
use skillc_core::pipeline::{Corpus, Registries};
use std::path::Path;

/// Load the corpus and its registries, as every checking command needs both.
pub fn load(root: &Path, skills: &[String]) -> anyhow::Result<(Corpus, Registries)> {
    let corpus = Corpus::load(root, skills)
        .with_context(|| format!("failed to load corpus at {}", root.display()))?;
    let registries =
        Registries::load(root, &corpus.config).context("failed to load registries")?;
    Ok((corpus, registries))
}
