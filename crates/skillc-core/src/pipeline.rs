//! End-to-end runs over a corpus: load, check, gate, compile, write.
//!
//! Every checker reads the same immutable [`Corpus`] snapshot. Only the link
//! check is async; callers drive it on their own runtime.

use crate::claims::{check_semantic_invariants, check_version_claims, Coverage};
use crate::compiler::{compile, CompiledArtifact};
use crate::config::{Config, WarnLevel};
use crate::error::Result;
use crate::finding::{load_findings, ValidationReport};
use crate::gate::{self, GateResult};
use crate::io;
use crate::links::{LinkChecker, LinkOptions, LinkReport};
use crate::paths;
use crate::registry::ClaimRegistry;
use crate::skill::{Skill, SkillLoader};
use crate::structure::validate_structure;
use crate::types::Checker;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// A loaded corpus: validated config plus every selected skill.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub root: PathBuf,
    pub config: Config,
    pub skills: Vec<Skill>,
    /// `Subset` when the run was restricted by skill name.
    pub coverage: Coverage,
}

impl Corpus {
    /// Load config and skills. `only` restricts the skills by name.
    pub fn load(root: &Path, only: &[String]) -> Result<Self> {
        let config = Config::load_checked(root)?;
        for w in config.validate() {
            if w.level == WarnLevel::Warning {
                tracing::warn!("{}: {}", paths::CONFIG_FILE, w.message);
            }
        }
        let vocabulary = config.vocabulary();
        let skills = SkillLoader::new(root, &vocabulary, &config.reserved_files)
            .load_corpus(&config.skills_path(root), only)?;
        tracing::debug!(skills = skills.len(), "corpus loaded");
        Ok(Self {
            root: root.to_path_buf(),
            config,
            skills,
            coverage: if only.is_empty() {
                Coverage::Corpus
            } else {
                Coverage::Subset
            },
        })
    }

    pub fn rule_count(&self) -> usize {
        self.skills.iter().map(|s| s.rules.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub version_claims: Option<ClaimRegistry>,
    pub semantic_invariants: Option<ClaimRegistry>,
}

impl Registries {
    /// An explicitly configured registry must exist; a missing default one
    /// is skipped with a warning.
    pub fn load(root: &Path, config: &Config) -> Result<Self> {
        Ok(Self {
            version_claims: load_registry(
                root,
                config.registries.version_claims.as_deref(),
                paths::DEFAULT_VERSION_CLAIMS,
            )?,
            semantic_invariants: load_registry(
                root,
                config.registries.semantic_invariants.as_deref(),
                paths::DEFAULT_SEMANTIC_INVARIANTS,
            )?,
        })
    }
}

fn load_registry(
    root: &Path,
    configured: Option<&Path>,
    default: &str,
) -> Result<Option<ClaimRegistry>> {
    match configured {
        Some(path) => ClaimRegistry::load(&root.join(path)).map(Some),
        None => {
            let path = root.join(default);
            if !path.is_file() {
                tracing::warn!(registry = default, "registry not found; skipping");
                return Ok(None);
            }
            ClaimRegistry::load(&path).map(Some)
        }
    }
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Loader and structural findings for every skill.
pub fn check_structure(corpus: &Corpus) -> ValidationReport {
    let mut report = ValidationReport::new();
    for skill in &corpus.skills {
        report.extend(Checker::SkillLoader, load_findings(skill));
        let required = corpus.config.required_sections.for_skill(&skill.name);
        report.extend(Checker::StructuralValidator, validate_structure(skill, required));
    }
    report
}

pub fn check_version_claims_all(corpus: &Corpus, registry: &ClaimRegistry) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(
        Checker::VersionClaimChecker,
        check_version_claims(registry, &corpus.skills, corpus.coverage),
    );
    report
}

pub fn check_semantic_invariants_all(
    corpus: &Corpus,
    registry: &ClaimRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    report.extend(
        Checker::SemanticInvariantChecker,
        check_semantic_invariants(registry, &corpus.skills, corpus.coverage),
    );
    report
}

pub async fn check_links(corpus: &Corpus) -> Result<LinkReport> {
    let checker = LinkChecker::new(LinkOptions::from_config(&corpus.config.links)?)?;
    Ok(checker.check(&corpus.skills).await)
}

/// Every offline checker, plus link findings when a link report is given.
pub fn run_checks(
    corpus: &Corpus,
    registries: &Registries,
    links: Option<&LinkReport>,
) -> ValidationReport {
    let mut report = check_structure(corpus);
    if let Some(registry) = &registries.version_claims {
        merge(&mut report, check_version_claims_all(corpus, registry));
    }
    if let Some(registry) = &registries.semantic_invariants {
        merge(&mut report, check_semantic_invariants_all(corpus, registry));
    }
    if let Some(links) = links {
        report.extend(Checker::ReferenceLinkChecker, links.findings.clone());
    }
    report
}

fn merge(into: &mut ValidationReport, from: ValidationReport) {
    for (checker, findings) in from.findings {
        into.extend(checker, findings);
    }
}

pub fn evaluate_gate(report: &ValidationReport) -> GateResult {
    gate::evaluate(&report.findings)
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

pub fn compile_all(corpus: &Corpus) -> Result<Vec<CompiledArtifact>> {
    corpus
        .skills
        .iter()
        .map(|skill| compile(skill, &corpus.config.default_version))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactWrite {
    pub skill: String,
    pub path: String,
    pub changed: bool,
}

/// Write each skill's guide and test cases next to its `_sections.md`.
pub fn write_artifacts(corpus: &Corpus, artifacts: &[CompiledArtifact]) -> Result<Vec<ArtifactWrite>> {
    let mut writes = Vec::new();
    for (skill, artifact) in corpus.skills.iter().zip(artifacts) {
        for (path, data) in artifact_files(corpus, skill, artifact)? {
            let changed = io::write_if_changed(&path, data.as_bytes())?;
            let path = paths::display_relative(&corpus.root, &path);
            if changed {
                tracing::info!(skill = %skill.name, %path, "artifact written");
            }
            writes.push(ArtifactWrite {
                skill: skill.name.clone(),
                path,
                changed,
            });
        }
    }
    Ok(writes)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    Missing,
    Differs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drift {
    pub skill: String,
    pub path: String,
    pub kind: DriftKind,
}

/// Artifacts on disk that differ from a fresh compilation.
pub fn detect_drift(corpus: &Corpus, artifacts: &[CompiledArtifact]) -> Result<Vec<Drift>> {
    let mut drift = Vec::new();
    for (skill, artifact) in corpus.skills.iter().zip(artifacts) {
        for (path, data) in artifact_files(corpus, skill, artifact)? {
            let kind = if !path.is_file() {
                Some(DriftKind::Missing)
            } else if std::fs::read(&path)? != data.as_bytes() {
                Some(DriftKind::Differs)
            } else {
                None
            };
            if let Some(kind) = kind {
                drift.push(Drift {
                    skill: skill.name.clone(),
                    path: paths::display_relative(&corpus.root, &path),
                    kind,
                });
            }
        }
    }
    Ok(drift)
}

fn artifact_files(
    corpus: &Corpus,
    skill: &Skill,
    artifact: &CompiledArtifact,
) -> Result<[(PathBuf, String); 2]> {
    Ok([
        (skill.dir.join(&corpus.config.output.guide), artifact.guide.clone()),
        (
            skill.dir.join(&corpus.config.output.test_cases),
            artifact.test_cases_json()?,
        ),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkillcError;
    use crate::skill::tests::{rule_file, write_skill};
    use crate::types::Severity;
    use tempfile::TempDir;

    fn corpus_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_skill(
            dir.path(),
            "mongodb-query",
            &[
                ("query-limit.md", rule_file("Always limit", "")),
                ("index-esr.md", rule_file("ESR", "")),
            ],
        );
        dir
    }

    fn write_registry(root: &Path, rel: &str, json: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, json).unwrap();
    }

    #[test]
    fn clean_corpus_passes_the_gate() {
        let dir = corpus_dir();
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        assert_eq!(corpus.rule_count(), 2);
        let registries = Registries::load(dir.path(), &corpus.config).unwrap();
        assert!(registries.version_claims.is_none());
        let report = run_checks(&corpus, &registries, None);
        assert!(report.is_empty());
        assert!(evaluate_gate(&report).pass);
    }

    #[test]
    fn registry_violation_fails_the_gate() {
        let dir = corpus_dir();
        write_registry(
            dir.path(),
            paths::DEFAULT_VERSION_CLAIMS,
            r#"{"entries": [{"id": "no-find", "scope": "*.md", "kind": "prohibited-phrase", "pattern": "find\\(\\)"}]}"#,
        );
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        let registries = Registries::load(dir.path(), &corpus.config).unwrap();
        let report = run_checks(&corpus, &registries, None);
        assert_eq!(report.count(Severity::P0), 2);
        let gate = evaluate_gate(&report);
        assert!(!gate.pass);
        assert_eq!(gate.blocking_findings.len(), 2);
    }

    #[test]
    fn file_level_assertion_owned_by_one_skill_passes_the_corpus_gate() {
        let dir = corpus_dir();
        write_skill(
            dir.path(),
            "mongodb-schema",
            &[("index-embed.md", rule_file("Embed bounded arrays", ""))],
        );
        write_registry(
            dir.path(),
            paths::DEFAULT_VERSION_CLAIMS,
            r#"{"entries": [{"id": "limit-documented", "scope": "query-limit.md",
                "kind": "required-file-level-assertion", "pattern": "limit\\(10\\)"}]}"#,
        );
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        assert_eq!(corpus.coverage, Coverage::Corpus);
        let registries = Registries::load(dir.path(), &corpus.config).unwrap();
        let report = run_checks(&corpus, &registries, None);
        assert!(report.is_empty());
        assert!(evaluate_gate(&report).pass);

        // Restricted to the skill without the file, the scope is not judged.
        let schema = Corpus::load(dir.path(), &["mongodb-schema".to_string()]).unwrap();
        assert_eq!(schema.coverage, Coverage::Subset);
        assert!(run_checks(&schema, &registries, None).is_empty());
    }

    #[test]
    fn explicit_registry_path_must_exist() {
        let dir = corpus_dir();
        std::fs::write(
            dir.path().join("skillc.yaml"),
            "registries:\n  version_claims: audit/claims.json\n",
        )
        .unwrap();
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        let err = Registries::load(dir.path(), &corpus.config).unwrap_err();
        assert!(matches!(err, SkillcError::RegistryMissing(_)));
    }

    #[test]
    fn malformed_registry_is_fatal() {
        let dir = corpus_dir();
        write_registry(
            dir.path(),
            paths::DEFAULT_SEMANTIC_INVARIANTS,
            r#"{"entries": [{"id": "bad", "scope": "*.md", "kind": "required-phrase", "pattern": "["}]}"#,
        );
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        assert!(Registries::load(dir.path(), &corpus.config).is_err());
    }

    #[test]
    fn write_then_check_reports_no_drift() {
        let dir = corpus_dir();
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        let artifacts = compile_all(&corpus).unwrap();

        let drift = detect_drift(&corpus, &artifacts).unwrap();
        assert_eq!(drift.len(), 2);
        assert!(drift.iter().all(|d| d.kind == DriftKind::Missing));

        let writes = write_artifacts(&corpus, &artifacts).unwrap();
        assert!(writes.iter().all(|w| w.changed));
        assert_eq!(writes[0].path, "skills/mongodb-query/AGENTS.md");
        assert!(detect_drift(&corpus, &artifacts).unwrap().is_empty());

        // Recompiling the same snapshot changes nothing on disk.
        let again = write_artifacts(&corpus, &compile_all(&corpus).unwrap()).unwrap();
        assert!(again.iter().all(|w| !w.changed));
    }

    #[test]
    fn edited_artifact_is_drift() {
        let dir = corpus_dir();
        let corpus = Corpus::load(dir.path(), &[]).unwrap();
        let artifacts = compile_all(&corpus).unwrap();
        write_artifacts(&corpus, &artifacts).unwrap();
        std::fs::write(
            dir.path().join("skills/mongodb-query/AGENTS.md"),
            "Rules: 99\n",
        )
        .unwrap();
        let drift = detect_drift(&corpus, &artifacts).unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].kind, DriftKind::Differs);
    }

    #[test]
    fn unknown_skill_filter_fails() {
        let dir = corpus_dir();
        let err = Corpus::load(dir.path(), &["mongodb-schema".to_string()]).unwrap_err();
        assert!(matches!(err, SkillcError::SkillNotFound(_)));
    }
}
