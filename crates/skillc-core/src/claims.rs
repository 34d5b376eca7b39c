use crate::finding::Finding;
use crate::registry::{ClaimEntry, ClaimKind, ClaimRegistry};
use crate::rule::Rule;
use crate::skill::Skill;
use crate::types::Checker;

/// How much of the corpus a run loaded. A file-level scope that matches no
/// rule can only be judged when every skill the entry applies to is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Corpus,
    Subset,
}

/// Apply whole-file registry assertions (headings, phrases, file-level
/// assertions). Section-scoped token entries are left to
/// [`check_semantic_invariants`].
pub fn check_version_claims(
    registry: &ClaimRegistry,
    skills: &[Skill],
    coverage: Coverage,
) -> Vec<Finding> {
    apply(registry, skills, coverage, Checker::VersionClaimChecker, false)
}

/// Apply every registry assertion, including token checks confined to a
/// named section such as the `Correct` example.
pub fn check_semantic_invariants(
    registry: &ClaimRegistry,
    skills: &[Skill],
    coverage: Coverage,
) -> Vec<Finding> {
    apply(registry, skills, coverage, Checker::SemanticInvariantChecker, true)
}

/// Findings are ordered by registry entry, then skill, then rule order.
fn apply(
    registry: &ClaimRegistry,
    skills: &[Skill],
    coverage: Coverage,
    checker: Checker,
    section_scoped: bool,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    for entry in registry.entries() {
        if entry.kind.is_section_scoped() && !section_scoped {
            tracing::debug!(entry = %entry.id, registry = registry.name(), "section-scoped entry skipped");
            continue;
        }

        let mut scope_matched = false;
        for skill in skills.iter().filter(|s| entry.applies_to(&s.name)) {
            for rule in skill
                .rules
                .iter()
                .filter(|r| entry.scope.matches(&r.file_name, &r.path))
            {
                scope_matched = true;
                if let Some(message) = evaluate(entry, rule) {
                    let message = format!("{}: {message}", entry.id);
                    findings.push(
                        finding(entry, &skill.name, checker, &rule.id, message)
                            .with_evidence(rule.path.display().to_string())
                            .with_evidence(format!("pattern: {}", entry.pattern.as_str())),
                    );
                }
            }
        }

        if entry.kind == ClaimKind::RequiredFileLevelAssertion
            && !scope_matched
            && can_judge_scope(entry, skills, coverage)
        {
            let owner = if entry.applies_to_skills.is_empty() {
                "all".to_string()
            } else {
                entry.applies_to_skills.join(", ")
            };
            let message = format!(
                "{}: no rule in any applicable skill matches scope '{}'",
                entry.id,
                entry.scope.as_str()
            );
            findings.push(
                finding(entry, &owner, checker, entry.scope.as_str(), message)
                    .with_evidence(format!("scope: {}", entry.scope.as_str())),
            );
        }
    }
    findings
}

fn can_judge_scope(entry: &ClaimEntry, skills: &[Skill], coverage: Coverage) -> bool {
    match coverage {
        Coverage::Corpus => true,
        Coverage::Subset => {
            !entry.applies_to_skills.is_empty()
                && entry
                    .applies_to_skills
                    .iter()
                    .all(|name| skills.iter().any(|s| s.name == *name))
        }
    }
}

/// `Some(message)` when the rule violates the entry.
fn evaluate(entry: &ClaimEntry, rule: &Rule) -> Option<String> {
    let pattern = &entry.pattern;
    match entry.kind {
        ClaimKind::RequiredHeading => {
            let found = rule.sections.keys().any(|name| pattern.is_match(name));
            (!found).then(|| format!("required heading matching /{pattern}/ is missing"))
        }
        ClaimKind::RequiredPhrase | ClaimKind::RequiredFileLevelAssertion => {
            (!pattern.is_match(&rule.body))
                .then(|| format!("required phrase /{pattern}/ not found"))
        }
        ClaimKind::ProhibitedPhrase => pattern
            .find(&rule.body)
            .map(|m| format!("prohibited phrase found: '{}'", m.as_str())),
        ClaimKind::RequiredToken => {
            let section = entry.section.as_deref().unwrap_or_default();
            match rule.section(section) {
                None => Some(format!(
                    "section '{section}' is missing; it must contain /{pattern}/"
                )),
                Some(text) if !pattern.is_match(text) => Some(format!(
                    "required token /{pattern}/ not found in section '{section}'"
                )),
                Some(_) => None,
            }
        }
        ClaimKind::ProhibitedToken => {
            let section = entry.section.as_deref().unwrap_or_default();
            rule.section(section)
                .and_then(|text| pattern.find(text))
                .map(|m| {
                    format!(
                        "prohibited token '{}' found in section '{section}'",
                        m.as_str()
                    )
                })
        }
    }
}

fn finding(
    entry: &ClaimEntry,
    skill: &str,
    checker: Checker,
    rule_id: &str,
    message: String,
) -> Finding {
    Finding::new(entry.severity, checker, skill, rule_id, message)
}
