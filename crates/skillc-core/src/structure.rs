use crate::finding::Finding;
use crate::rule::Rule;
use crate::skill::Skill;
use crate::types::{Checker, Impact, Severity};

const REQUIRED_FRONTMATTER: &[&str] = &["title", "impact", "tags"];

/// Check every rule for frontmatter completeness and the required sections.
///
/// Findings come out in rule order; within a rule, frontmatter problems
/// first and then missing sections in the order `required` lists them.
pub fn validate_structure(skill: &Skill, required: &[String]) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rule in &skill.rules {
        check_frontmatter(skill, rule, &mut findings);
        for section in required {
            if !rule.sections.contains_key(section) {
                findings.push(
                    finding(skill, rule, format!("missing required section '{section}'"))
                        .with_evidence(section.clone()),
                );
            }
        }
    }
    findings
}

fn check_frontmatter(skill: &Skill, rule: &Rule, findings: &mut Vec<Finding>) {
    for key in REQUIRED_FRONTMATTER {
        let present = rule
            .frontmatter
            .get(*key)
            .is_some_and(|v| !v.trim().is_empty());
        if !present {
            findings.push(
                finding(skill, rule, format!("missing frontmatter field '{key}'"))
                    .with_evidence(key.to_string()),
            );
        }
    }

    if let Some(raw) = rule.frontmatter.get("impact").filter(|v| !v.trim().is_empty()) {
        if raw.parse::<Impact>().is_err() {
            let allowed: Vec<_> = Impact::all().iter().map(|i| i.as_str()).collect();
            findings.push(
                finding(
                    skill,
                    rule,
                    format!("invalid impact '{raw}': expected one of {}", allowed.join(", ")),
                )
                .with_evidence(raw.clone()),
            );
        }
    }

    if rule.frontmatter.contains_key("tags") && rule.tags.is_empty() {
        findings.push(
            finding(skill, rule, "frontmatter field 'tags' lists no tags")
                .with_evidence("tags"),
        );
    }
}

fn finding(skill: &Skill, rule: &Rule, message: impl Into<String>) -> Finding {
    Finding::new(
        Severity::P1,
        Checker::StructuralValidator,
        &skill.name,
        &rule.id,
        message,
    )
    .with_evidence(rule.path.display().to_string())
}
