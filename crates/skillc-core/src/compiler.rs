use crate::error::{Result, SkillcError};
use crate::rule::{Rule, CORRECT, INCORRECT};
use crate::skill::Skill;
use crate::types::Impact;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub rule_id: String,
    pub title: String,
    pub impact: Impact,
    pub bad_example: String,
    pub good_example: String,
}

/// Output of one compilation. Holds no timestamps or paths, so the same
/// skill snapshot always yields the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledArtifact {
    pub skill: String,
    pub guide: String,
    pub test_cases: Vec<TestCase>,
    /// Rules left out of the test-case list, and why.
    pub warnings: Vec<String>,
}

impl CompiledArtifact {
    /// Pretty JSON array with a trailing newline.
    pub fn test_cases_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.test_cases)?;
        out.push('\n');
        Ok(out)
    }
}

/// Comment placed directly before each rule in the guide.
pub fn rule_marker(rule_id: &str) -> String {
    format!("<!-- rule-id: {rule_id} -->")
}

// ---------------------------------------------------------------------------
// compile
// ---------------------------------------------------------------------------

/// Render the guide and test cases for `skill`.
///
/// `default_version` is used when the skill's metadata names no version.
/// Fails with [`SkillcError::DroppedRule`] if any rule does not appear in the
/// guide exactly once.
pub fn compile(skill: &Skill, default_version: &str) -> Result<CompiledArtifact> {
    let meta = &skill.metadata;
    let title = meta.title.as_deref().unwrap_or(&skill.name);
    let version = meta.version.as_deref().unwrap_or(default_version);
    let groups = skill.grouped();

    let mut guide = String::new();
    let _ = writeln!(guide, "# {title}\n");
    let _ = writeln!(guide, "**Version {version}**  ");
    if let Some(org) = &meta.organization {
        let _ = writeln!(guide, "{org}  ");
    }
    let _ = writeln!(guide, "Skill: `{}`  ", skill.name);
    let _ = writeln!(guide, "Rules: {}\n", skill.rules.len());
    if let Some(summary) = &meta.summary {
        let _ = writeln!(guide, "> {}\n", summary.trim());
    }

    guide.push_str("## Table of Contents\n\n");
    for (n, (entry, rules)) in groups.iter().enumerate() {
        let heading = format!("{}. {}", n + 1, entry.title);
        let _ = writeln!(
            guide,
            "{}. [{}](#{}) - **{}**",
            n + 1,
            entry.title,
            anchor(&heading),
            entry.impact
        );
        for (m, rule) in rules.iter().enumerate() {
            let heading = format!("{}.{} {}", n + 1, m + 1, display_title(rule));
            let _ = writeln!(guide, "   - [{heading}](#{})", anchor(&heading));
        }
    }
    guide.push_str("\n---\n");

    for (n, (entry, rules)) in groups.iter().enumerate() {
        let _ = writeln!(guide, "\n## {}. {}\n", n + 1, entry.title);
        let _ = writeln!(guide, "**Impact: {}**\n", entry.impact);
        if !entry.description.is_empty() {
            let _ = writeln!(guide, "{}\n", entry.description);
        }
        for (m, rule) in rules.iter().enumerate() {
            let impact = rule.impact.unwrap_or(entry.impact);
            let _ = writeln!(guide, "{}", rule_marker(&rule.id));
            let _ = writeln!(guide, "### {}.{} {}\n", n + 1, m + 1, display_title(rule));
            let _ = writeln!(guide, "**Impact: {impact}**\n");
            let body = rule.body.trim();
            if !body.is_empty() {
                let _ = writeln!(guide, "{body}\n");
            }
        }
    }
    let trimmed = guide.trim_end().len();
    guide.truncate(trimmed);
    guide.push('\n');

    for rule in &skill.rules {
        if guide.matches(&rule_marker(&rule.id)).count() != 1 {
            return Err(SkillcError::DroppedRule {
                skill: skill.name.clone(),
                rule_id: rule.id.clone(),
            });
        }
    }

    let mut test_cases = Vec::new();
    let mut warnings = Vec::new();
    for rule in &skill.rules {
        let bad = rule.section(INCORRECT);
        let good = rule.section(CORRECT);
        match (bad, good) {
            (Some(bad), Some(good)) => test_cases.push(TestCase {
                rule_id: rule.id.clone(),
                title: display_title(rule).to_string(),
                impact: rule
                    .impact
                    .or_else(|| skill.entry_for(rule).map(|e| e.impact))
                    .unwrap_or(Impact::Medium),
                bad_example: example(bad),
                good_example: example(good),
            }),
            _ => {
                let missing: Vec<&str> = [
                    (bad.is_none(), INCORRECT),
                    (good.is_none(), CORRECT),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                warnings.push(format!(
                    "{}: no test case, missing section(s) {}",
                    rule.id,
                    missing.join(" and ")
                ));
            }
        }
    }

    tracing::info!(
        skill = %skill.name,
        rules = skill.rules.len(),
        test_cases = test_cases.len(),
        warnings = warnings.len(),
        "skill compiled"
    );
    Ok(CompiledArtifact {
        skill: skill.name.clone(),
        guide,
        test_cases,
        warnings,
    })
}

fn display_title(rule: &Rule) -> &str {
    if rule.title.trim().is_empty() {
        &rule.id
    } else {
        rule.title.trim()
    }
}

/// GitHub-style heading anchor.
fn anchor(heading: &str) -> String {
    heading
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// The first fenced code block of a section, or the whole section when it
/// has none.
fn example(section: &str) -> String {
    let mut lines = section.lines();
    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        let fence: String = trimmed
            .chars()
            .take_while(|c| *c == '`' || *c == '~')
            .collect();
        if fence.len() >= 3 && fence.chars().all(|c| c == fence.as_bytes()[0] as char) {
            let code: Vec<&str> = lines
                .by_ref()
                .take_while(|l| !l.trim_start().starts_with(fence.as_str()))
                .collect();
            return code.join("\n");
        }
    }
    section.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
