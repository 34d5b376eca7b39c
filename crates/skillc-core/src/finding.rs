use crate::skill::Skill;
use crate::types::{Checker, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Finding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub severity: Severity,
    /// Rule id, or the file name when the rule never parsed.
    pub rule_id: String,
    pub skill_name: String,
    pub checker_name: Checker,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl Finding {
    pub fn new(
        severity: Severity,
        checker: Checker,
        skill: &str,
        rule_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            rule_id: rule_id.to_string(),
            skill_name: skill.to_string(),
            checker_name: checker,
            message: message.into(),
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }
}

/// Rule files that failed to parse, as P1 findings attributed to the loader.
pub fn load_findings(skill: &Skill) -> Vec<Finding> {
    skill
        .load_errors
        .iter()
        .map(|issue| {
            let file = issue
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Finding::new(
                Severity::P1,
                Checker::SkillLoader,
                &skill.name,
                file.strip_suffix(".md").unwrap_or(&file),
                format!("rule file does not parse: {}", issue.error),
            )
            .with_evidence(issue.path.display().to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// Findings from one run, keyed by the checker that produced them. Each
/// checker's findings keep the order the checker emitted them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: BTreeMap<Checker, Vec<Finding>>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a checker's output. A checker that ran clean is still listed.
    pub fn extend(&mut self, checker: Checker, findings: Vec<Finding>) {
        self.findings.entry(checker).or_default().extend(findings);
    }

    pub fn all(&self) -> impl Iterator<Item = &Finding> {
        self.findings.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.findings.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.all().filter(|f| f.severity == severity).count()
    }

    /// Findings grouped by severity (most severe first), then skill.
    pub fn grouped(&self) -> BTreeMap<Severity, BTreeMap<&str, Vec<&Finding>>> {
        let mut out: BTreeMap<Severity, BTreeMap<&str, Vec<&Finding>>> = BTreeMap::new();
        for f in self.all() {
            out.entry(f.severity)
                .or_default()
                .entry(f.skill_name.as_str())
                .or_default()
                .push(f);
        }
        out
    }
}
