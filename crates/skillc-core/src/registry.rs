use crate::error::{Result, SkillcError};
use crate::types::Severity;
use globset::{Glob, GlobMatcher};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ClaimKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimKind {
    /// Pattern must match one of the rule's recognized section names.
    RequiredHeading,
    /// Pattern must match somewhere in the body.
    RequiredPhrase,
    /// Pattern must not match anywhere in the body.
    ProhibitedPhrase,
    /// Scope must name a rule that exists in the skill, and its body must match.
    RequiredFileLevelAssertion,
    /// Pattern must match inside `section`.
    RequiredToken,
    /// Pattern must not match inside `section`.
    ProhibitedToken,
}

impl ClaimKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimKind::RequiredHeading => "required-heading",
            ClaimKind::RequiredPhrase => "required-phrase",
            ClaimKind::ProhibitedPhrase => "prohibited-phrase",
            ClaimKind::RequiredFileLevelAssertion => "required-file-level-assertion",
            ClaimKind::RequiredToken => "required-token",
            ClaimKind::ProhibitedToken => "prohibited-token",
        }
    }

    pub fn is_prohibition(self) -> bool {
        matches!(self, ClaimKind::ProhibitedPhrase | ClaimKind::ProhibitedToken)
    }

    /// Token kinds look inside one named section instead of the whole file.
    pub fn is_section_scoped(self) -> bool {
        matches!(self, ClaimKind::RequiredToken | ClaimKind::ProhibitedToken)
    }
}

// ---------------------------------------------------------------------------
// Raw (wire) form
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRegistry {
    #[serde(default = "default_registry_version")]
    version: u32,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

fn default_registry_version() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    scope: String,
    kind: ClaimKind,
    pattern: String,
    #[serde(default)]
    severity: Option<Severity>,
    #[serde(default)]
    applies_to_skills: Option<Vec<String>>,
    #[serde(default)]
    section: Option<String>,
    #[serde(default)]
    case_insensitive: bool,
    #[serde(default)]
    description: Option<String>,
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Scope {
    /// Exact file name, e.g. `query-bulkwrite-command.md`.
    File(String),
    /// Glob over the rule path relative to the corpus root.
    Glob { pattern: String, matcher: GlobMatcher },
}

impl Scope {
    fn parse(raw: &str) -> std::result::Result<Self, String> {
        if raw.trim().is_empty() {
            return Err("scope is empty".to_string());
        }
        if raw.contains(['*', '?', '[', '/']) {
            let glob = Glob::new(raw).map_err(|e| format!("invalid scope glob: {e}"))?;
            return Ok(Scope::Glob {
                pattern: raw.to_string(),
                matcher: glob.compile_matcher(),
            });
        }
        Ok(Scope::File(raw.to_string()))
    }

    /// `path` is relative to the corpus root with forward slashes.
    pub fn matches(&self, file_name: &str, path: &Path) -> bool {
        match self {
            Scope::File(name) => name == file_name,
            Scope::Glob { matcher, .. } => matcher.is_match(path),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scope::File(name) => name,
            Scope::Glob { pattern, .. } => pattern,
        }
    }
}

// ---------------------------------------------------------------------------
// ClaimEntry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClaimEntry {
    pub id: String,
    pub scope: Scope,
    pub kind: ClaimKind,
    pub pattern: Regex,
    pub severity: Severity,
    /// Empty means every skill.
    pub applies_to_skills: Vec<String>,
    pub section: Option<String>,
    pub description: Option<String>,
}

impl ClaimEntry {
    pub fn applies_to(&self, skill: &str) -> bool {
        self.applies_to_skills.is_empty() || self.applies_to_skills.iter().any(|s| s == skill)
    }
}

// ---------------------------------------------------------------------------
// ClaimRegistry
// ---------------------------------------------------------------------------

/// Declarative content assertions. Built once per run and passed by
/// reference; there is no API to change it after loading.
#[derive(Debug, Clone)]
pub struct ClaimRegistry {
    name: String,
    version: u32,
    entries: Vec<ClaimEntry>,
}

impl ClaimRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SkillcError::RegistryMissing(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&path.display().to_string(), &data)
    }

    /// Parse and compile every entry. One bad entry fails the whole registry.
    pub fn from_json(name: &str, data: &str) -> Result<Self> {
        let raw: RawRegistry =
            serde_json::from_str(data).map_err(|e| SkillcError::InvalidRegistry {
                source_name: name.to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = Vec::with_capacity(raw.entries.len());
        for (idx, entry) in raw.entries.into_iter().enumerate() {
            let label = entry.id.clone().unwrap_or_else(|| format!("#{idx}"));
            let compiled = compile_entry(idx, entry).map_err(|reason| {
                SkillcError::InvalidRegistryEntry {
                    source_name: name.to_string(),
                    entry: label,
                    reason,
                }
            })?;
            if entries.iter().any(|e: &ClaimEntry| e.id == compiled.id) {
                return Err(SkillcError::InvalidRegistryEntry {
                    source_name: name.to_string(),
                    entry: compiled.id,
                    reason: "duplicate entry id".to_string(),
                });
            }
            entries.push(compiled);
        }

        Ok(Self {
            name: name.to_string(),
            version: raw.version,
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[ClaimEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile_entry(idx: usize, raw: RawEntry) -> std::result::Result<ClaimEntry, String> {
    if raw.pattern.is_empty() {
        return Err("pattern is empty".to_string());
    }
    let pattern = RegexBuilder::new(&raw.pattern)
        .case_insensitive(raw.case_insensitive)
        .multi_line(true)
        .build()
        .map_err(|e| format!("invalid pattern: {e}"))?;

    let section = raw.section.filter(|s| !s.trim().is_empty());
    if raw.kind.is_section_scoped() && section.is_none() {
        return Err(format!("kind '{}' requires a section", raw.kind.as_str()));
    }

    let applies_to_skills = match raw.applies_to_skills {
        Some(skills) if skills.iter().any(|s| s == "all") => Vec::new(),
        Some(skills) if skills.is_empty() => {
            return Err("appliesToSkills is empty; use [\"all\"]".to_string())
        }
        Some(skills) => skills,
        None => Vec::new(),
    };

    Ok(ClaimEntry {
        id: raw.id.unwrap_or_else(|| format!("{}:{}#{idx}", raw.kind.as_str(), raw.scope)),
        scope: Scope::parse(&raw.scope)?,
        kind: raw.kind,
        pattern,
        // Unclassified entries block until someone downgrades them.
        severity: raw.severity.unwrap_or(Severity::P0),
        applies_to_skills,
        section,
        description: raw.description,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: &str) -> Result<ClaimRegistry> {
        ClaimRegistry::from_json("test.json", json)
    }

    #[test]
    fn loads_entries_with_defaults() {
        let reg = load(
            r#"{"version": 3, "entries": [
                {"id": "bulk-atomic", "scope": "query-bulkwrite-command.md",
                 "kind": "prohibited-phrase", "pattern": "atomic across collections"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(reg.version(), 3);
        let entry = &reg.entries()[0];
        assert_eq!(entry.severity, Severity::P0);
        assert!(entry.applies_to("any-skill"));
        assert!(matches!(entry.scope, Scope::File(_)));
    }

    #[test]
    fn one_invalid_regex_fails_the_whole_registry() {
        let err = load(
            r#"{"entries": [
                {"id": "ok", "scope": "a.md", "kind": "required-phrase", "pattern": "fine"},
                {"id": "broken", "scope": "b.md", "kind": "required-phrase", "pattern": "(unclosed"}
            ]}"#,
        )
        .unwrap_err();
        match err {
            SkillcError::InvalidRegistryEntry { entry, reason, .. } => {
                assert_eq!(entry, "broken");
                assert!(reason.contains("invalid pattern"));
            }
            other => panic!("expected InvalidRegistryEntry, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_fails() {
        let err = load(
            r#"{"entries": [{"scope": "a.md", "kind": "suggested-phrase", "pattern": "x"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SkillcError::InvalidRegistry { .. }));
    }

    #[test]
    fn token_kind_requires_section() {
        let err = load(
            r#"{"entries": [{"id": "t", "scope": "*.md", "kind": "required-token", "pattern": "\\$match"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a section"));
    }

    #[test]
    fn glob_scope_matches_relative_paths() {
        let reg = load(
            r#"{"entries": [{"id": "g", "scope": "skills/*/rules/query-*.md",
                "kind": "required-phrase", "pattern": "x", "severity": "P1",
                "appliesToSkills": ["mongodb-query"]}]}"#,
        )
        .unwrap();
        let entry = &reg.entries()[0];
        assert!(entry.scope.matches(
            "query-a.md",
            Path::new("skills/mongodb-query/rules/query-a.md")
        ));
        assert!(!entry.scope.matches(
            "index-a.md",
            Path::new("skills/mongodb-query/rules/index-a.md")
        ));
        assert!(entry.applies_to("mongodb-query"));
        assert!(!entry.applies_to("mongodb-schema"));
    }

    #[test]
    fn duplicate_ids_fail() {
        let err = load(
            r#"{"entries": [
                {"id": "dup", "scope": "a.md", "kind": "required-phrase", "pattern": "x"},
                {"id": "dup", "scope": "b.md", "kind": "required-phrase", "pattern": "y"}
            ]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate entry id"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ClaimRegistry::load(Path::new("/nonexistent/registry.json")).unwrap_err();
        assert!(matches!(err, SkillcError::RegistryMissing(_)));
    }
}
