use crate::error::{ParseError, Result, SkillcError};
use crate::paths;
use crate::rule::{Rule, SectionVocabulary};
use crate::types::Impact;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// One `_sections.md` entry: rules whose id starts with `prefix-` belong here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub prefix: String,
    pub title: String,
    pub impact: Impact,
    pub description: String,
}

static SECTION_HEADING_RE: OnceLock<Regex> = OnceLock::new();
static FIELD_RE: OnceLock<Regex> = OnceLock::new();

fn section_heading_re() -> &'static Regex {
    SECTION_HEADING_RE.get_or_init(|| {
        Regex::new(r"^##\s+(?:\d+\.\s+)?(.+?)\s+\(([a-z0-9][a-z0-9-]*)\)\s*$").unwrap()
    })
}

fn field_re() -> &'static Regex {
    FIELD_RE.get_or_init(|| Regex::new(r"^\*\*(Impact|Description):\*\*\s*(.*?)\s*$").unwrap())
}

/// Parse the taxonomy file. Any `## ` heading must name a `(prefix)` and
/// every entry must declare an impact; there is no partial result.
pub fn parse_taxonomy(path: &Path, content: &str) -> Result<Vec<TaxonomyEntry>> {
    let malformed = |reason: String| SkillcError::MalformedTaxonomy {
        path: path.to_path_buf(),
        reason,
    };

    struct Pending {
        prefix: String,
        title: String,
        impact: Option<String>,
        description: String,
    }

    let mut pending: Vec<Pending> = Vec::new();
    for line in content.lines() {
        let line = line.trim_end();
        if line.starts_with("## ") {
            let caps = section_heading_re()
                .captures(line)
                .ok_or_else(|| malformed(format!("heading without '(prefix)': '{line}'")))?;
            pending.push(Pending {
                title: caps[1].to_string(),
                prefix: caps[2].to_string(),
                impact: None,
                description: String::new(),
            });
        } else if let Some(caps) = field_re().captures(line.trim_start()) {
            let Some(entry) = pending.last_mut() else {
                return Err(malformed(format!("'{}' outside any section", &caps[1])));
            };
            match &caps[1] {
                "Impact" => entry.impact = Some(caps[2].to_string()),
                _ => entry.description = caps[2].to_string(),
            }
        }
    }

    if pending.is_empty() {
        return Err(malformed("no sections defined".to_string()));
    }

    let mut entries: Vec<TaxonomyEntry> = Vec::with_capacity(pending.len());
    for p in pending {
        if entries.iter().any(|e| e.prefix == p.prefix) {
            return Err(malformed(format!("duplicate prefix '{}'", p.prefix)));
        }
        let impact = p
            .impact
            .ok_or_else(|| malformed(format!("section '{}' has no **Impact:** line", p.prefix)))?
            .parse::<Impact>()
            .map_err(|e| malformed(format!("section '{}': {e}", p.prefix)))?;
        entries.push(TaxonomyEntry {
            prefix: p.prefix,
            title: p.title,
            impact,
            description: p.description,
        });
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// SkillMetadata
// ---------------------------------------------------------------------------

/// Optional `metadata.json` next to `_sections.md`; feeds the guide header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// A rule file that could not be parsed. Recorded, not fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadIssue {
    pub path: PathBuf,
    pub error: ParseError,
}

#[derive(Debug, Clone)]
pub struct Skill {
    pub name: String,
    pub dir: PathBuf,
    pub taxonomy: Vec<TaxonomyEntry>,
    /// Taxonomy order, then file name.
    pub rules: Vec<Rule>,
    pub load_errors: Vec<LoadIssue>,
    pub metadata: SkillMetadata,
}

impl Skill {
    /// Taxonomy entry a rule belongs to.
    pub fn entry_for(&self, rule: &Rule) -> Option<&TaxonomyEntry> {
        self.taxonomy.iter().find(|e| rule.has_prefix(&e.prefix))
    }

    /// Rules grouped under each taxonomy entry, in compiled order.
    pub fn grouped(&self) -> Vec<(&TaxonomyEntry, Vec<&Rule>)> {
        self.taxonomy
            .iter()
            .map(|entry| {
                let rules = self
                    .rules
                    .iter()
                    .filter(|r| r.has_prefix(&entry.prefix))
                    .collect();
                (entry, rules)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SkillLoader
// ---------------------------------------------------------------------------

pub struct SkillLoader<'a> {
    root: &'a Path,
    vocabulary: &'a SectionVocabulary,
    reserved: &'a [String],
}

impl<'a> SkillLoader<'a> {
    /// `root` is the corpus root; rule paths are recorded relative to it.
    pub fn new(root: &'a Path, vocabulary: &'a SectionVocabulary, reserved: &'a [String]) -> Self {
        Self {
            root,
            vocabulary,
            reserved,
        }
    }

    /// Every directory under `skills_dir` that carries a taxonomy file, in
    /// name order. `only` restricts the set; naming an unknown skill fails.
    pub fn load_corpus(&self, skills_dir: &Path, only: &[String]) -> Result<Vec<Skill>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(skills_dir)? {
            let path = entry?.path();
            if path.is_dir() && paths::sections_path(&path).is_file() {
                dirs.push(path);
            }
        }
        dirs.sort();

        for wanted in only {
            if !dirs.iter().any(|d| dir_name(d) == *wanted) {
                return Err(SkillcError::SkillNotFound(wanted.clone()));
            }
        }

        dirs.iter()
            .filter(|d| only.is_empty() || only.iter().any(|w| *w == dir_name(d)))
            .map(|d| self.load(d))
            .collect()
    }

    pub fn load(&self, dir: &Path) -> Result<Skill> {
        let name = dir_name(dir);

        let sections_path = paths::sections_path(dir);
        if !sections_path.is_file() {
            return Err(SkillcError::TaxonomyMissing(sections_path));
        }
        let taxonomy = parse_taxonomy(
            &sections_path,
            &std::fs::read_to_string(&sections_path)?,
        )?;

        let metadata_path = paths::metadata_path(dir);
        let metadata = if metadata_path.is_file() {
            serde_json::from_str(&std::fs::read_to_string(&metadata_path)?).map_err(|e| {
                SkillcError::InvalidConfig(format!("{}: {e}", metadata_path.display()))
            })?
        } else {
            SkillMetadata::default()
        };

        let mut rules = Vec::new();
        let mut load_errors = Vec::new();
        let mut seen: HashMap<String, PathBuf> = HashMap::new();

        for path in self.rule_files(&paths::rules_dir(dir))? {
            let file_name = dir_name(&path);
            let rel = PathBuf::from(paths::display_relative(self.root, &path));
            let Ok(content) = String::from_utf8(std::fs::read(&path)?) else {
                tracing::debug!(path = %rel.display(), "rule file is not valid UTF-8");
                load_errors.push(LoadIssue {
                    path: rel,
                    error: ParseError::InvalidUtf8,
                });
                continue;
            };

            let mut rule = match Rule::parse(&file_name, &content, self.vocabulary) {
                Ok(rule) => rule,
                Err(error) => {
                    tracing::debug!(path = %rel.display(), %error, "rule failed to parse");
                    load_errors.push(LoadIssue { path: rel, error });
                    continue;
                }
            };
            rule.path = rel;

            if let Some(first) = seen.get(&rule.id) {
                return Err(SkillcError::DuplicateRuleId {
                    skill: name,
                    rule_id: rule.id,
                    first: first.clone(),
                    second: rule.path,
                });
            }
            seen.insert(rule.id.clone(), rule.path.clone());
            rules.push(rule);
        }

        let mut ordered = Vec::with_capacity(rules.len());
        for rule in rules {
            let matches: Vec<usize> = taxonomy
                .iter()
                .enumerate()
                .filter(|(_, e)| rule.has_prefix(&e.prefix))
                .map(|(i, _)| i)
                .collect();
            match matches.as_slice() {
                [] => {
                    return Err(SkillcError::UnclassifiedRule {
                        rule_id: rule.id,
                        path: rule.path,
                    })
                }
                [idx] => ordered.push((*idx, rule)),
                _ => {
                    return Err(SkillcError::AmbiguousRule {
                        prefixes: matches.iter().map(|i| taxonomy[*i].prefix.clone()).collect(),
                        rule_id: rule.id,
                        path: rule.path,
                    })
                }
            }
        }
        ordered.sort_by(|(a, ra), (b, rb)| a.cmp(b).then_with(|| ra.file_name.cmp(&rb.file_name)));

        tracing::debug!(skill = %name, rules = ordered.len(), errors = load_errors.len(), "skill loaded");
        Ok(Skill {
            name,
            dir: dir.to_path_buf(),
            taxonomy,
            rules: ordered.into_iter().map(|(_, r)| r).collect(),
            load_errors,
            metadata,
        })
    }

    /// Markdown files in name order, skipping `_`-prefixed and reserved names.
    fn rule_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let file_name = dir_name(&path);
            let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
            if !path.is_file()
                || !is_markdown
                || file_name.starts_with('_')
                || self.reserved.iter().any(|r| *r == file_name)
            {
                continue;
            }
            files.push(path);
        }
        files.sort();
        Ok(files)
    }
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const SECTIONS: &str = "# Sections\n\n\
## 1. Query Patterns (query)\n\n\
**Impact:** CRITICAL\n\
**Description:** How queries are shaped.\n\n\
## 2. Indexing (index)\n\n\
**Impact:** HIGH\n\
**Description:** Index design.\n";

    pub(crate) fn rule_file(title: &str, extra: &str) -> String {
        format!(
            "---\ntitle: {title}\nimpact: HIGH\ntags: mongodb\n---\n\n{extra}\n\n\
**Incorrect:**\n\n```js\ndb.c.find()\n```\n\n**Correct:**\n\n```js\ndb.c.find().limit(10)\n```\n"
        )
    }

    pub(crate) fn write_skill(root: &Path, name: &str, rules: &[(&str, String)]) -> PathBuf {
        let dir = root.join("skills").join(name);
        std::fs::create_dir_all(dir.join("rules")).unwrap();
        std::fs::write(dir.join("_sections.md"), SECTIONS).unwrap();
        for (file, content) in rules {
            std::fs::write(dir.join("rules").join(file), content).unwrap();
        }
        dir
    }

    fn load(root: &Path, dir: &Path) -> Result<Skill> {
        let vocab = SectionVocabulary::default();
        let reserved = vec!["README.md".to_string()];
        SkillLoader::new(root, &vocab, &reserved).load(dir)
    }

    #[test]
    fn taxonomy_parses_entries_in_order() {
        let entries = parse_taxonomy(Path::new("_sections.md"), SECTIONS).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].prefix, "query");
        assert_eq!(entries[0].title, "Query Patterns");
        assert_eq!(entries[0].impact, Impact::Critical);
        assert_eq!(entries[1].description, "Index design.");
    }

    #[test]
    fn taxonomy_heading_without_prefix_is_malformed() {
        let err = parse_taxonomy(Path::new("_sections.md"), "## Query\n**Impact:** HIGH\n")
            .unwrap_err();
        assert!(matches!(err, SkillcError::MalformedTaxonomy { .. }));
    }

    #[test]
    fn taxonomy_without_impact_is_malformed() {
        let err = parse_taxonomy(Path::new("_sections.md"), "## 1. Query (query)\n").unwrap_err();
        assert!(err.to_string().contains("Impact"));
    }

    #[test]
    fn orders_rules_by_taxonomy_then_file_name() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(
            dir.path(),
            "mongodb-query",
            &[
                ("index-esr.md", rule_file("ESR", "")),
                ("query-projection.md", rule_file("Projection", "")),
                ("query-limit.md", rule_file("Limit", "")),
            ],
        );
        let skill = load(dir.path(), &skill_dir).unwrap();
        let ids: Vec<_> = skill.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["query-limit", "query-projection", "index-esr"]);
        assert_eq!(
            skill.rules[0].path,
            PathBuf::from("skills/mongodb-query/rules/query-limit.md")
        );
    }

    #[test]
    fn parse_failures_are_collected_not_fatal() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(
            dir.path(),
            "s",
            &[
                ("query-ok.md", rule_file("Ok", "")),
                ("query-broken.md", "no frontmatter here\n".to_string()),
            ],
        );
        let skill = load(dir.path(), &skill_dir).unwrap();
        assert_eq!(skill.rules.len(), 1);
        assert_eq!(skill.load_errors.len(), 1);
        assert_eq!(skill.load_errors[0].error, ParseError::MissingFrontmatter);
    }

    #[test]
    fn non_utf8_rule_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(dir.path(), "s", &[("query-ok.md", rule_file("Ok", ""))]);
        std::fs::write(
            skill_dir.join("rules").join("query-bad.md"),
            b"---\ntitle: \xff\xfe\n---\nbody\n",
        )
        .unwrap();
        let skill = load(dir.path(), &skill_dir).unwrap();
        assert_eq!(skill.rules.len(), 1);
        assert_eq!(skill.load_errors.len(), 1);
        assert_eq!(skill.load_errors[0].error, ParseError::InvalidUtf8);
        assert!(skill.load_errors[0].path.ends_with("query-bad.md"));
    }

    #[test]
    fn duplicate_rule_id_fails_the_load() {
        let dir = TempDir::new().unwrap();
        let content = "---\nid: perf-query-stats\ntitle: t\n---\n".to_string();
        let skill_dir = write_skill(
            dir.path(),
            "s",
            &[("query-a.md", content.clone()), ("query-b.md", content)],
        );
        let err = load(dir.path(), &skill_dir).unwrap_err();
        match err {
            SkillcError::DuplicateRuleId { rule_id, .. } => assert_eq!(rule_id, "perf-query-stats"),
            other => panic!("expected DuplicateRuleId, got {other:?}"),
        }
    }

    #[test]
    fn unclassified_rule_fails_the_load() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(dir.path(), "s", &[("schema-embed.md", rule_file("E", ""))]);
        let err = load(dir.path(), &skill_dir).unwrap_err();
        assert!(matches!(err, SkillcError::UnclassifiedRule { .. }));
    }

    #[test]
    fn missing_taxonomy_is_fatal() {
        let dir = TempDir::new().unwrap();
        let skill_dir = dir.path().join("skills/empty");
        std::fs::create_dir_all(&skill_dir).unwrap();
        let err = load(dir.path(), &skill_dir).unwrap_err();
        assert!(matches!(err, SkillcError::TaxonomyMissing(_)));
    }

    #[test]
    fn skips_reserved_and_underscore_files() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(
            dir.path(),
            "s",
            &[
                ("query-a.md", rule_file("A", "")),
                ("_template.md", "template".to_string()),
                ("README.md", "readme".to_string()),
                ("notes.txt", "text".to_string()),
            ],
        );
        let skill = load(dir.path(), &skill_dir).unwrap();
        assert_eq!(skill.rules.len(), 1);
        assert!(skill.load_errors.is_empty());
    }

    #[test]
    fn corpus_filter_rejects_unknown_skill() {
        let dir = TempDir::new().unwrap();
        write_skill(dir.path(), "alpha", &[("query-a.md", rule_file("A", ""))]);
        write_skill(dir.path(), "beta", &[("query-b.md", rule_file("B", ""))]);
        let vocab = SectionVocabulary::default();
        let loader = SkillLoader::new(dir.path(), &vocab, &[]);

        let all = loader.load_corpus(&dir.path().join("skills"), &[]).unwrap();
        assert_eq!(
            all.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["alpha", "beta"]
        );

        let only = loader
            .load_corpus(&dir.path().join("skills"), &["beta".to_string()])
            .unwrap();
        assert_eq!(only.len(), 1);

        let err = loader
            .load_corpus(&dir.path().join("skills"), &["gamma".to_string()])
            .unwrap_err();
        assert!(matches!(err, SkillcError::SkillNotFound(_)));
    }

    #[test]
    fn metadata_json_is_optional() {
        let dir = TempDir::new().unwrap();
        let skill_dir = write_skill(dir.path(), "s", &[("query-a.md", rule_file("A", ""))]);
        assert_eq!(load(dir.path(), &skill_dir).unwrap().metadata, SkillMetadata::default());

        std::fs::write(
            skill_dir.join("metadata.json"),
            r#"{"version": "1.2.0", "abstract": "Query guidance"}"#,
        )
        .unwrap();
        let skill = load(dir.path(), &skill_dir).unwrap();
        assert_eq!(skill.metadata.version.as_deref(), Some("1.2.0"));
        assert_eq!(skill.metadata.summary.as_deref(), Some("Query guidance"));
    }
}
