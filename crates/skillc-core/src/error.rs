use std::path::PathBuf;
use thiserror::Error;

/// Syntax failure while reading a single rule file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing frontmatter: file must start with '---'")]
    MissingFrontmatter,

    #[error("unterminated frontmatter: no closing '---'")]
    UnterminatedFrontmatter,

    #[error("malformed frontmatter line {line}: expected 'key: value', got '{text}'")]
    MalformedLine { line: usize, text: String },

    #[error("duplicate frontmatter key '{0}'")]
    DuplicateKey(String),

    #[error("file is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Error)]
pub enum SkillcError {
    #[error("taxonomy file not found: {}", .0.display())]
    TaxonomyMissing(PathBuf),

    #[error("malformed taxonomy {}: {reason}", .path.display())]
    MalformedTaxonomy { path: PathBuf, reason: String },

    #[error("rule '{rule_id}' in {} has no taxonomy entry for its prefix", .path.display())]
    UnclassifiedRule { rule_id: String, path: PathBuf },

    #[error("rule '{rule_id}' in {} matches several taxonomy prefixes: {}", .path.display(), .prefixes.join(", "))]
    AmbiguousRule {
        rule_id: String,
        path: PathBuf,
        prefixes: Vec<String>,
    },

    #[error("duplicate rule id '{rule_id}' in skill '{skill}': {} and {}", .first.display(), .second.display())]
    DuplicateRuleId {
        skill: String,
        rule_id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("skill not found: {0}")]
    SkillNotFound(String),

    #[error("invalid registry {source_name}: {reason}")]
    InvalidRegistry { source_name: String, reason: String },

    #[error("invalid registry {source_name}: entry '{entry}': {reason}")]
    InvalidRegistryEntry {
        source_name: String,
        entry: String,
        reason: String,
    },

    #[error("registry not found: {}", .0.display())]
    RegistryMissing(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid impact '{0}': expected CRITICAL, HIGH or MEDIUM")]
    InvalidImpact(String),

    #[error("invalid severity '{0}': expected P0, P1, P2 or P3")]
    InvalidSeverity(String),

    #[error("compiled guide for '{skill}' dropped or duplicated rule '{rule_id}'")]
    DroppedRule { skill: String, rule_id: String },

    #[error("http client error: {0}")]
    Http(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SkillcError>;
