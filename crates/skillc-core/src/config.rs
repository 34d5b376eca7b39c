use crate::error::{Result, SkillcError};
use crate::paths;
use crate::rule::SectionVocabulary;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RequiredSections
// ---------------------------------------------------------------------------

/// Sections every rule must carry, with per-skill overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiredSections {
    #[serde(default = "default_required")]
    pub default: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skills: BTreeMap<String, Vec<String>>,
}

fn default_required() -> Vec<String> {
    vec!["Incorrect".to_string(), "Correct".to_string()]
}

impl Default for RequiredSections {
    fn default() -> Self {
        Self {
            default: default_required(),
            skills: BTreeMap::new(),
        }
    }
}

impl RequiredSections {
    pub fn for_skill(&self, skill: &str) -> &[String] {
        self.skills
            .get(skill)
            .map(|v| v.as_slice())
            .unwrap_or(&self.default)
    }
}

// ---------------------------------------------------------------------------
// LinkConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-probe timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base delay; doubles on every retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Wall-clock budget for the whole check. `0` disables the budget.
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
    /// Regexes; matching URLs are never probed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    2
}

fn default_backoff_ms() -> u64 {
    250
}

fn default_budget_secs() -> u64 {
    120
}

fn default_user_agent() -> String {
    concat!("skillc/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
            budget_secs: default_budget_secs(),
            ignore: Vec::new(),
            user_agent: default_user_agent(),
        }
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig / OutputConfig
// ---------------------------------------------------------------------------

/// Registry locations relative to the corpus root. `None` means the default
/// path, which may be absent; an explicit path must exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_claims: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_invariants: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_guide")]
    pub guide: String,
    #[serde(default = "default_test_cases")]
    pub test_cases: String,
}

fn default_guide() -> String {
    paths::DEFAULT_GUIDE_FILE.to_string()
}

fn default_test_cases() -> String {
    paths::DEFAULT_TEST_CASES_FILE.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            guide: default_guide(),
            test_cases: default_test_cases(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default = "default_skills_dir")]
    pub skills_dir: String,
    /// Recognized section vocabulary.
    #[serde(default = "default_sections")]
    pub sections: Vec<String>,
    #[serde(default)]
    pub required_sections: RequiredSections,
    #[serde(default = "default_reserved")]
    pub reserved_files: Vec<String>,
    #[serde(default)]
    pub links: LinkConfig,
    #[serde(default)]
    pub registries: RegistryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Guide version for skills whose `metadata.json` names none.
    #[serde(default = "default_guide_version")]
    pub default_version: String,
}

fn default_config_version() -> u32 {
    1
}

fn default_skills_dir() -> String {
    paths::DEFAULT_SKILLS_DIR.to_string()
}

fn default_sections() -> Vec<String> {
    SectionVocabulary::default().names().to_vec()
}

fn default_reserved() -> Vec<String> {
    vec![
        "AGENTS.md".to_string(),
        "README.md".to_string(),
        "SKILL.md".to_string(),
    ]
}

fn default_guide_version() -> String {
    "1.0.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            skills_dir: default_skills_dir(),
            sections: default_sections(),
            required_sections: RequiredSections::default(),
            reserved_files: default_reserved(),
            links: LinkConfig::default(),
            registries: RegistryConfig::default(),
            output: OutputConfig::default(),
            default_version: default_guide_version(),
        }
    }
}

impl Config {
    /// Load `skillc.yaml` from `root`; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load and reject configs whose validation reports an error.
    pub fn load_checked(root: &Path) -> Result<Self> {
        let cfg = Self::load(root)?;
        let errors: Vec<String> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if !errors.is_empty() {
            return Err(SkillcError::InvalidConfig(errors.join("; ")));
        }
        Ok(cfg)
    }

    pub fn vocabulary(&self) -> SectionVocabulary {
        SectionVocabulary::new(self.sections.iter().cloned())
    }

    pub fn skills_path(&self, root: &Path) -> PathBuf {
        paths::skills_dir(root, &self.skills_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        // 1. Required sections must be part of the vocabulary, or they could
        //    never be satisfied.
        let vocab = self.vocabulary();
        let mut required: Vec<(&str, &String)> = self
            .required_sections
            .default
            .iter()
            .map(|s| ("default", s))
            .collect();
        for (skill, names) in &self.required_sections.skills {
            required.extend(names.iter().map(|s| (skill.as_str(), s)));
        }
        for (scope, name) in required {
            if !vocab.contains(name) {
                error(format!(
                    "required section '{name}' ({scope}) is not in the section vocabulary"
                ));
            }
        }

        // 2. Link checker limits
        if self.links.concurrency == 0 {
            error("links.concurrency must be at least 1".to_string());
        }
        if self.links.timeout_ms == 0 {
            error("links.timeout_ms must be greater than 0".to_string());
        }
        for pattern in &self.links.ignore {
            if let Err(e) = Regex::new(pattern) {
                error(format!("links.ignore pattern '{pattern}' is invalid: {e}"));
            }
        }

        // 3. Output names must be plain file names
        for (field, name) in [
            ("output.guide", &self.output.guide),
            ("output.test_cases", &self.output.test_cases),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                error(format!("{field} must be a plain file name, got '{name}'"));
            }
        }

        // 4. Unusual but legal values
        if self.links.retries > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "links.retries={} (>10 is unusual)",
                    self.links.retries
                ),
            });
        }
        if !self.reserved_files.contains(&self.output.guide) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "output.guide '{}' is not in reserved_files; a compiled guide inside a rules directory would be read back as a rule",
                    self.output.guide
                ),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
