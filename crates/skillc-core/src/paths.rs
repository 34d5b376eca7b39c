use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File name constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "skillc.yaml";
pub const DEFAULT_SKILLS_DIR: &str = "skills";
pub const SECTIONS_FILE: &str = "_sections.md";
pub const RULES_DIR: &str = "rules";
pub const METADATA_FILE: &str = "metadata.json";

pub const DEFAULT_GUIDE_FILE: &str = "AGENTS.md";
pub const DEFAULT_TEST_CASES_FILE: &str = "test-cases.json";

pub const DEFAULT_VERSION_CLAIMS: &str = "registry/version-claims.json";
pub const DEFAULT_SEMANTIC_INVARIANTS: &str = "registry/semantic-invariants.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn skills_dir(root: &Path, skills_dir: &str) -> PathBuf {
    root.join(skills_dir)
}

pub fn sections_path(skill_dir: &Path) -> PathBuf {
    skill_dir.join(SECTIONS_FILE)
}

pub fn metadata_path(skill_dir: &Path) -> PathBuf {
    skill_dir.join(METADATA_FILE)
}

/// Directory holding a skill's rule files: `<skill>/rules/` when present,
/// otherwise the skill directory itself.
pub fn rules_dir(skill_dir: &Path) -> PathBuf {
    let nested = skill_dir.join(RULES_DIR);
    if nested.is_dir() {
        nested
    } else {
        skill_dir.to_path_buf()
    }
}

/// Render `path` relative to `root` with forward slashes, for stable
/// evidence strings and glob matching across platforms.
pub fn display_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
