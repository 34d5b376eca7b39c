use crate::error::SkillcError;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    Critical,
    High,
    Medium,
}

impl Impact {
    pub fn all() -> &'static [Impact] {
        &[Impact::Critical, Impact::High, Impact::Medium]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Critical => "CRITICAL",
            Impact::High => "HIGH",
            Impact::Medium => "MEDIUM",
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Impact {
    type Err = SkillcError;

    /// Accepts the upper-case names only. Frontmatter is not coerced, so
    /// `impact: high` is reported rather than silently accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICAL" => Ok(Impact::Critical),
            "HIGH" => Ok(Impact::High),
            "MEDIUM" => Ok(Impact::Medium),
            _ => Err(SkillcError::InvalidImpact(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Finding severity. `P0` is the most severe; ordering follows declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    P0,
    P1,
    P2,
    P3,
}

impl Severity {
    pub fn all() -> &'static [Severity] {
        &[Severity::P0, Severity::P1, Severity::P2, Severity::P3]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::P0 => "P0",
            Severity::P1 => "P1",
            Severity::P2 => "P2",
            Severity::P3 => "P3",
        }
    }

    /// P0 and P1 block a release; P2 and P3 are reported only.
    pub fn is_blocking(self) -> bool {
        matches!(self, Severity::P0 | Severity::P1)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = SkillcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "P0" => Ok(Severity::P0),
            "P1" => Ok(Severity::P1),
            "P2" => Ok(Severity::P2),
            "P3" => Ok(Severity::P3),
            _ => Err(SkillcError::InvalidSeverity(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// The component that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Checker {
    SkillLoader,
    StructuralValidator,
    ReferenceLinkChecker,
    VersionClaimChecker,
    SemanticInvariantChecker,
}

impl Checker {
    pub fn as_str(self) -> &'static str {
        match self {
            Checker::SkillLoader => "SkillLoader",
            Checker::StructuralValidator => "StructuralValidator",
            Checker::ReferenceLinkChecker => "ReferenceLinkChecker",
            Checker::VersionClaimChecker => "VersionClaimChecker",
            Checker::SemanticInvariantChecker => "SemanticInvariantChecker",
        }
    }
}

impl fmt::Display for Checker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impact_parse_is_case_sensitive() {
        assert_eq!("HIGH".parse::<Impact>().unwrap(), Impact::High);
        assert!("high".parse::<Impact>().is_err());
        assert!("LOW".parse::<Impact>().is_err());
    }

    #[test]
    fn severity_ordering_puts_p0_first() {
        let mut sevs = vec![Severity::P3, Severity::P0, Severity::P2, Severity::P1];
        sevs.sort();
        assert_eq!(sevs, Severity::all());
    }

    #[test]
    fn only_p0_and_p1_block() {
        assert!(Severity::P0.is_blocking());
        assert!(Severity::P1.is_blocking());
        assert!(!Severity::P2.is_blocking());
        assert!(!Severity::P3.is_blocking());
    }

    #[test]
    fn checker_serializes_as_component_name() {
        let json = serde_json::to_string(&Checker::StructuralValidator).unwrap();
        assert_eq!(json, "\"StructuralValidator\"");
    }
}
