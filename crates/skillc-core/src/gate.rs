use crate::finding::Finding;
use crate::types::{Checker, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// SeverityCounts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub p0: usize,
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::P0 => self.p0 += 1,
            Severity::P1 => self.p1 += 1,
            Severity::P2 => self.p2 += 1,
            Severity::P3 => self.p3 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.p0 + self.p1 + self.p2 + self.p3
    }
}

// ---------------------------------------------------------------------------
// GateResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResult {
    pub pass: bool,
    /// Every P0 and P1 finding, in checker order.
    pub blocking_findings: Vec<Finding>,
    pub counts: SeverityCounts,
}

/// Release decision over every checker's findings: pass iff nothing is P0 or
/// P1. An empty map passes.
pub fn evaluate(findings: &BTreeMap<Checker, Vec<Finding>>) -> GateResult {
    let mut counts = SeverityCounts::default();
    let mut blocking_findings = Vec::new();
    for finding in findings.values().flatten() {
        counts.add(finding.severity);
        if finding.severity.is_blocking() {
            blocking_findings.push(finding.clone());
        }
    }
    GateResult {
        pass: blocking_findings.is_empty(),
        blocking_findings,
        counts,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
