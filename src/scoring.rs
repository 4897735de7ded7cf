use serde::{Deserialize, Serialize};

use crate::scanner::GapReport;

/// Boolean inputs to the scorer. The gap scanner fills four of them; the
/// remaining signals default to "not detected" until a deeper analysis
/// produces them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Signals {
    pub dockerfile: bool,
    pub port_exposure: bool,
    pub ci_workflow: bool,
    pub ci_test_step: bool,
    pub readme: bool,
    pub tests: bool,
}

impl From<GapReport> for Signals {
    fn from(gaps: GapReport) -> Self {
        Self {
            dockerfile: gaps.dockerfile,
            ci_workflow: gaps.ci,
            readme: gaps.readme,
            tests: gaps.tests,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub weight: u32,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryScore {
    pub max: u32,
    pub score: u32,
    pub checks: Vec<CheckResult>,
}

/// Weighted 0–100 maturity aggregate with a fixed per-category breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaturityReport {
    pub total_score: u32,
    pub max_score: u32,
    pub infrastructure: CategoryScore,
    pub cicd: CategoryScore,
    pub documentation: CategoryScore,
    pub quality: CategoryScore,
}

/// Downstream bucketing of a total score. Not part of the scorer itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaturityLevel {
    Healthy,
    NeedsImprovement,
    Critical,
}

impl MaturityLevel {
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            Self::Healthy
        } else if score >= 50 {
            Self::NeedsImprovement
        } else {
            Self::Critical
        }
    }
}

fn category(checks: Vec<(&str, u32, bool)>) -> CategoryScore {
    let max = checks.iter().map(|(_, weight, _)| *weight).sum();
    let checks: Vec<CheckResult> = checks
        .into_iter()
        .map(|(name, weight, passed)| CheckResult {
            name: name.to_owned(),
            weight,
            passed,
        })
        .collect();
    // A check contributes its full weight iff its input is strictly true.
    // Partial credit is not supported.
    let score = checks
        .iter()
        .filter(|c| c.passed)
        .map(|c| c.weight)
        .sum();
    CategoryScore { max, score, checks }
}

/// Pure transformation from detected signals to a maturity report.
/// Weights are fixed: infrastructure 30, CI/CD 30, documentation 20,
/// quality 20.
pub fn score(signals: &Signals) -> MaturityReport {
    let infrastructure = category(vec![
        ("dockerfile", 20, signals.dockerfile),
        ("port-exposure", 10, signals.port_exposure),
    ]);
    let cicd = category(vec![
        ("ci-workflow", 20, signals.ci_workflow),
        ("ci-test-step", 10, signals.ci_test_step),
    ]);
    let documentation = category(vec![("readme", 20, signals.readme)]);
    let quality = category(vec![("tests", 20, signals.tests)]);

    MaturityReport {
        total_score: infrastructure.score + cicd.score + documentation.score + quality.score,
        max_score: infrastructure.max + cicd.max + documentation.max + quality.max,
        infrastructure,
        cicd,
        documentation,
        quality,
    }
}
