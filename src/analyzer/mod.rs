/// Safety analysis: attaches risk and impact to each synthesized
/// operation and detects cross-operation conflicts.
///
/// The analyzer never applies anything; it only annotates. Operations
/// leave with `risk` and `validation` filled in and every other field
/// untouched.
pub mod conflict;
pub mod impact;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::warn;

use crate::diagnostics::Diagnostic;
use crate::model::{
    Conflict, FileOperation, Impact, ImpactKind, OperationKind, RiskLevel, ValidationReport,
};
use crate::oracle::WorkspaceOracle;
use impact::ImpactDetector;

/// Default critical-file globs: manifests, type configs, env files.
/// Paths containing "config", "security", or "auth" are always
/// critical, independent of this list.
pub const DEFAULT_CRITICAL_GLOBS: &[&str] = &[
    "package.json",
    "package-lock.json",
    "tsconfig.json",
    "Cargo.toml",
    "Cargo.lock",
    "go.mod",
    "pyproject.toml",
    ".env",
    ".env.*",
];

/// Matches targets whose mutation always warrants human review.
pub struct CriticalFileMatcher {
    set: GlobSet,
}

impl Default for CriticalFileMatcher {
    fn default() -> Self {
        let patterns: Vec<String> = DEFAULT_CRITICAL_GLOBS
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        Self::from_patterns(&patterns).expect("default globs are valid")
    }
}

impl CriticalFileMatcher {
    pub fn from_patterns(patterns: &[String]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
            // Also match the bare name at any depth.
            if !pattern.contains('/') {
                builder.add(Glob::new(&format!("**/{pattern}"))?);
            }
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    #[must_use]
    pub fn is_critical(&self, path: &str) -> bool {
        if self.set.is_match(path) {
            return true;
        }
        let lower = path.to_lowercase();
        lower.contains("config") || lower.contains("security") || lower.contains("auth")
    }
}

/// Everything the analyzer hands back for one batch.
#[derive(Debug, Default)]
pub struct AnalysisOutcome {
    /// Input operations with `risk` and `validation` attached, order
    /// preserved.
    pub operations: Vec<FileOperation>,
    pub conflicts: Vec<Conflict>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Risk policy plus impact and conflict detection over one batch.
pub struct SafetyAnalyzer {
    detector: ImpactDetector,
    critical: CriticalFileMatcher,
    breaking_re: Regex,
}

impl Default for SafetyAnalyzer {
    fn default() -> Self {
        Self::new(CriticalFileMatcher::default())
    }
}

impl SafetyAnalyzer {
    #[must_use]
    pub fn new(critical: CriticalFileMatcher) -> Self {
        Self {
            detector: ImpactDetector::new(),
            critical,
            breaking_re: Regex::new(r"(?i)breaking[ _-]change|@deprecated|\bDEPRECATED\b")
                .expect("static regex"),
        }
    }

    /// Annotate every operation and scan the batch for conflicts.
    ///
    /// Oracle failures never abort the batch: the affected operation is
    /// escalated to at least Medium risk with an explanatory impact.
    pub async fn analyze(
        &self,
        operations: Vec<FileOperation>,
        oracle: &dyn WorkspaceOracle,
    ) -> AnalysisOutcome {
        let mut outcome = AnalysisOutcome::default();

        for mut op in operations {
            let (impacts, inconclusive) =
                match self.detector.detect(&op, oracle, &self.critical).await {
                    Ok(impacts) => (impacts, false),
                    Err(e) => {
                        warn!(operation = %op.id, error = %e, "oracle lookup failed");
                        outcome
                            .diagnostics
                            .push(Diagnostic::analysis_failure(e.to_string(), op.id.clone()));
                        let impact = Impact {
                            kind: ImpactKind::Inconclusive,
                            severity: RiskLevel::Medium,
                            description: format!(
                                "workspace oracle failed for {}; assessment is incomplete",
                                op.target_path
                            ),
                            affected_files: vec![op.target_path.clone()],
                        };
                        (vec![impact], true)
                    }
                };

            let mut risk = self.assess_risk(&op, &impacts);
            if inconclusive {
                // Missing data must never read as safe.
                risk = risk.max(RiskLevel::Medium);
            }

            let requires_review = risk != RiskLevel::Low
                || impacts.iter().any(|i| i.severity == RiskLevel::High);

            op.risk = Some(risk);
            op.validation = Some(ValidationReport {
                requires_review,
                impacts,
            });
            outcome.operations.push(op);
        }

        outcome.conflicts = conflict::detect_conflicts(&outcome.operations);
        outcome
    }

    /// The fixed risk policy; first match wins.
    fn assess_risk(&self, op: &FileOperation, impacts: &[Impact]) -> RiskLevel {
        // 1. Deletions are always High.
        if op.kind == OperationKind::Delete {
            return RiskLevel::High;
        }
        // 2. Critical targets.
        if self.critical.is_critical(&op.target_path) {
            return RiskLevel::High;
        }
        // 3. Any High-severity impact.
        if impacts.iter().any(|i| i.severity == RiskLevel::High) {
            return RiskLevel::High;
        }
        // 4. Multiple Medium-severity impacts.
        if impacts
            .iter()
            .filter(|i| i.severity == RiskLevel::Medium)
            .count()
            > 1
        {
            return RiskLevel::Medium;
        }
        // 5. Breaking-change heuristics in content.
        if op
            .content
            .as_deref()
            .is_some_and(|c| self.breaking_re.is_match(c))
        {
            return RiskLevel::Medium;
        }
        RiskLevel::Low
    }
}
