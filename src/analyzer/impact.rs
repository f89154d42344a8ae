/// Impact detection: what applying one operation would do to the rest
/// of the workspace, assessed through the read-only oracles.
///
/// Heuristic pattern matching only, no AST. False positives and
/// negatives are an accepted trade-off.
use regex::Regex;

use crate::model::{FileOperation, Impact, ImpactKind, OperationKind, RiskLevel};
use crate::oracle::{OracleError, WorkspaceOracle};

use super::CriticalFileMatcher;

/// Number of TODO/FIXME markers above which content earns a style impact.
const TODO_THRESHOLD: usize = 3;

pub struct ImpactDetector {
    export_re: Regex,
    untyped_re: Regex,
    todo_re: Regex,
}

impl Default for ImpactDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ImpactDetector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            export_re: Regex::new(
                r"(?m)^\s*(?:export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|interface|type|enum)|pub\s+(?:fn|struct|enum|trait))\b",
            )
            .expect("static regex"),
            untyped_re: Regex::new(r":\s*any\b|\bas\s+any\b|@ts-ignore|@ts-nocheck")
                .expect("static regex"),
            todo_re: Regex::new(r"(?i)\b(?:TODO|FIXME|HACK)\b").expect("static regex"),
        }
    }

    /// Detect impacts for one operation. Oracle failures propagate so
    /// the analyzer can escalate instead of defaulting to Low.
    pub async fn detect(
        &self,
        op: &FileOperation,
        oracle: &dyn WorkspaceOracle,
        critical: &CriticalFileMatcher,
    ) -> Result<Vec<Impact>, OracleError> {
        let mut impacts = Vec::new();

        match op.kind {
            OperationKind::Create => {
                if oracle.path_exists(&op.target_path).await? {
                    impacts.push(Impact {
                        kind: ImpactKind::Overwrite,
                        severity: RiskLevel::High,
                        description: format!(
                            "{} already exists and will be overwritten",
                            op.target_path
                        ),
                        affected_files: vec![op.target_path.clone()],
                    });
                }
                let similar = oracle.similar_files(&op.target_path).await?;
                if !similar.is_empty() {
                    impacts.push(Impact {
                        kind: ImpactKind::NamingCollision,
                        severity: RiskLevel::Medium,
                        description: format!(
                            "similarly named files exist next to {}",
                            op.target_path
                        ),
                        affected_files: similar,
                    });
                }
            }

            OperationKind::Update | OperationKind::Append => {
                if !oracle.path_exists(&op.target_path).await? {
                    impacts.push(Impact {
                        kind: ImpactKind::MissingTarget,
                        severity: RiskLevel::High,
                        description: format!(
                            "{} does not exist but is targeted by an {}",
                            op.target_path, op.kind
                        ),
                        affected_files: vec![op.target_path.clone()],
                    });
                }

                let exports_changed = op
                    .content
                    .as_deref()
                    .is_some_and(|c| self.export_re.is_match(c));
                if exports_changed {
                    let dependents = oracle.find_dependents(&op.target_path).await?;
                    if !dependents.is_empty() {
                        impacts.push(Impact {
                            kind: ImpactKind::ApiChange,
                            severity: RiskLevel::High,
                            description: format!(
                                "exported symbols of {} change; {} file(s) reference it",
                                op.target_path,
                                dependents.len()
                            ),
                            affected_files: dependents,
                        });
                    }
                }

                let tests = self.related_test_files(&op.target_path, oracle).await?;
                if !tests.is_empty() {
                    impacts.push(Impact {
                        kind: ImpactKind::RelatedTests,
                        severity: RiskLevel::Medium,
                        description: format!("test files cover {}", op.target_path),
                        affected_files: tests,
                    });
                }
            }

            OperationKind::Delete => {
                let dependents = oracle.find_dependents(&op.target_path).await?;
                if !dependents.is_empty() {
                    impacts.push(Impact {
                        kind: ImpactKind::DependentsBroken,
                        severity: RiskLevel::High,
                        description: format!(
                            "{} file(s) import {} and would break",
                            dependents.len(),
                            op.target_path
                        ),
                        affected_files: dependents,
                    });
                }
                if critical.is_critical(&op.target_path) {
                    impacts.push(Impact {
                        kind: ImpactKind::CriticalFile,
                        severity: RiskLevel::High,
                        description: format!("{} is on the critical-file list", op.target_path),
                        affected_files: vec![op.target_path.clone()],
                    });
                }
            }

            OperationKind::Move => {
                if let Some(source) = &op.source_path {
                    let dependents = oracle.find_dependents(source).await?;
                    if !dependents.is_empty() {
                        impacts.push(Impact {
                            kind: ImpactKind::ImportPathUpdate,
                            severity: RiskLevel::Medium,
                            description: format!(
                                "{} file(s) import {source} and need updated import paths",
                                dependents.len()
                            ),
                            affected_files: dependents,
                        });
                    }
                }
            }
        }

        if let Some(style) = self.style_impact(op) {
            impacts.push(style);
        }
        Ok(impacts)
    }

    /// Untyped escape hatches or a pile of TODO markers: informational.
    fn style_impact(&self, op: &FileOperation) -> Option<Impact> {
        let content = op.content.as_deref()?;
        let untyped = self.untyped_re.is_match(content);
        let todos = self.todo_re.find_iter(content).count();
        if !untyped && todos <= TODO_THRESHOLD {
            return None;
        }

        let mut notes = Vec::new();
        if untyped {
            notes.push("untyped escape hatches".to_string());
        }
        if todos > TODO_THRESHOLD {
            notes.push(format!("{todos} TODO-style markers"));
        }
        Some(Impact {
            kind: ImpactKind::Style,
            severity: RiskLevel::Low,
            description: format!("content of {} has {}", op.target_path, notes.join(" and ")),
            affected_files: vec![op.target_path.clone()],
        })
    }

    /// Probe conventional test-file locations for the target.
    async fn related_test_files(
        &self,
        target: &str,
        oracle: &dyn WorkspaceOracle,
    ) -> Result<Vec<String>, OracleError> {
        let path = std::path::Path::new(target);
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|s| s.to_str()),
        ) else {
            return Ok(Vec::new());
        };
        let dir = path
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .filter(|p| !p.is_empty());
        let prefix = dir.map(|d| format!("{d}/")).unwrap_or_default();

        let candidates = [
            format!("{prefix}{stem}.test.{ext}"),
            format!("{prefix}{stem}.spec.{ext}"),
            format!("{prefix}{stem}_test.{ext}"),
            format!("{prefix}__tests__/{stem}.{ext}"),
            format!("tests/{stem}.{ext}"),
        ];

        let mut found = Vec::new();
        for candidate in candidates {
            if oracle.path_exists(&candidate).await? {
                found.push(candidate);
            }
        }
        Ok(found)
    }
}
