/// Structured recoverable diagnostics emitted by the pipeline stages.
///
/// Nothing in this core is fatal: anomalies degrade to defaults, drop a
/// block, or escalate risk, and the host decides how to surface them.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Synthesize,
    Analyze,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse",
            Self::Synthesize => "synthesize",
            Self::Analyze => "analyze",
        })
    }
}

/// Classification of a recoverable anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Malformed fence header, unterminated block at stream end,
    /// ambiguous path inference. Degraded to defaults and continued.
    ParseAnomaly,
    /// No inferable target for a pathless block; the block was dropped
    /// rather than guessing a destructive target.
    SynthesisAmbiguity,
    /// An oracle call failed; the assessment escalated conservatively.
    AnalysisFailure,
}

/// A structured, host-loggable diagnostic. Carries the stage and the
/// operation id where one exists.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{stage}] {message}")]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
}

impl Diagnostic {
    #[must_use]
    pub fn parse_anomaly(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Parse,
            kind: DiagnosticKind::ParseAnomaly,
            message: message.into(),
            operation_id: None,
        }
    }

    #[must_use]
    pub fn synthesis_ambiguity(message: impl Into<String>) -> Self {
        Self {
            stage: Stage::Synthesize,
            kind: DiagnosticKind::SynthesisAmbiguity,
            message: message.into(),
            operation_id: None,
        }
    }

    #[must_use]
    pub fn analysis_failure(message: impl Into<String>, operation_id: impl Into<String>) -> Self {
        Self {
            stage: Stage::Analyze,
            kind: DiagnosticKind::AnalysisFailure,
            message: message.into(),
            operation_id: Some(operation_id.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_stage() {
        let d = Diagnostic::parse_anomaly("unterminated block at stream end");
        assert_eq!(d.to_string(), "[parse] unterminated block at stream end");
    }

    #[test]
    fn test_analysis_failure_carries_operation_id() {
        let d = Diagnostic::analysis_failure("oracle timed out", "op-3");
        assert_eq!(d.operation_id.as_deref(), Some("op-3"));
        assert_eq!(d.kind, DiagnosticKind::AnalysisFailure);
    }
}
