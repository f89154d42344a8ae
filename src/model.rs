/// Core data model shared by the parsing, synthesis, and analysis stages.
///
/// Everything here is host-consumable: the batch handed to the
/// confirmation collaborator is serialized as-is.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;

// ── Operations ───────────────────────────────────────────────────────

/// The kind of filesystem mutation an operation describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Move,
    Update,
    Append,
    Delete,
}

impl OperationKind {
    /// Fixed application priority: Create < Move < Update < Append < Delete.
    ///
    /// Batches are sorted ascending by this value so creations land
    /// before edits and deletions always come last.
    #[must_use]
    pub fn priority(self) -> u8 {
        match self {
            Self::Create => 0,
            Self::Move => 1,
            Self::Update => 2,
            Self::Append => 3,
            Self::Delete => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Move => "move",
            Self::Update => "update",
            Self::Append => "append",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Low/Medium/High classification gating human confirmation.
///
/// Ordered so `max()` escalates correctly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// An inclusive 1-based line range for partial updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

/// Descriptive metadata attached to an operation at synthesis time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub affected_files: Vec<String>,
    /// Set when the source block declared a line range; the content is a
    /// fragment, not a whole file, and must be reviewed as such.
    #[serde(default)]
    pub partial_update: bool,
}

/// One validated filesystem mutation, ready for human review.
///
/// `risk` and `validation` start empty and are attached by the
/// [`SafetyAnalyzer`](crate::analyzer::SafetyAnalyzer); every other
/// field is immutable after synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOperation {
    pub id: String,
    pub kind: OperationKind,
    pub target_path: String,
    /// Present only for `Move`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Absent for `Delete`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<LineRange>,
    pub metadata: OperationMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

// ── Code blocks ──────────────────────────────────────────────────────

/// A completed fenced code block extracted from the response stream.
///
/// Immutable once emitted by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Never empty; defaults to `"plaintext"`.
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// `None` means the block gave no usable signal ("unknown").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_hint: Option<OperationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_range: Option<LineRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ── Analysis results ─────────────────────────────────────────────────

/// What a detected impact is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactKind {
    /// Create targets an existing file.
    Overwrite,
    /// Create sits next to similarly named files.
    NamingCollision,
    /// Update targets a file that does not exist.
    MissingTarget,
    /// Exported symbol shape changes; dependents listed.
    ApiChange,
    /// Related test files exist and likely need updating.
    RelatedTests,
    /// Deleting a file other files import.
    DependentsBroken,
    /// Move requires import-path updates in dependents.
    ImportPathUpdate,
    /// Target is on the critical-file list.
    CriticalFile,
    /// Style/informational finding (untyped escapes, TODO pile-up).
    Style,
    /// An oracle call failed; the assessment is incomplete.
    Inconclusive,
}

/// A single detected consequence of applying an operation.
///
/// Derived per batch, attached transiently to the validation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub kind: ImpactKind,
    pub severity: RiskLevel,
    pub description: String,
    pub affected_files: Vec<String>,
}

/// The analyzer's verdict for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True whenever risk is above Low or any impact is High severity.
    /// The confirmation collaborator must not auto-apply while set.
    pub requires_review: bool,
    pub impacts: Vec<Impact>,
}

/// How two operations in one batch step on each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Two operations touch the same target path.
    File,
    /// A move's source is also a delete's target.
    MoveDelete,
    /// Declared extension point; not currently detected.
    Circular,
}

/// A detected cross-operation conflict, recomputed per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub operation_ids: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

// ── Batch ────────────────────────────────────────────────────────────

/// Counts a host can render as a review header without re-deriving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub requires_review: usize,
    pub high_risk: usize,
    pub conflicts: usize,
}

/// The finalized result of one model turn: ordered, risk-annotated
/// operations plus the conflicts and diagnostics gathered on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationBatch {
    pub operations: Vec<FileOperation>,
    pub conflicts: Vec<Conflict>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: BatchSummary,
}

impl OperationBatch {
    /// Build the summary from the finalized operations and conflicts.
    #[must_use]
    pub fn summarize(
        operations: Vec<FileOperation>,
        conflicts: Vec<Conflict>,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        let summary = BatchSummary {
            total: operations.len(),
            requires_review: operations
                .iter()
                .filter(|op| op.validation.as_ref().is_some_and(|v| v.requires_review))
                .count(),
            high_risk: operations
                .iter()
                .filter(|op| op.risk == Some(RiskLevel::High))
                .count(),
            conflicts: conflicts.len(),
        };
        Self {
            operations,
            conflicts,
            diagnostics,
            summary,
        }
    }
}
