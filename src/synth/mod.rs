/// Operation synthesis: turns completed code blocks (plus any prose
/// file instructions) into a deduplicated, ordered set of
/// [`FileOperation`]s.
pub mod content;

use chrono::Utc;
use tracing::{debug, warn};

use crate::diagnostics::Diagnostic;
use crate::model::{CodeBlock, FileOperation, LineRange, OperationKind, OperationMetadata};
use crate::parser::metadata::{FileInstruction, MetadataResolver};
use content::{PathInferencer, dedent, strip_instruction_comments};

/// What one synthesis pass produced.
#[derive(Debug, Default)]
pub struct SynthesisOutcome {
    pub operations: Vec<FileOperation>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Groups blocks by target, infers operation type and content, and
/// orders the result for safe application.
///
/// Synthesizing an identical block set twice yields operations equal up
/// to id and timestamp.
pub struct OperationSynthesizer {
    resolver: MetadataResolver,
    inferencer: PathInferencer,
    instruction_prefixes: Vec<String>,
}

impl Default for OperationSynthesizer {
    fn default() -> Self {
        Self::new(
            content::DEFAULT_INSTRUCTION_PREFIXES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )
    }
}

impl OperationSynthesizer {
    #[must_use]
    pub fn new(instruction_prefixes: Vec<String>) -> Self {
        Self {
            resolver: MetadataResolver::new(),
            inferencer: PathInferencer::new(),
            instruction_prefixes,
        }
    }

    /// Synthesize a batch from completed blocks.
    ///
    /// `instructions` are verb+path directives extracted from the prose
    /// around the blocks; only content-free kinds (Delete) are honored
    /// from prose, deduped against deletes a block already produced.
    /// `known_files` feeds pathless-block inference; pass an empty slice
    /// when the workspace is unknown.
    #[must_use]
    pub fn synthesize(
        &self,
        blocks: &[CodeBlock],
        instructions: &[FileInstruction],
        known_files: &[String],
    ) -> SynthesisOutcome {
        let mut outcome = SynthesisOutcome::default();

        // 1. Group blocks by resolved target path, insertion-ordered.
        let mut groups: Vec<(String, Vec<&CodeBlock>)> = Vec::new();
        for block in blocks {
            let path = match &block.file_path {
                Some(p) => p.clone(),
                None => match self.inferencer.infer(&block.code, known_files) {
                    Some(p) => {
                        debug!(path = %p, "inferred target for pathless block");
                        p
                    }
                    None => {
                        // Dropping beats guessing a destructive target.
                        warn!("dropping pathless block with no inferable target");
                        outcome.diagnostics.push(Diagnostic::synthesis_ambiguity(
                            format!(
                                "no inferable target path for a pathless {} block; block dropped",
                                block.language
                            ),
                        ));
                        continue;
                    }
                },
            };
            match groups.iter_mut().find(|(p, _)| *p == path) {
                Some((_, list)) => list.push(block),
                None => groups.push((path, vec![block])),
            }
        }

        // 2–5. One operation per group.
        for (path, group) in &groups {
            if let Some(op) = self.synthesize_group(path, group, &mut outcome.diagnostics) {
                outcome.operations.push(op);
            }
        }

        // Prose-only deletions. A delete already synthesized from a
        // block wins; a non-delete on the same target is kept alongside
        // and surfaces as a conflict for the reviewer.
        for inst in instructions {
            if inst.kind != OperationKind::Delete {
                continue;
            }
            if outcome.operations.iter().any(|op| {
                op.target_path == inst.target_path && op.kind == OperationKind::Delete
            }) {
                continue;
            }
            outcome.operations.push(self.build_operation(
                OperationKind::Delete,
                inst.target_path.clone(),
                None,
                None,
                None,
                Some("delete requested in response text".to_string()),
                "plaintext".to_string(),
                false,
            ));
        }

        // 6. Fixed type priority, stable within a kind; ids follow the
        // final order so they read naturally in review UIs.
        outcome
            .operations
            .sort_by_key(|op| op.kind.priority());
        for (i, op) in outcome.operations.iter_mut().enumerate() {
            op.id = format!("op-{}", i + 1);
        }
        outcome
    }

    fn synthesize_group(
        &self,
        path: &str,
        group: &[&CodeBlock],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<FileOperation> {
        let primary = group.first()?;

        // Explicit hint first, then content heuristics, then Update.
        let kind = primary
            .operation_hint
            .or_else(|| self.resolver.operation_from_content(&primary.code))
            .unwrap_or(OperationKind::Update);

        // A move needs a destination; the header path is the source and
        // the destination comes from the block description.
        let (kind, target, source) = if kind == OperationKind::Move {
            let destination = primary
                .description
                .as_deref()
                .map(|d| self.resolver.extract_file_paths(d))
                .and_then(|paths| paths.into_iter().next());
            match destination {
                Some(dest) => (kind, dest, Some(path.to_string())),
                None => {
                    diagnostics.push(Diagnostic::synthesis_ambiguity(format!(
                        "move of {path} has no destination path; operation dropped"
                    )));
                    return None;
                }
            }
        } else {
            (kind, path.to_string(), None)
        };

        // 3–4. Merge and clean content; deletions carry none.
        let content = if kind == OperationKind::Delete {
            None
        } else {
            let joined = group
                .iter()
                .map(|b| strip_instruction_comments(&b.code, &self.instruction_prefixes))
                .collect::<Vec<_>>()
                .join("\n\n");
            Some(dedent(&joined))
        };

        let line_range = group.iter().find_map(|b| b.line_range);
        let description = primary
            .description
            .clone()
            .or_else(|| Some(format!("{kind} {target}")));

        Some(self.build_operation(
            kind,
            target,
            source,
            content,
            line_range,
            description,
            primary.language.clone(),
            line_range.is_some(),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_operation(
        &self,
        kind: OperationKind,
        target: String,
        source: Option<String>,
        content: Option<String>,
        line_range: Option<LineRange>,
        description: Option<String>,
        language: String,
        partial_update: bool,
    ) -> FileOperation {
        let mut affected = vec![target.clone()];
        if let Some(src) = &source {
            affected.push(src.clone());
        }
        FileOperation {
            // Reassigned once the batch order is final.
            id: String::new(),
            kind,
            target_path: target,
            source_path: source,
            content,
            line_range,
            metadata: OperationMetadata {
                description,
                language,
                created_at: Utc::now(),
                affected_files: affected,
                partial_update,
            },
            risk: None,
            validation: None,
        }
    }
}
