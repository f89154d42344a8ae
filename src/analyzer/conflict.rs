/// Pairwise cross-operation conflict detection.
///
/// Best-effort: detects same-target collisions and move-vs-delete
/// races. Circular-dependency detection is a declared extension point
/// ([`ConflictKind::Circular`]) that is not currently produced, so the
/// result must not be presented as exhaustive.
use crate::model::{Conflict, ConflictKind, FileOperation, OperationKind};

/// Scan a finalized batch for conflicting operation pairs.
#[must_use]
pub fn detect_conflicts(operations: &[FileOperation]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    for (i, a) in operations.iter().enumerate() {
        for b in &operations[i + 1..] {
            if a.target_path == b.target_path {
                conflicts.push(Conflict {
                    kind: ConflictKind::File,
                    operation_ids: vec![a.id.clone(), b.id.clone()],
                    description: format!(
                        "operations {} and {} both target {}",
                        a.id, b.id, a.target_path
                    ),
                    resolution: Some("merge the changes or apply sequentially".to_string()),
                });
            }

            if let Some(conflict) = move_delete_conflict(a, b) {
                conflicts.push(conflict);
            }
        }
    }
    conflicts
}

/// A move whose source a delete also targets: applying both loses the
/// file either way, so the move should be dropped.
fn move_delete_conflict(a: &FileOperation, b: &FileOperation) -> Option<Conflict> {
    let (mv, del) = match (a.kind, b.kind) {
        (OperationKind::Move, OperationKind::Delete) => (a, b),
        (OperationKind::Delete, OperationKind::Move) => (b, a),
        _ => return None,
    };
    if mv.source_path.as_deref() != Some(del.target_path.as_str()) {
        return None;
    }
    Some(Conflict {
        kind: ConflictKind::MoveDelete,
        operation_ids: vec![mv.id.clone(), del.id.clone()],
        description: format!(
            "move {} reads {} which delete {} removes",
            mv.id, del.target_path, del.id
        ),
        resolution: Some(format!("drop the move ({})", mv.id)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationMetadata;
    use chrono::Utc;

    fn op(id: &str, kind: OperationKind, target: &str, source: Option<&str>) -> FileOperation {
        FileOperation {
            id: id.to_string(),
            kind,
            target_path: target.to_string(),
            source_path: source.map(str::to_string),
            content: None,
            line_range: None,
            metadata: OperationMetadata {
                description: None,
                language: "plaintext".to_string(),
                created_at: Utc::now(),
                affected_files: vec![target.to_string()],
                partial_update: false,
            },
            risk: None,
            validation: None,
        }
    }

    #[test]
    fn test_same_target_conflict() {
        let ops = vec![
            op("op-1", OperationKind::Update, "package.json", None),
            op("op-2", OperationKind::Update, "package.json", None),
        ];
        let conflicts = detect_conflicts(&ops);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::File);
        assert_eq!(conflicts[0].operation_ids, vec!["op-1", "op-2"]);
    }

    #[test]
    fn test_move_delete_conflict() {
        let ops = vec![
            op("op-1", OperationKind::Move, "src/new.ts", Some("src/old.ts")),
            op("op-2", OperationKind::Delete, "src/old.ts", None),
        ];
        let conflicts = detect_conflicts(&ops);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::MoveDelete);
        assert_eq!(
            conflicts[0].resolution.as_deref(),
            Some("drop the move (op-1)")
        );
    }

    #[test]
    fn test_disjoint_targets_no_conflict() {
        let ops = vec![
            op("op-1", OperationKind::Create, "src/a.ts", None),
            op("op-2", OperationKind::Update, "src/b.ts", None),
        ];
        assert!(detect_conflicts(&ops).is_empty());
    }
}
