/// Block metadata resolution: pure functions over fence headers and
/// free text. Nothing here touches the filesystem and nothing fails;
/// absent signals resolve to named defaults ("plaintext", unknown).
use regex::Regex;

use crate::model::OperationKind;

/// Default language assigned when a fence carries no usable tag.
pub const DEFAULT_LANGUAGE: &str = "plaintext";

/// Leading lines of a block checked for an instruction verb; a verb
/// below this is treated as code, not a directive.
pub const CONTENT_SCAN_LINES: usize = 5;

/// Extensions accepted when validating path-like tokens found in free
/// text. Header tokens are looser (dot + no spaces), by design.
const ALLOWED_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "rs", "py", "go", "java", "kt", "swift", "rb", "php",
    "c", "h", "cpp", "hpp", "cs", "json", "toml", "yaml", "yml", "md", "txt", "css", "scss",
    "html", "sql", "sh", "env", "xml", "vue", "svelte",
];

/// Fence-tag aliases normalized to full language names.
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("py", "python"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("kt", "kotlin"),
    ("yml", "yaml"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("golang", "go"),
    ("c++", "cpp"),
    ("c#", "csharp"),
    ("cs", "csharp"),
    ("md", "markdown"),
];

/// Normalize a raw fence tag to a canonical language name.
///
/// Empty input yields [`DEFAULT_LANGUAGE`].
#[must_use]
pub fn normalize_language(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    if lower.is_empty() {
        return DEFAULT_LANGUAGE.to_string();
    }
    for (alias, full) in LANGUAGE_ALIASES {
        if lower == *alias {
            return (*full).to_string();
        }
    }
    lower
}

/// Whether a whitespace-free header token looks like a file path:
/// contains a dot and is not itself a bare extension or version-ish
/// number. A dot-bearing abbreviation can still slip through; that
/// ambiguity is accepted rather than guessed around.
#[must_use]
pub fn looks_like_path(token: &str) -> bool {
    if token.contains(char::is_whitespace) {
        return false;
    }
    let Some(dot) = token.rfind('.') else {
        return false;
    };
    // ".env", "a.b": need something on at least one side of the dot
    if token.len() < 3 {
        return false;
    }
    let ext = &token[dot + 1..];
    if ext.is_empty() || ext.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    true
}

/// Resolved header metadata for one fenced block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockMetadata {
    pub language: String,
    pub file_path: Option<String>,
    pub operation_hint: Option<OperationKind>,
    pub description: Option<String>,
}

/// A natural-language file instruction found in free text
/// ("delete src/old.ts", "create a new file utils/date.ts").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileInstruction {
    pub kind: OperationKind,
    pub target_path: String,
}

/// Stateless resolver owning its compiled regexes.
///
/// Construct once per pipeline; every method is a pure function of its
/// arguments.
pub struct MetadataResolver {
    free_path_re: Regex,
    backtick_re: Regex,
    instruction_re: Regex,
    create_content_re: Regex,
    update_content_re: Regex,
    delete_content_re: Regex,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            free_path_re: Regex::new(r"[A-Za-z0-9_@-][A-Za-z0-9_./@-]*\.[A-Za-z0-9]+")
                .expect("static regex"),
            backtick_re: Regex::new(r"`([^`\n]+)`").expect("static regex"),
            instruction_re: Regex::new(
                r"(?i)\b(create|add|update|modify|change|delete|remove|rename|move|append)\b",
            )
            .expect("static regex"),
            create_content_re: Regex::new(r"(?i)\bcreate\s+(a\s+)?new\s+file\b")
                .expect("static regex"),
            update_content_re: Regex::new(r"(?i)\b(update|modify|change)\b").expect("static regex"),
            delete_content_re: Regex::new(r"(?i)\b(delete|remove)\b").expect("static regex"),
        }
    }

    /// Resolve a fence header (the text after the opening backticks)
    /// into language, target path, operation hint, and leftover
    /// description. Never fails; missing signals yield defaults.
    ///
    /// Token rules, in order per token:
    /// - an operation keyword becomes the hint,
    /// - a dot-bearing space-free token becomes the path (first wins),
    /// - the first remaining token is the language tag,
    /// - everything else joins the description.
    #[must_use]
    pub fn parse_metadata(&self, header: &str) -> BlockMetadata {
        let mut meta = BlockMetadata {
            language: DEFAULT_LANGUAGE.to_string(),
            ..BlockMetadata::default()
        };

        let mut language_seen = false;
        let mut leftovers: Vec<&str> = Vec::new();

        for token in header.split_whitespace() {
            let trimmed = token.trim_matches(|c| matches!(c, '(' | ')' | ',' | ':' | '`'));
            if trimmed.is_empty() {
                continue;
            }
            if let Some(kind) = operation_keyword(trimmed) {
                if meta.operation_hint.is_none() {
                    meta.operation_hint = Some(kind);
                }
                continue;
            }
            if meta.file_path.is_none() && looks_like_path(trimmed) && language_seen {
                meta.file_path = Some(trimmed.to_string());
                continue;
            }
            if !language_seen {
                // The very first plain token is the language tag, unless
                // it reads as a path, in which case the language is absent.
                if looks_like_path(trimmed) && meta.file_path.is_none() {
                    meta.file_path = Some(trimmed.to_string());
                } else {
                    meta.language = normalize_language(trimmed);
                }
                language_seen = true;
                continue;
            }
            leftovers.push(trimmed);
        }

        if !leftovers.is_empty() {
            meta.description = Some(leftovers.join(" "));
        }
        meta
    }

    /// Scan free text (prose and backtick spans) for path-like tokens,
    /// validated against the extension allow-list. Order-preserving,
    /// deduplicated.
    #[must_use]
    pub fn extract_file_paths(&self, text: &str) -> Vec<String> {
        let mut found = Vec::new();

        let mut push = |candidate: &str| {
            let candidate = candidate.trim_matches(|c| matches!(c, '.' | ',' | ';' | ')' | '('));
            if !has_allowed_extension(candidate) {
                return;
            }
            if !found.iter().any(|p: &String| p == candidate) {
                found.push(candidate.to_string());
            }
        };

        for caps in self.backtick_re.captures_iter(text) {
            let span = &caps[1];
            if !span.contains(char::is_whitespace) && span.contains('.') {
                push(span);
            }
        }
        for m in self.free_path_re.find_iter(text) {
            push(m.as_str());
        }
        found
    }

    /// Scan natural-language lines for verb+path instructions, deduped
    /// by `(kind, target)`.
    #[must_use]
    pub fn extract_file_instructions(&self, text: &str) -> Vec<FileInstruction> {
        let mut instructions: Vec<FileInstruction> = Vec::new();

        for line in text.lines() {
            let Some(verb) = self.instruction_re.find(line) else {
                continue;
            };
            let Some(kind) = operation_keyword(verb.as_str()) else {
                continue;
            };
            for path in self.extract_file_paths(line) {
                let inst = FileInstruction {
                    kind,
                    target_path: path,
                };
                if !instructions.contains(&inst) {
                    instructions.push(inst);
                }
            }
        }
        instructions
    }

    /// Infer an operation from block content, used at block
    /// finalization where a content verb wins over the header hint.
    ///
    /// Only the first [`CONTENT_SCAN_LINES`] lines are scanned:
    /// instruction comments sit at the top of a block, and a verb
    /// deeper in the content is far more likely to be code than a
    /// directive. A marker past the scanned head loses to the header
    /// hint.
    #[must_use]
    pub fn operation_from_content(&self, content: &str) -> Option<OperationKind> {
        let head: String = content
            .lines()
            .take(CONTENT_SCAN_LINES)
            .collect::<Vec<_>>()
            .join("\n");
        if self.create_content_re.is_match(&head) {
            return Some(OperationKind::Create);
        }
        if self.delete_content_re.is_match(&head) {
            return Some(OperationKind::Delete);
        }
        if self.update_content_re.is_match(&head) {
            return Some(OperationKind::Update);
        }
        None
    }
}

/// Map an instruction verb to an operation kind.
#[must_use]
fn operation_keyword(token: &str) -> Option<OperationKind> {
    match token.to_lowercase().as_str() {
        "create" | "add" | "new" => Some(OperationKind::Create),
        "update" | "modify" | "change" | "edit" => Some(OperationKind::Update),
        "delete" | "remove" => Some(OperationKind::Delete),
        "move" | "rename" => Some(OperationKind::Move),
        "append" => Some(OperationKind::Append),
        _ => None,
    }
}

/// Whether a candidate path ends in an allow-listed extension.
#[must_use]
fn has_allowed_extension(candidate: &str) -> bool {
    let Some(dot) = candidate.rfind('.') else {
        return false;
    };
    let ext = candidate[dot + 1..].to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata_language_and_path() {
        let r = MetadataResolver::new();
        let meta = r.parse_metadata("ts src/a.ts");
        assert_eq!(meta.language, "typescript");
        assert_eq!(meta.file_path.as_deref(), Some("src/a.ts"));
        assert_eq!(meta.operation_hint, None);
    }

    #[test]
    fn test_parse_metadata_empty_header() {
        let r = MetadataResolver::new();
        let meta = r.parse_metadata("");
        assert_eq!(meta.language, "plaintext");
        assert!(meta.file_path.is_none());
        assert!(meta.operation_hint.is_none());
    }

    #[test]
    fn test_parse_metadata_idempotent() {
        let r = MetadataResolver::new();
        let a = r.parse_metadata("rust src/main.rs update");
        let b = r.parse_metadata("rust src/main.rs update");
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_metadata_delete_keyword() {
        let r = MetadataResolver::new();
        let meta = r.parse_metadata("delete src/old.ts");
        assert_eq!(meta.operation_hint, Some(OperationKind::Delete));
        assert_eq!(meta.file_path.as_deref(), Some("src/old.ts"));
        assert_eq!(meta.language, "plaintext");
    }

    #[test]
    fn test_parse_metadata_path_first_token() {
        let r = MetadataResolver::new();
        let meta = r.parse_metadata("src/utils/date.ts");
        assert_eq!(meta.file_path.as_deref(), Some("src/utils/date.ts"));
        assert_eq!(meta.language, "plaintext");
    }

    #[test]
    fn test_parse_metadata_dot_token_ambiguity_preserved() {
        // "v1.2" style tokens with numeric extension are rejected, but a
        // dotted abbreviation is accepted as a path. Known trade-off.
        let r = MetadataResolver::new();
        let meta = r.parse_metadata("ts e.g");
        assert_eq!(meta.file_path.as_deref(), Some("e.g"));
    }

    #[test]
    fn test_normalize_language_aliases() {
        assert_eq!(normalize_language("ts"), "typescript");
        assert_eq!(normalize_language("PY"), "python");
        assert_eq!(normalize_language("rust"), "rust");
        assert_eq!(normalize_language(""), "plaintext");
    }

    #[test]
    fn test_looks_like_path() {
        assert!(looks_like_path("src/a.ts"));
        assert!(looks_like_path("package.json"));
        assert!(!looks_like_path("plain"));
        assert!(!looks_like_path("v1.2"));
        assert!(!looks_like_path("a b.ts"));
    }

    #[test]
    fn test_extract_file_paths_from_prose_and_backticks() {
        let r = MetadataResolver::new();
        let paths =
            r.extract_file_paths("Update `src/index.ts` and also touch lib/helpers.js, please.");
        assert_eq!(paths, vec!["src/index.ts", "lib/helpers.js"]);
    }

    #[test]
    fn test_extract_file_paths_rejects_unknown_extensions() {
        let r = MetadataResolver::new();
        let paths = r.extract_file_paths("see notes.xyz123 and image.exe");
        assert!(paths.is_empty());
    }

    #[test]
    fn test_extract_file_instructions_dedup() {
        let r = MetadataResolver::new();
        let text = "Delete src/old.ts.\nPlease delete src/old.ts again.\nUpdate src/app.ts.";
        let instructions = r.extract_file_instructions(text);
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].kind, OperationKind::Delete);
        assert_eq!(instructions[0].target_path, "src/old.ts");
        assert_eq!(instructions[1].kind, OperationKind::Update);
    }

    #[test]
    fn test_operation_from_content_create_new_file() {
        let r = MetadataResolver::new();
        assert_eq!(
            r.operation_from_content("// Create new file for date helpers\nexport {}"),
            Some(OperationKind::Create)
        );
        assert_eq!(
            r.operation_from_content("// modify the handler below\nfn x() {}"),
            Some(OperationKind::Update)
        );
        assert_eq!(r.operation_from_content("let total = a + b;"), None);
    }

    #[test]
    fn test_operation_from_content_ignores_verbs_past_scanned_head() {
        let r = MetadataResolver::new();
        let code = "const a = 1;\nconst b = 2;\nconst c = 3;\nconst d = 4;\nconst e = 5;\n// delete the legacy handler";
        assert_eq!(r.operation_from_content(code), None);
    }
}
