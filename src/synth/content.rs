/// Content cleaning and best-effort path inference for synthesized
/// operations.
use regex::Regex;

/// Marker prefixes treated as instruction comments when followed by a
/// colon (`// REPLACE: ...`). Overridable via config.
pub const DEFAULT_INSTRUCTION_PREFIXES: &[&str] = &[
    "REPLACE",
    "TODO",
    "FIXME",
    "INSERT",
    "EXISTING CODE",
    "REST OF FILE",
    "UNCHANGED",
];

/// Drop instruction-style comment lines the model uses to talk to the
/// reviewer rather than the compiler.
#[must_use]
pub fn strip_instruction_comments(content: &str, prefixes: &[String]) -> String {
    let kept: Vec<&str> = content
        .lines()
        .filter(|line| !is_instruction_comment(line, prefixes))
        .collect();
    kept.join("\n")
}

fn is_instruction_comment(line: &str, prefixes: &[String]) -> bool {
    let trimmed = line.trim_start();
    let body = if let Some(rest) = trimmed.strip_prefix("//") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix('#') {
        rest
    } else {
        return false;
    };
    let body = body.trim_start().to_uppercase();
    prefixes
        .iter()
        .any(|p| body.strip_prefix(&p.to_uppercase()).is_some_and(|r| r.starts_with(':')))
}

/// Remove the minimum common leading whitespace across non-blank lines.
#[must_use]
pub fn dedent(content: &str) -> String {
    let min_indent = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| *c == ' ' || *c == '\t').count())
        .min()
        .unwrap_or(0);
    if min_indent == 0 {
        return content.to_string();
    }

    let lines: Vec<String> = content
        .lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                l.chars().skip(min_indent).collect()
            }
        })
        .collect();
    lines.join("\n")
}

/// Looks for an explicit `// file: path` (or `# file:`) declaration in
/// the first lines of a block.
pub struct PathInferencer {
    file_comment_re: Regex,
    export_re: Regex,
}

impl Default for PathInferencer {
    fn default() -> Self {
        Self::new()
    }
}

impl PathInferencer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            file_comment_re: Regex::new(
                r"(?im)^\s*(?://|#|/\*|<!--)\s*(?:file(?:name)?|path)\s*:\s*(\S+)",
            )
            .expect("static regex"),
            export_re: Regex::new(
                r"(?m)^\s*(?:export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|interface|type)|pub\s+(?:fn|struct|enum|trait))\s+([A-Za-z_][A-Za-z0-9_]*)",
            )
            .expect("static regex"),
        }
    }

    /// Best-effort target inference for a pathless block: an explicit
    /// `file:` comment first, then a named export whose name plausibly
    /// matches a known workspace file. Returns `None` rather than
    /// guessing further.
    #[must_use]
    pub fn infer(&self, code: &str, known_files: &[String]) -> Option<String> {
        if let Some(caps) = self.file_comment_re.captures(code) {
            let raw = caps[1].trim_end_matches("*/").trim_end_matches("-->");
            let raw = raw.trim_matches(|c| matches!(c, '`' | '\'' | '"'));
            if !raw.is_empty() {
                return Some(raw.to_string());
            }
        }

        for caps in self.export_re.captures_iter(code) {
            let symbol = &caps[1];
            if let Some(path) = match_known_file(symbol, known_files) {
                return Some(path);
            }
        }
        None
    }
}

/// Match an exported symbol name against known file stems, tolerating
/// case and kebab/snake separators.
fn match_known_file(symbol: &str, known_files: &[String]) -> Option<String> {
    let wanted = fold_name(symbol);
    for file in known_files {
        let stem = std::path::Path::new(file)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        if fold_name(stem) == wanted {
            return Some(file.clone());
        }
    }
    None
}

fn fold_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}
