/// Incremental fenced-block parser for streaming model responses.
///
/// Converts an unbounded chunk sequence into [`CodeBlock`] and
/// plain-text events, tolerant of chunk boundaries splitting lines or
/// fences. One parser instance owns its state; `process` calls must be
/// serialized in arrival order.
pub mod metadata;

use tracing::debug;

use crate::diagnostics::Diagnostic;
use crate::model::{CodeBlock, LineRange};
use metadata::{BlockMetadata, MetadataResolver};

/// Synchronous event emitted while consuming chunks, in production order.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserEvent {
    /// A complete plain-text line outside any block.
    Text(String),
    /// A fenced block was finalized.
    BlockCompleted(CodeBlock),
}

/// Read-only snapshot of the parser's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserState {
    pub in_block: bool,
    pub current_language: Option<String>,
    pub current_path: Option<String>,
    pub pending_lines: usize,
    pub chars_consumed: usize,
    pub blocks_completed: usize,
}

/// Streaming state machine over triple-backtick fences.
///
/// Single-level fence tracking only; nested or escaped fences are not
/// part of the observed protocol.
pub struct TextBlockParser {
    resolver: MetadataResolver,
    /// Raw tail of the stream not yet terminated by a newline.
    buffer: String,
    in_block: bool,
    current_meta: Option<BlockMetadata>,
    current_range: Option<LineRange>,
    current_lines: Vec<String>,
    chars_consumed: usize,
    blocks: Vec<CodeBlock>,
    diagnostics: Vec<Diagnostic>,
}

impl Default for TextBlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBlockParser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            resolver: MetadataResolver::new(),
            buffer: String::new(),
            in_block: false,
            current_meta: None,
            current_range: None,
            current_lines: Vec::new(),
            chars_consumed: 0,
            blocks: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Feed one chunk. Extracts every newline-terminated line, leaves
    /// incomplete trailing content buffered, and returns the events the
    /// chunk produced.
    pub fn process(&mut self, chunk: &str) -> Vec<ParserEvent> {
        self.chars_consumed += chunk.chars().count();
        self.buffer.push_str(chunk);

        let mut events = Vec::new();
        while let Some(idx) = self.buffer.find('\n') {
            let line: String = self.buffer[..idx].trim_end_matches('\r').to_string();
            self.buffer.drain(..=idx);
            self.classify_line(&line, &mut events);
        }
        events
    }

    /// Flush any buffered partial line and force-finalize an open block.
    ///
    /// Truncated model output is common; a block left open at stream end
    /// is emitted rather than silently discarded.
    pub fn complete(&mut self) -> Vec<ParserEvent> {
        let mut events = Vec::new();

        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let line = line.trim_end_matches('\r').to_string();
            self.classify_line(&line, &mut events);
        }

        if self.in_block {
            self.diagnostics.push(Diagnostic::parse_anomaly(
                "unterminated code block at stream end; force-finalized",
            ));
            self.finalize_block(&mut events);
        }
        events
    }

    /// All blocks completed so far.
    #[must_use]
    pub fn complete_blocks(&self) -> &[CodeBlock] {
        &self.blocks
    }

    /// Current progress snapshot.
    #[must_use]
    pub fn state(&self) -> ParserState {
        ParserState {
            in_block: self.in_block,
            current_language: self
                .current_meta
                .as_ref()
                .map(|m| m.language.clone()),
            current_path: self
                .current_meta
                .as_ref()
                .and_then(|m| m.file_path.clone()),
            pending_lines: self.current_lines.len(),
            chars_consumed: self.chars_consumed,
            blocks_completed: self.blocks.len(),
        }
    }

    /// Drain diagnostics accumulated since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Reinitialize for reuse across turns.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_block = false;
        self.current_meta = None;
        self.current_range = None;
        self.current_lines.clear();
        self.chars_consumed = 0;
        self.blocks.clear();
        self.diagnostics.clear();
    }

    // ── Line classification ──────────────────────────────────────────

    fn classify_line(&mut self, line: &str, events: &mut Vec<ParserEvent>) {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            if self.in_block {
                self.finalize_block(events);
            } else {
                self.open_block(trimmed);
            }
            return;
        }

        if self.in_block {
            self.current_lines.push(line.to_string());
        } else {
            events.push(ParserEvent::Text(line.to_string()));
        }
    }

    fn open_block(&mut self, fence_line: &str) {
        let header = fence_line.trim_start_matches('`');
        let mut meta = self.resolver.parse_metadata(header);

        // A path token may carry a trailing line range: src/a.ts:10-20
        self.current_range = None;
        if let Some(path) = meta.file_path.take() {
            let (path, range) = split_line_range(&path);
            meta.file_path = Some(path);
            self.current_range = range;
        }

        debug!(
            language = %meta.language,
            path = meta.file_path.as_deref().unwrap_or("<none>"),
            "opened code block"
        );
        self.current_meta = Some(meta);
        self.in_block = true;
    }

    fn finalize_block(&mut self, events: &mut Vec<ParserEvent>) {
        let meta = self.current_meta.take().unwrap_or_else(|| BlockMetadata {
            language: metadata::DEFAULT_LANGUAGE.to_string(),
            ..BlockMetadata::default()
        });
        let code = std::mem::take(&mut self.current_lines).join("\n");

        // A recognizable verb in the content wins over the header hint.
        let operation_hint = self
            .resolver
            .operation_from_content(&code)
            .or(meta.operation_hint);

        let block = CodeBlock {
            language: meta.language,
            code,
            file_path: meta.file_path,
            operation_hint,
            line_range: self.current_range.take(),
            description: meta.description,
        };

        debug!(
            path = block.file_path.as_deref().unwrap_or("<none>"),
            bytes = block.code.len(),
            "completed code block"
        );
        self.blocks.push(block.clone());
        self.in_block = false;
        events.push(ParserEvent::BlockCompleted(block));
    }
}

/// Split a `path:START-END` suffix into the bare path and a line range.
fn split_line_range(path: &str) -> (String, Option<LineRange>) {
    if let Some((head, tail)) = path.rsplit_once(':') {
        if let Some((a, b)) = tail.split_once('-') {
            if let (Ok(start), Ok(end)) = (a.parse::<usize>(), b.parse::<usize>()) {
                if start >= 1 && end >= start {
                    return (head.to_string(), Some(LineRange { start, end }));
                }
            }
        }
    }
    (path.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OperationKind;

    fn blocks_of(events: &[ParserEvent]) -> Vec<CodeBlock> {
        events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::BlockCompleted(b) => Some(b.clone()),
                ParserEvent::Text(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_single_chunk_block() {
        let mut parser = TextBlockParser::new();
        let mut events = parser.process("```ts src/a.ts\nexport const x = 1;\n```\n");
        events.extend(parser.complete());

        let blocks = blocks_of(&events);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].language, "typescript");
        assert_eq!(blocks[0].file_path.as_deref(), Some("src/a.ts"));
        assert_eq!(blocks[0].code, "export const x = 1;");
    }

    #[test]
    fn test_fence_split_across_chunks() {
        // Scenario: the closing fence arrives without a trailing newline.
        let mut parser = TextBlockParser::new();
        parser.process("```ts\nfoo");
        parser.process("()\n```");
        parser.complete();

        let blocks = parser.complete_blocks();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "foo()");
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let full = "Intro text.\n```rust src/lib.rs\nfn a() {}\n\nfn b() {}\n```\nOutro.\n";

        let mut whole = TextBlockParser::new();
        whole.process(full);
        whole.complete();

        // Feed the same response one character at a time.
        let mut tiny = TextBlockParser::new();
        for ch in full.chars() {
            tiny.process(&ch.to_string());
        }
        tiny.complete();

        assert_eq!(whole.complete_blocks(), tiny.complete_blocks());
    }

    #[test]
    fn test_text_events_outside_blocks() {
        let mut parser = TextBlockParser::new();
        let events = parser.process("hello\n```js\ncode\n```\nbye\n");
        let texts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Text(t) => Some(t.as_str()),
                ParserEvent::BlockCompleted(_) => None,
            })
            .collect();
        assert_eq!(texts, vec!["hello", "bye"]);
    }

    #[test]
    fn test_unterminated_block_force_finalized() {
        let mut parser = TextBlockParser::new();
        parser.process("```py src/job.py\nprint('hi')\n");
        let events = parser.complete();

        let blocks = blocks_of(&events);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "print('hi')");

        let diags = parser.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unterminated"));
    }

    #[test]
    fn test_content_verb_wins_over_header_hint() {
        let mut parser = TextBlockParser::new();
        parser.process("```ts src/a.ts update\n// delete the legacy handler\n```\n");
        parser.complete();

        let blocks = parser.complete_blocks();
        assert_eq!(blocks[0].operation_hint, Some(OperationKind::Delete));
    }

    #[test]
    fn test_header_delete_hint() {
        let mut parser = TextBlockParser::new();
        parser.process("```delete src/old.ts\n```\n");
        parser.complete();

        let blocks = parser.complete_blocks();
        assert_eq!(blocks[0].operation_hint, Some(OperationKind::Delete));
        assert_eq!(blocks[0].file_path.as_deref(), Some("src/old.ts"));
        assert!(blocks[0].code.is_empty());
    }

    #[test]
    fn test_line_range_suffix() {
        let mut parser = TextBlockParser::new();
        parser.process("```ts src/a.ts:10-20\nconst y = 2;\n```\n");
        parser.complete();

        let blocks = parser.complete_blocks();
        assert_eq!(blocks[0].file_path.as_deref(), Some("src/a.ts"));
        assert_eq!(blocks[0].line_range, Some(LineRange { start: 10, end: 20 }));
    }

    #[test]
    fn test_crlf_lines() {
        let mut parser = TextBlockParser::new();
        parser.process("```ts src/a.ts\r\nlet x;\r\n```\r\n");
        parser.complete();

        let blocks = parser.complete_blocks();
        assert_eq!(blocks[0].code, "let x;");
    }

    #[test]
    fn test_state_snapshot_mid_block() {
        let mut parser = TextBlockParser::new();
        parser.process("```rust src/lib.rs\nfn a() {}\n");

        let state = parser.state();
        assert!(state.in_block);
        assert_eq!(state.current_language.as_deref(), Some("rust"));
        assert_eq!(state.current_path.as_deref(), Some("src/lib.rs"));
        assert_eq!(state.pending_lines, 1);
        assert_eq!(state.blocks_completed, 0);
    }

    #[test]
    fn test_pending_content_empty_outside_block() {
        let mut parser = TextBlockParser::new();
        parser.process("just prose, partial tail without newline");
        let state = parser.state();
        assert!(!state.in_block);
        assert_eq!(state.pending_lines, 0);
    }

    #[test]
    fn test_reset_reinitializes() {
        let mut parser = TextBlockParser::new();
        parser.process("```ts\npartial");
        parser.reset();

        let state = parser.state();
        assert!(!state.in_block);
        assert_eq!(state.chars_consumed, 0);
        assert_eq!(state.blocks_completed, 0);
        assert!(parser.complete_blocks().is_empty());
    }

    #[test]
    fn test_chars_consumed_counts_all_input() {
        let mut parser = TextBlockParser::new();
        parser.process("abc\n");
        parser.process("def");
        assert_eq!(parser.state().chars_consumed, 7);
    }
}
