/// Pipeline coordination: drives one model turn end to end, streaming
/// or complete, and emits the finalized batch.
///
/// One pipeline instance owns one turn's state. `process_chunk` calls
/// must arrive in order; independent turns run on independent
/// instances with zero shared mutable state.
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::analyzer::{CriticalFileMatcher, SafetyAnalyzer};
use crate::config::Config;
use crate::diagnostics::Diagnostic;
use crate::model::{CodeBlock, OperationBatch};
use crate::oracle::WorkspaceOracle;
use crate::parser::metadata::MetadataResolver;
use crate::parser::{ParserEvent, TextBlockParser};
use crate::synth::OperationSynthesizer;

/// Progressive notifications for host UIs. Callbacks fire
/// synchronously, in production order, never concurrently for one
/// pipeline instance.
pub trait PipelineObserver: Send + Sync {
    fn on_text(&self, _line: &str) {}
    fn on_block_completed(&self, _block: &CodeBlock) {}
    fn on_diagnostic(&self, _diagnostic: &Diagnostic) {}
    fn on_batch_ready(&self, _batch: &OperationBatch) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The turn was aborted; partial state has been discarded and no
    /// batch may be handed to the applier.
    #[error("turn cancelled before batch hand-off")]
    Cancelled,
}

/// Coordinates parser → synthesizer → analyzer for one turn.
pub struct Pipeline {
    parser: TextBlockParser,
    resolver: MetadataResolver,
    synthesizer: OperationSynthesizer,
    analyzer: SafetyAnalyzer,
    oracle: Arc<dyn WorkspaceOracle>,
    observer: Arc<dyn PipelineObserver>,
    cancel: CancellationToken,
    prose: Vec<String>,
    diagnostics: Vec<Diagnostic>,
}

impl Pipeline {
    /// Build a pipeline for one turn against the given workspace oracle.
    pub fn new(config: &Config, oracle: Arc<dyn WorkspaceOracle>) -> anyhow::Result<Self> {
        let critical = CriticalFileMatcher::from_patterns(&config.critical_globs)?;
        Ok(Self {
            parser: TextBlockParser::new(),
            resolver: MetadataResolver::new(),
            synthesizer: OperationSynthesizer::new(config.instruction_prefixes.clone()),
            analyzer: SafetyAnalyzer::new(critical),
            oracle,
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
            prose: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    /// Attach a host observer for progressive feedback.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Token a host can use to abort the turn from elsewhere.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Feed one streamed chunk. Completed blocks and text lines are
    /// reported to the observer as they finalize.
    pub fn process_chunk(&mut self, chunk: &str) {
        if self.cancel.is_cancelled() {
            return;
        }
        let events = self.parser.process(chunk);
        self.dispatch(events);
    }

    /// Finish the turn: flush the parser, synthesize the accumulated
    /// blocks, analyze, and hand back the ordered batch.
    pub async fn complete(&mut self) -> Result<OperationBatch, PipelineError> {
        let events = self.parser.complete();
        self.dispatch(events);
        for d in self.parser.take_diagnostics() {
            self.observer.on_diagnostic(&d);
            self.diagnostics.push(d);
        }
        self.ensure_live()?;

        // Prose instructions (e.g. "delete src/old.ts") supplement the
        // fenced blocks; known files feed pathless inference.
        let prose = self.prose.join("\n");
        let instructions = self.resolver.extract_file_instructions(&prose);
        let known_files = match self.oracle.list_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "workspace listing unavailable; pathless inference degraded");
                Vec::new()
            }
        };

        let synthesis =
            self.synthesizer
                .synthesize(self.parser.complete_blocks(), &instructions, &known_files);
        for d in &synthesis.diagnostics {
            self.observer.on_diagnostic(d);
        }
        self.diagnostics.extend(synthesis.diagnostics);
        self.ensure_live()?;

        let analysis = self
            .analyzer
            .analyze(synthesis.operations, self.oracle.as_ref())
            .await;
        for d in &analysis.diagnostics {
            self.observer.on_diagnostic(d);
        }
        self.diagnostics.extend(analysis.diagnostics);
        self.ensure_live()?;

        let batch = OperationBatch::summarize(
            analysis.operations,
            analysis.conflicts,
            std::mem::take(&mut self.diagnostics),
        );
        info!(
            operations = batch.summary.total,
            conflicts = batch.summary.conflicts,
            requires_review = batch.summary.requires_review,
            "batch ready"
        );
        self.observer.on_batch_ready(&batch);
        self.reset();
        Ok(batch)
    }

    /// Run a complete (non-streamed) response through the same path.
    pub async fn process_response(&mut self, text: &str) -> Result<OperationBatch, PipelineError> {
        self.process_chunk(text);
        self.complete().await
    }

    /// Abort the turn and discard all partial state. Nothing that was
    /// parsed or synthesized survives; the in-flight turn's `complete`
    /// still reports [`PipelineError::Cancelled`] so no batch can be
    /// handed off.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.clear_turn_state();
    }

    /// Reinitialize for the next turn. Installs a fresh cancellation
    /// token; a token handed out earlier only controls the turn it was
    /// taken for.
    pub fn reset(&mut self) {
        self.clear_turn_state();
        self.cancel = CancellationToken::new();
    }

    fn clear_turn_state(&mut self) {
        self.parser.reset();
        self.prose.clear();
        self.diagnostics.clear();
    }

    fn ensure_live(&mut self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            self.reset();
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    fn dispatch(&mut self, events: Vec<ParserEvent>) {
        for event in events {
            match event {
                ParserEvent::Text(line) => {
                    self.observer.on_text(&line);
                    self.prose.push(line);
                }
                ParserEvent::BlockCompleted(block) => {
                    self.observer.on_block_completed(&block);
                }
            }
        }
    }
}
