//! # opforge — LLM response → reviewable file-operation batch
//!
//! Ingests a large-language-model's free-form streaming text response
//! and converts it into a validated, risk-assessed, ordered set of file
//! operations safe to hand to a human-confirmed application step.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, defaults
//! - **[`model`]** — Data model (code blocks, operations, conflicts, batches)
//! - **[`diagnostics`]** — Structured recoverable diagnostics per stage
//! - **[`parser`]** — Incremental fenced-block parser + metadata resolution
//! - **[`synth`]** — Operation synthesis (grouping, inference, ordering)
//! - **[`analyzer`]** — Risk policy, impact detection, conflict detection
//! - **[`oracle`]** — Read-only workspace oracles (filesystem + mock)
//! - **[`pipeline`]** — Coordinator driving one model turn end to end

pub mod analyzer;
pub mod config;
pub mod diagnostics;
pub mod model;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod synth;
