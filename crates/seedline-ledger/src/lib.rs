//! # seedline-ledger
//!
//! Everything that turns worker output into a curriculum on disk.
//!
//! This crate provides:
//! - `SentenceLog` (the ordered sentence backbone, loaded from JSONL)
//! - batch adapters that read every historical batch shape into one
//!   `BatchProposal`
//! - structural batch validation, run in parallel
//! - the deterministic merge: replay in sentence order through one registry
//! - unit/occurrence exports, their digest, and a verifier for them
//!
//! ## Data flow
//!
//! ```text
//! sentences.jsonl ─▶ SentenceLog
//! batch files ─────▶ adapter ─▶ BatchProposal ─▶ validate ─▶ merge ─▶ Registry + timeline
//!                                                                         │
//!                               units.jsonl + occurrences.jsonl ◀── export
//! ```

pub mod adapter;
pub mod batch;
pub mod export;
pub mod jsonl;
pub mod merge;
pub mod sentences;
pub mod verify;

pub use adapter::{AdapterError, adapt_batch, adapt_batch_str, read_batch_from_path};
pub use batch::{
    BatchCheck, BatchDefect, BatchProposal, ProposedOccurrence, SentenceProposal, SentenceRange,
    validate_batch, validate_batches,
};
pub use export::{
    ExportSummary, OccurrenceRow, RenderedExport, export_digest, load_registry, load_snapshot,
    read_occurrence_rows, read_unit_records, render_exports, write_merge_outputs,
};
pub use jsonl::JsonlError;
pub use merge::{
    MergeError, MergeOutcome, MergeReport, Rewrite, RewriteKind, SentenceOccurrences,
    Snapshot, merge_batches,
};
pub use sentences::{SentenceLog, SentenceLogError};
pub use verify::verify_exports;

use seedline_kernel::RegistryError;

/// Any failure surfaced by the ledger's file-level operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error(transparent)]
    Sentences(#[from] SentenceLogError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error("invalid unit export: {0}")]
    Registry(#[from] RegistryError),
}
