//! photosort library interface
//!
//! Resolves a label for each file in a source collection against a
//! reference table (exact, fuzzy, then character-similarity matching) or by
//! asking an external image-description service, then copies matched files
//! to a destination under the resolved label with hash-verified,
//! collision-safe naming.

pub mod reference_table;
pub mod services;

pub use services::{
    EnrichmentClient, EnrichmentConfig, EnrichmentResult, MatchResolver, MatchResult,
    Orchestrator, RateGate, ReferenceEntry, ReferenceIndex, RunSummary, TransferOutcome,
    VerifiedTransfer,
};
