//! Core services for the photosort pipeline

pub mod enrichment_client;
pub mod file_scanner;
pub mod match_resolver;
pub mod orchestrator;
pub mod rate_gate;
pub mod reference_index;
pub mod tokenizer;
pub mod verified_transfer;

pub use enrichment_client::{EnrichmentClient, EnrichmentConfig, EnrichmentResult};
pub use file_scanner::{FileScanner, ScanError, SourceFile};
pub use match_resolver::{MatchResolver, MatchResult, MatchTier};
pub use orchestrator::{CompletedTransfer, Orchestrator, RunSummary};
pub use rate_gate::RateGate;
pub use reference_index::{ReferenceEntry, ReferenceIndex, SimilarityHit};
pub use verified_transfer::{TransferOutcome, VerifiedTransfer};
