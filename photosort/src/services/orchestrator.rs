//! Run orchestrator
//!
//! Drives a single sequential pass over the source snapshot: resolve a
//! label for each file (reference matching, enrichment, or matching with
//! enrichment fallback), hand matched files to the verified transfer, and
//! report progress after every file. The sequential loop keeps collision
//! naming and progress reporting deterministic.
//!
//! Cancellation is cooperative: the token is polled once per file boundary,
//! so the in-flight file always runs to completion and completed transfers
//! are never rolled back. A failure while processing one file is logged
//! and counted; it never aborts the run.

use crate::services::enrichment_client::{EnrichmentClient, EnrichmentResult};
use crate::services::file_scanner::{FileScanner, SourceFile};
use crate::services::match_resolver::{MatchResolver, MatchResult};
use crate::services::reference_index::ReferenceIndex;
use crate::services::verified_transfer::{TransferOutcome, VerifiedTransfer};
use photosort_common::events::{ProgressSink, ProgressUpdate};
use photosort_common::{Error, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// One completed transfer recorded in the run summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Aggregate result of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files processed (matched or not); equals the snapshot size unless
    /// the run was cancelled
    pub processed: usize,
    /// Snapshot size
    pub total: usize,
    /// Files matched and transferred successfully
    pub matched: usize,
    /// Destination of every successful transfer, in processing order
    pub transfers: Vec<CompletedTransfer>,
}

/// Single-pass run orchestrator
///
/// Resolution strategy per file:
/// - reference index present: tiered matching; unmatched image files fall
///   back to enrichment when a client is configured
/// - no reference index: enrichment only (image files only)
pub struct Orchestrator {
    scanner: FileScanner,
    resolver: MatchResolver,
    transfer: VerifiedTransfer,
    index: Option<ReferenceIndex>,
    enrichment: Option<EnrichmentClient>,
}

impl Orchestrator {
    pub fn new(
        resolver: MatchResolver,
        transfer: VerifiedTransfer,
        index: Option<ReferenceIndex>,
        enrichment: Option<EnrichmentClient>,
    ) -> Result<Self> {
        if index.is_none() && enrichment.is_none() {
            return Err(Error::InvalidInput(
                "no resolution strategy: need a reference table, enrichment, or both".to_string(),
            ));
        }
        Ok(Self {
            scanner: FileScanner::new(),
            resolver,
            transfer,
            index,
            enrichment,
        })
    }

    /// Process every file under `source_dir` into `target_dir`
    ///
    /// Creates the destination directory if absent (fatal on failure),
    /// snapshots the source tree once, then loops. Progress is delivered
    /// once before the first file and once after every file.
    pub async fn run(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        std::fs::create_dir_all(target_dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("cannot create destination {}: {}", target_dir.display(), e),
            ))
        })?;

        let files = self
            .scanner
            .scan(source_dir)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let mut summary = RunSummary {
            total: files.len(),
            ..Default::default()
        };

        tracing::info!(
            total = summary.total,
            source = %source_dir.display(),
            target = %target_dir.display(),
            "Run started"
        );

        progress.on_progress(ProgressUpdate {
            processed: 0,
            total: summary.total,
            matched: 0,
            current_file: None,
        });

        for file in &files {
            if cancel.is_cancelled() {
                tracing::info!(
                    processed = summary.processed,
                    total = summary.total,
                    "Run cancelled"
                );
                break;
            }

            if let Some(label) = self.resolve_label(file).await {
                let outcome = self
                    .transfer
                    .copy_verified(&file.path, target_dir, &label, &file.extension)
                    .await;

                match outcome {
                    TransferOutcome::Succeeded { destination, .. } => {
                        summary.matched += 1;
                        summary.transfers.push(CompletedTransfer {
                            source: file.path.clone(),
                            destination,
                        });
                    }
                    TransferOutcome::Failed { reason, attempts } => {
                        tracing::warn!(
                            file = %file.file_name,
                            reason = %reason,
                            attempts,
                            "Transfer failed, file skipped"
                        );
                    }
                }
            }

            summary.processed += 1;
            progress.on_progress(ProgressUpdate {
                processed: summary.processed,
                total: summary.total,
                matched: summary.matched,
                current_file: Some(file.file_name.clone()),
            });
        }

        tracing::info!(
            processed = summary.processed,
            matched = summary.matched,
            "Run finished"
        );
        Ok(summary)
    }

    /// Resolve a label for one file, or `None` to skip it
    async fn resolve_label(&self, file: &SourceFile) -> Option<String> {
        if let Some(index) = &self.index {
            match self.resolver.resolve(&file.stem, index) {
                MatchResult::Matched { label, tier } => {
                    tracing::debug!(file = %file.file_name, label = %label, tier = %tier, "Resolved");
                    return Some(label);
                }
                MatchResult::Unmatched => {}
            }
        }

        if let Some(client) = &self.enrichment {
            if !file.is_image() {
                tracing::debug!(file = %file.file_name, "Not an image, enrichment skipped");
                return None;
            }
            let bytes = match tokio::fs::read(&file.path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "Cannot read image for enrichment");
                    return None;
                }
            };
            match client.describe(&bytes).await {
                EnrichmentResult::Described(label) => return Some(label),
                EnrichmentResult::Skipped(reason) => {
                    tracing::info!(file = %file.file_name, reason = %reason, "Enrichment skipped");
                }
                EnrichmentResult::Failed => {
                    tracing::warn!(file = %file.file_name, "Enrichment failed");
                }
            }
        }

        None
    }
}
