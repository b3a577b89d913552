//! Progress event definitions
//!
//! Supporting types for run progress tracking. The orchestrator pushes one
//! `ProgressUpdate` before the first file and one after every processed
//! file; consumers (CLI status line, future GUI) render them however they
//! like.

use serde::{Deserialize, Serialize};

/// Snapshot of run progress after (or before) a file boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Files processed so far (matched or not)
    pub processed: usize,
    /// Total files in the run snapshot
    pub total: usize,
    /// Files matched and transferred successfully
    pub matched: usize,
    /// File just processed; `None` for the initial update
    pub current_file: Option<String>,
}

/// Consumer of progress updates
///
/// Delivered synchronously from the orchestrator loop; implementations must
/// return quickly so progress delivery never stalls file processing.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: ProgressUpdate);
}

/// Any `Fn(ProgressUpdate)` closure works as a progress sink
impl<F> ProgressSink for F
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: ProgressUpdate) {
        self(update)
    }
}

/// Sink that discards all updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _update: ProgressUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_as_sink() {
        let seen: Mutex<Vec<ProgressUpdate>> = Mutex::new(Vec::new());
        let sink = |u: ProgressUpdate| seen.lock().unwrap().push(u);

        sink.on_progress(ProgressUpdate {
            processed: 1,
            total: 3,
            matched: 1,
            current_file: Some("img_1234.jpg".to_string()),
        });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].processed, 1);
        assert_eq!(seen[0].current_file.as_deref(), Some("img_1234.jpg"));
    }

    #[test]
    fn test_progress_update_serialization() {
        let update = ProgressUpdate {
            processed: 2,
            total: 5,
            matched: 1,
            current_file: None,
        };

        let json = serde_json::to_string(&update).unwrap();
        let back: ProgressUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }
}
