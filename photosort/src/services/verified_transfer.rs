//! Verified file transfer
//!
//! Copies a source file into the destination directory under a resolved
//! label, then proves the copy is byte-identical: size equality first, then
//! a full SHA-256 digest comparison against the digest computed from the
//! source before the first attempt. Any mismatch or I/O error removes the
//! destination artifact (best effort) and retries up to the budget. A
//! `Succeeded` outcome therefore never leaves a partially-written file.
//!
//! Collision-safe naming: `label.ext`, then `label_1.ext`, `label_2.ext`, …
//! against the destination directory's state at call time.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Default retry budget for copy attempts
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Outcome of one verified transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Destination is byte-identical to the source
    Succeeded {
        destination: PathBuf,
        attempts: u32,
    },
    /// Copy or verification failed after exhausting retries, or the source
    /// could not be read; no artifact remains at the candidate path
    Failed {
        reason: String,
        attempts: u32,
    },
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Succeeded { .. })
    }
}

/// Verified transfer service
#[derive(Debug, Clone, Copy)]
pub struct VerifiedTransfer {
    max_retries: u32,
}

impl VerifiedTransfer {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Copy `source` into `destination_dir` as `base_label` + extension
    ///
    /// **Algorithm:**
    /// 1. Hash the source (streaming SHA-256); read failure is terminal
    /// 2. Resolve a collision-free candidate name, once
    /// 3. Up to `max_retries + 1` attempts: copy, compare sizes, compare
    ///    digests; on any failure remove the artifact and retry
    ///
    /// File I/O and hashing run on the blocking thread pool.
    pub async fn copy_verified(
        &self,
        source: &Path,
        destination_dir: &Path,
        base_label: &str,
        extension: &str,
    ) -> TransferOutcome {
        let source = source.to_path_buf();
        let destination_dir = destination_dir.to_path_buf();
        let base_label = base_label.to_string();
        let extension = extension.to_string();
        let max_retries = self.max_retries;

        let outcome = tokio::task::spawn_blocking(move || {
            copy_verified_blocking(&source, &destination_dir, &base_label, &extension, max_retries)
        })
        .await;

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => TransferOutcome::Failed {
                reason: format!("transfer task failed: {}", e),
                attempts: 0,
            },
        }
    }
}

impl Default for VerifiedTransfer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

fn copy_verified_blocking(
    source: &Path,
    destination_dir: &Path,
    base_label: &str,
    extension: &str,
    max_retries: u32,
) -> TransferOutcome {
    let source_hash = match compute_sha256(source) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!(source = %source.display(), error = %e, "Cannot hash source file");
            return TransferOutcome::Failed {
                reason: format!("cannot read source: {}", e),
                attempts: 0,
            };
        }
    };

    let destination = resolve_collision_free(destination_dir, base_label, extension);

    let mut attempts = 0u32;
    let mut last_error = String::new();

    while attempts <= max_retries {
        attempts += 1;

        match copy_and_verify_once(source, &destination, &source_hash) {
            Ok(()) => {
                tracing::info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    attempts,
                    "Copy verified"
                );
                return TransferOutcome::Succeeded {
                    destination,
                    attempts,
                };
            }
            Err(e) => {
                last_error = e;
                remove_artifact(&destination);
                if attempts <= max_retries {
                    tracing::warn!(
                        source = %source.display(),
                        attempt = attempts,
                        error = %last_error,
                        "Copy verification failed, retrying"
                    );
                }
            }
        }
    }

    tracing::warn!(
        source = %source.display(),
        attempts,
        error = %last_error,
        "Copy verification failed after exhausting retries"
    );
    TransferOutcome::Failed {
        reason: last_error,
        attempts,
    }
}

fn copy_and_verify_once(
    source: &Path,
    destination: &Path,
    source_hash: &str,
) -> Result<(), String> {
    // std::fs::copy carries permission bits along with the content
    std::fs::copy(source, destination).map_err(|e| format!("copy failed: {}", e))?;

    let source_len = std::fs::metadata(source)
        .map_err(|e| format!("cannot stat source: {}", e))?
        .len();
    let dest_len = std::fs::metadata(destination)
        .map_err(|e| format!("cannot stat destination: {}", e))?
        .len();
    if source_len != dest_len {
        return Err(format!(
            "size mismatch: source {} bytes, destination {} bytes",
            source_len, dest_len
        ));
    }

    let dest_hash =
        compute_sha256(destination).map_err(|e| format!("cannot hash destination: {}", e))?;
    if dest_hash != source_hash {
        return Err("digest mismatch".to_string());
    }

    Ok(())
}

fn remove_artifact(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
        }
    }
}

/// First unused `label.ext` / `label_N.ext` name in the destination directory
fn resolve_collision_free(destination_dir: &Path, base_label: &str, extension: &str) -> PathBuf {
    let candidate = destination_dir.join(file_name_for(base_label, extension));
    if !candidate.exists() {
        return candidate;
    }

    let mut counter = 1u32;
    loop {
        let name = file_name_for(&format!("{}_{}", base_label, counter), extension);
        let candidate = destination_dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

fn file_name_for(label: &str, extension: &str) -> String {
    if extension.is_empty() {
        label.to_string()
    } else {
        format!("{}.{}", label, extension)
    }
}

/// Streaming SHA-256 of a file's full content, hex-encoded
///
/// Reads in 1 MiB chunks so large images never load fully into memory.
pub fn compute_sha256(path: &Path) -> std::io::Result<String> {
    use std::io::Read;

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_verified_success() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("photo.jpg");
        fs::write(&source, b"image bytes").unwrap();

        let outcome = VerifiedTransfer::default()
            .copy_verified(&source, dst_dir.path(), "beijing", "jpg")
            .await;

        match outcome {
            TransferOutcome::Succeeded {
                destination,
                attempts,
            } => {
                assert_eq!(destination, dst_dir.path().join("beijing.jpg"));
                assert_eq!(attempts, 1);
                assert_eq!(fs::read(&destination).unwrap(), b"image bytes");
            }
            other => panic!("Expected Succeeded, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_copy_verified_digests_match() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("photo.jpg");
        fs::write(&source, vec![7u8; 3 * 1024 * 1024]).unwrap();

        let outcome = VerifiedTransfer::default()
            .copy_verified(&source, dst_dir.path(), "big", "jpg")
            .await;

        let TransferOutcome::Succeeded { destination, .. } = outcome else {
            panic!("transfer failed");
        };
        assert_eq!(
            compute_sha256(&source).unwrap(),
            compute_sha256(&destination).unwrap()
        );
    }

    #[tokio::test]
    async fn test_collision_appends_counter() {
        let src_dir = TempDir::new().unwrap();
        let dst_dir = TempDir::new().unwrap();
        let transfer = VerifiedTransfer::default();

        for (name, content) in [("a.jpg", b"one" as &[u8]), ("b.jpg", b"two"), ("c.jpg", b"three")]
        {
            let source = src_dir.path().join(name);
            fs::write(&source, content).unwrap();
            let outcome = transfer
                .copy_verified(&source, dst_dir.path(), "beijing", "jpg")
                .await;
            assert!(outcome.is_success(), "transfer of {} failed", name);
        }

        assert_eq!(
            fs::read(dst_dir.path().join("beijing.jpg")).unwrap(),
            b"one"
        );
        assert_eq!(
            fs::read(dst_dir.path().join("beijing_1.jpg")).unwrap(),
            b"two"
        );
        assert_eq!(
            fs::read(dst_dir.path().join("beijing_2.jpg")).unwrap(),
            b"three"
        );
    }

    #[tokio::test]
    async fn test_unreadable_source_is_terminal() {
        let dst_dir = TempDir::new().unwrap();

        let outcome = VerifiedTransfer::default()
            .copy_verified(
                Path::new("/nonexistent/photo.jpg"),
                dst_dir.path(),
                "label",
                "jpg",
            )
            .await;

        match outcome {
            TransferOutcome::Failed { attempts, .. } => assert_eq!(attempts, 0),
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(!dst_dir.path().join("label.jpg").exists());
    }

    #[tokio::test]
    async fn test_missing_destination_dir_exhausts_retries() {
        let src_dir = TempDir::new().unwrap();
        let source = src_dir.path().join("photo.jpg");
        fs::write(&source, b"bytes").unwrap();

        let missing = src_dir.path().join("no_such_dir");
        let outcome = VerifiedTransfer::new(2)
            .copy_verified(&source, &missing, "label", "jpg")
            .await;

        match outcome {
            TransferOutcome::Failed { attempts, .. } => {
                // max_retries + 1 attempts
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(!missing.join("label.jpg").exists());
    }

    #[test]
    fn test_compute_sha256_known_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"test content").unwrap();

        let hash = compute_sha256(&path).unwrap();
        assert_eq!(hash, format!("{:x}", Sha256::digest(b"test content")));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_file_name_without_extension() {
        assert_eq!(file_name_for("label", ""), "label");
        assert_eq!(file_name_for("label", "jpg"), "label.jpg");
    }
}
