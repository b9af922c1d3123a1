use crate::models::CommittedFile;
use crate::services::quota::{QuotaDecision, QuotaTracker};
use crate::services::scan_gate::{ScanGate, ScanVerdict};
use crate::services::staging::StagedFile;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("No files uploaded")]
    NoFiles,

    #[error("Storage quota exceeded ({current_total} of {limit} bytes in use)")]
    QuotaExceeded { current_total: u64, limit: u64 },

    #[error("Malware detected in {file}: {threat_name}")]
    Infected { file: String, threat_name: String },

    #[error("Scan error: {reason}")]
    ScanFailure { reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Runs staged files through quota and scan gates and commits the survivors.
///
/// Files are processed strictly in order. A failing gate purges the file at
/// hand and every file after it; files committed earlier in the same batch
/// stay committed.
pub struct AdmissionPipeline {
    quota: Arc<QuotaTracker>,
    scan_gate: ScanGate,
}

impl AdmissionPipeline {
    pub fn new(quota: Arc<QuotaTracker>, scan_gate: ScanGate) -> Self {
        Self { quota, scan_gate }
    }

    pub async fn admit(&self, files: Vec<StagedFile>) -> Result<Vec<CommittedFile>, AdmissionError> {
        if files.is_empty() {
            return Err(AdmissionError::NoFiles);
        }

        let mut committed = Vec::with_capacity(files.len());
        let mut pending = files.into_iter();

        while let Some(file) = pending.next() {
            match self.admit_one(file).await {
                Ok(c) => {
                    tracing::info!(
                        "✅ Committed {} as {} ({} bytes)",
                        c.original_name,
                        c.stored_name,
                        c.size_bytes
                    );
                    committed.push(c);
                }
                Err(e) => {
                    let skipped = pending.len();
                    pending.for_each(StagedFile::purge);
                    if !committed.is_empty() || skipped > 0 {
                        tracing::warn!(
                            "Batch aborted: {} file(s) stay committed, {} unprocessed file(s) purged",
                            committed.len(),
                            skipped
                        );
                    }
                    return Err(e);
                }
            }
        }

        Ok(committed)
    }

    async fn admit_one(&self, file: StagedFile) -> Result<CommittedFile, AdmissionError> {
        let reservation = match self.quota.admit(file.size_bytes).await {
            Ok(QuotaDecision::Allow(reservation)) => reservation,
            Ok(QuotaDecision::Reject {
                current_total,
                limit,
            }) => {
                tracing::warn!(
                    "Quota exceeded for {}: {} + {} > {}",
                    file.original_name,
                    current_total,
                    file.size_bytes,
                    limit
                );
                file.purge();
                return Err(AdmissionError::QuotaExceeded {
                    current_total,
                    limit,
                });
            }
            Err(e) => {
                file.purge();
                return Err(e.into());
            }
        };

        match self.scan_gate.scan(file.path()).await {
            ScanVerdict::Clean => {}
            ScanVerdict::Infected { threat_name } => {
                let name = file.original_name.clone();
                file.purge();
                return Err(AdmissionError::Infected {
                    file: name,
                    threat_name,
                });
            }
            ScanVerdict::ScanFailure { reason } => {
                tracing::error!("❌ Scan failed for {}: {}", file.original_name, reason);
                file.purge();
                return Err(AdmissionError::ScanFailure { reason });
            }
        }

        Ok(self.quota.commit(reservation, file).await?)
    }
}
