use crate::models::{CommittedFile, StorageUsage};
use crate::services::staging::StagedFile;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Outcome of a quota check
#[derive(Debug)]
pub enum QuotaDecision {
    Allow(QuotaReservation),
    Reject { current_total: u64, limit: u64 },
}

/// Bytes promised to one in-flight admission.
///
/// Released when the file is committed through [`QuotaTracker::commit`] or when
/// the reservation is dropped on any failure path.
#[derive(Debug)]
pub struct QuotaReservation {
    bytes: u64,
    reserved: Arc<AtomicU64>,
    released: bool,
}

impl QuotaReservation {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    fn release(&mut self) {
        if !self.released {
            self.reserved.fetch_sub(self.bytes, Ordering::SeqCst);
            self.released = true;
        }
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        self.release();
    }
}

/// Bounds the aggregate size of the storage directory.
///
/// The committed total is recomputed from the directory on every check. Check
/// and commit both run under one admission lock, and bytes of admissions that
/// are still scanning are carried as reservations, so concurrent requests
/// cannot jointly overshoot the limit. Scans themselves run outside the lock.
#[derive(Debug)]
pub struct QuotaTracker {
    root: PathBuf,
    limit: u64,
    reserved: Arc<AtomicU64>,
    admission: Mutex<()>,
}

impl QuotaTracker {
    pub fn new(root: PathBuf, limit: u64) -> Self {
        Self {
            root,
            limit,
            reserved: Arc::new(AtomicU64::new(0)),
            admission: Mutex::new(()),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Admits iff committed + reserved + candidate stays within the limit.
    pub async fn admit(&self, candidate_bytes: u64) -> std::io::Result<QuotaDecision> {
        let _guard = self.admission.lock().await;

        let used = self.committed_total().await?;
        let current_total = used + self.reserved.load(Ordering::SeqCst);

        if current_total.saturating_add(candidate_bytes) > self.limit {
            return Ok(QuotaDecision::Reject {
                current_total,
                limit: self.limit,
            });
        }

        self.reserved.fetch_add(candidate_bytes, Ordering::SeqCst);
        Ok(QuotaDecision::Allow(QuotaReservation {
            bytes: candidate_bytes,
            reserved: self.reserved.clone(),
            released: false,
        }))
    }

    /// Renames a staged file into the storage directory and turns its
    /// reservation into committed usage in one critical section.
    pub async fn commit(
        &self,
        mut reservation: QuotaReservation,
        staged: StagedFile,
    ) -> std::io::Result<CommittedFile> {
        let dest = self.root.join(&staged.stored_name);

        let _guard = self.admission.lock().await;
        let committed = staged.commit_to(&dest);
        reservation.release();
        committed
    }

    pub async fn usage(&self) -> std::io::Result<StorageUsage> {
        Ok(StorageUsage {
            used: self.committed_total().await?,
            reserved: self.reserved.load(Ordering::SeqCst),
            limit: self.limit,
        })
    }

    /// Sum of regular file sizes directly under the storage root
    async fn committed_total(&self) -> std::io::Result<u64> {
        let mut total = 0u64;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            match entry.metadata().await {
                Ok(meta) if meta.is_file() => total += meta.len(),
                Ok(_) => {}
                // Removed between listing and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }

        Ok(total)
    }
}
