use serde::Serialize;
use std::path::PathBuf;
use utoipa::ToSchema;

/// A file that passed every admission gate and now lives in the storage directory
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommittedFile {
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: u64,
    pub mime_type: String,
    pub sha256: String,
    /// Retrieval URL for the stored file
    pub url: String,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct StorageUsage {
    /// Bytes held by committed files
    pub used: u64,
    /// Bytes promised to admissions still in flight
    pub reserved: u64,
    pub limit: u64,
}
