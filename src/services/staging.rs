use crate::config::IntakeConfig;
use crate::models::CommittedFile;
use crate::services::naming::NameSanitizer;
use crate::utils::validation::{
    ContentError, NameError, is_mime_allowed, normalize_mime, verify_magic_bytes,
};
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Leading bytes kept for content sniffing
const SNIFF_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Invalid file type '{declared}'. Allowed types: {allowed}")]
    TypeRejected { declared: String, allowed: String },

    #[error("Invalid filename: {0}")]
    InvalidName(#[from] NameError),

    #[error("File too large: each file is limited to {limit} bytes")]
    SizeExceeded { limit: u64 },

    #[error("Invalid file content: {0}")]
    ContentRejected(#[from] ContentError),

    #[error("Request body exceeds the maximum allowed limit")]
    BodyTooLarge,

    #[error("Upload stream failed: {0}")]
    Transport(String),

    #[error("Staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MultipartError> for StagingError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            StagingError::BodyTooLarge
        } else {
            StagingError::Transport(e.body_text())
        }
    }
}

/// A file fully received into the staging area but not yet admitted.
///
/// Dropping a `StagedFile` deletes its bytes, so any path that abandons a
/// file (gate failure, aborted batch, cancelled request) purges it.
#[derive(Debug)]
pub struct StagedFile {
    pub original_name: String,
    pub stored_name: String,
    pub size_bytes: u64,
    pub declared_mime_type: String,
    pub sha256: String,
    path: TempPath,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the staged bytes. Failures are logged and otherwise ignored.
    pub fn purge(self) {
        let shown = self.path.display().to_string();
        match self.path.close() {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                tracing::error!("Failed to purge staged file {}: {}", shown, e);
            }
            _ => {}
        }
    }

    /// Moves the staged bytes to `dest`, refusing to overwrite an existing file.
    pub(crate) fn commit_to(self, dest: &Path) -> std::io::Result<CommittedFile> {
        self.path.persist_noclobber(dest).map_err(|e| e.error)?;

        Ok(CommittedFile {
            url: format!("/files/{}", self.stored_name),
            original_name: self.original_name,
            stored_name: self.stored_name,
            size_bytes: self.size_bytes,
            mime_type: self.declared_mime_type,
            sha256: self.sha256,
            path: dest.to_path_buf(),
        })
    }
}

/// Transport-side staging: type filter, name sanitizing, per-file size cap.
pub struct Stager {
    staging_dir: PathBuf,
    max_file_size: u64,
    allowed_mime_types: Vec<String>,
    verify_content_signature: bool,
    names: NameSanitizer,
}

impl Stager {
    pub fn new(staging_dir: PathBuf, config: &IntakeConfig) -> Self {
        Self {
            staging_dir,
            max_file_size: config.max_file_size,
            allowed_mime_types: config.allowed_mime_types.clone(),
            verify_content_signature: config.verify_content_signature,
            names: NameSanitizer::new(),
        }
    }

    /// Rejects disallowed declared types before anything touches the disk.
    pub fn check_type(&self, declared: Option<&str>) -> Result<String, StagingError> {
        let declared = declared.unwrap_or("");
        if !is_mime_allowed(declared, &self.allowed_mime_types) {
            return Err(StagingError::TypeRejected {
                declared: declared.to_string(),
                allowed: self.allowed_mime_types.join(", "),
            });
        }
        Ok(normalize_mime(declared).unwrap_or_else(|| declared.to_string()))
    }

    /// Streams one upload into the staging area.
    ///
    /// The file is only returned once the body ended cleanly; a stream error or
    /// an oversized body drops the partial file.
    pub async fn stage<S, E>(
        &self,
        original_name: &str,
        declared_mime: Option<&str>,
        body: S,
    ) -> Result<StagedFile, StagingError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<StagingError>,
    {
        let declared_mime_type = self.check_type(declared_mime)?;
        let stored_name = self.names.sanitize(original_name)?;

        let temp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(&self.staging_dir)?;
        let (std_file, path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let mut body = std::pin::pin!(body);
        let mut hasher = Sha256::new();
        let mut head = Vec::with_capacity(SNIFF_LEN);
        let mut size_bytes: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(Into::<StagingError>::into)?;

            size_bytes += chunk.len() as u64;
            if size_bytes > self.max_file_size {
                tracing::warn!(
                    "Upload {} exceeded per-file limit of {} bytes",
                    original_name,
                    self.max_file_size
                );
                return Err(StagingError::SizeExceeded {
                    limit: self.max_file_size,
                });
            }

            if head.len() < SNIFF_LEN {
                let take = (SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
            }

            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }

        file.flush().await?;
        file.sync_all().await?;

        if self.verify_content_signature {
            verify_magic_bytes(&head, &declared_mime_type)?;
        }

        tracing::debug!(
            "Staged {} as {} ({} bytes)",
            original_name,
            stored_name,
            size_bytes
        );

        Ok(StagedFile {
            original_name: original_name.to_string(),
            stored_name,
            size_bytes,
            declared_mime_type,
            sha256: hex::encode(hasher.finalize()),
            path,
        })
    }
}
