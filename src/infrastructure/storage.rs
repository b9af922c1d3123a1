use crate::config::IntakeConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the staging area inside the storage directory
pub const STAGING_DIR_NAME: &str = ".staging";

/// Resolved on-disk layout of the storage directory
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Canonical storage root holding committed files
    pub root: PathBuf,
    /// Staging area for files still being admitted
    pub staging: PathBuf,
}

/// Creates the storage directory and staging area if absent and clears
/// staging leftovers from a previous run.
pub async fn setup_storage(config: &IntakeConfig) -> Result<StorageLayout> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating {}", config.upload_dir.display()))?;

    let root = tokio::fs::canonicalize(&config.upload_dir)
        .await
        .with_context(|| format!("resolving {}", config.upload_dir.display()))?;

    let staging = root.join(STAGING_DIR_NAME);
    tokio::fs::create_dir_all(&staging)
        .await
        .with_context(|| format!("creating {}", staging.display()))?;

    let swept = sweep_staging(&staging).await?;
    if swept > 0 {
        tracing::warn!("🧹 Removed {} abandoned staging file(s)", swept);
    }

    info!("📁 Storage directory: {}", root.display());
    Ok(StorageLayout { root, staging })
}

async fn sweep_staging(staging: &Path) -> Result<usize> {
    let mut removed = 0;
    let mut entries = tokio::fs::read_dir(staging).await?;

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }

    Ok(removed)
}
