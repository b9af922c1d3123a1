use crate::utils::validation::content_type_for;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("File not found")]
pub struct FileNotFound;

/// An open committed file ready to be streamed
#[derive(Debug)]
pub struct RetrievedFile {
    pub file: tokio::fs::File,
    pub stored_name: String,
    pub size: u64,
    pub content_type: &'static str,
}

/// Read-only lookup of committed files by stored name.
///
/// Only plain entries directly under the storage root are reachable; names that
/// carry separators, traversal, or a leading dot (the staging area included)
/// resolve to `FileNotFound`.
pub struct RetrievalService {
    root: PathBuf,
}

impl RetrievalService {
    /// `root` is expected to be canonical
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub async fn retrieve(&self, stored_name: &str) -> Result<RetrievedFile, FileNotFound> {
        let path = self.resolve(stored_name).await.ok_or(FileNotFound)?;

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to open {}: {}", path.display(), e);
            }
            FileNotFound
        })?;

        let meta = file.metadata().await.map_err(|e| {
            tracing::error!("Failed to stat {}: {}", path.display(), e);
            FileNotFound
        })?;

        if !meta.is_file() {
            return Err(FileNotFound);
        }

        Ok(RetrievedFile {
            file,
            stored_name: stored_name.to_string(),
            size: meta.len(),
            content_type: content_type_for(stored_name),
        })
    }

    async fn resolve(&self, stored_name: &str) -> Option<PathBuf> {
        if !is_plain_name(stored_name) {
            tracing::warn!("Rejected retrieval of suspicious name {:?}", stored_name);
            return None;
        }

        // Symlinks could still point outside the root
        let canonical = tokio::fs::canonicalize(self.root.join(stored_name)).await.ok()?;
        if canonical.parent() != Some(self.root.as_path()) {
            tracing::warn!(
                "Retrieval of {:?} resolved outside the storage directory",
                stored_name
            );
            return None;
        }

        Some(canonical)
    }
}

fn is_plain_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.contains(['\\', '\0']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn service(dir: &TempDir) -> RetrievalService {
        RetrievalService::new(dir.path().canonicalize().unwrap())
    }

    async fn read_all(mut found: RetrievedFile) -> Vec<u8> {
        let mut buf = Vec::new();
        found.file.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn test_retrieves_committed_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("17-cat.png"), b"meow").unwrap();

        let found = service(&dir).retrieve("17-cat.png").await.unwrap();
        assert_eq!(found.size, 4);
        assert_eq!(found.content_type, "image/png");
        assert_eq!(read_all(found).await, b"meow");
    }

    #[tokio::test]
    async fn test_repeated_retrieval_is_identical() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("1-a.gif"), b"GIF89a-bytes").unwrap();
        let service = service(&dir);

        let first = read_all(service.retrieve("1-a.gif").await.unwrap()).await;
        let second = read_all(service.retrieve("1-a.gif").await.unwrap()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            service(&dir).retrieve("nope.png").await.unwrap_err(),
            FileNotFound
        );
    }

    #[tokio::test]
    async fn test_traversal_is_refused() {
        let outer = TempDir::new().unwrap();
        std::fs::write(outer.path().join("secret.txt"), b"top secret").unwrap();
        let root = outer.path().join("uploads");
        std::fs::create_dir(&root).unwrap();
        std::fs::create_dir(root.join(".staging")).unwrap();
        std::fs::write(root.join(".staging").join("upload-1.part"), b"mid-scan").unwrap();

        let service = RetrievalService::new(root.canonicalize().unwrap());
        for name in [
            "../secret.txt",
            "..",
            ".",
            "",
            "..\\secret.txt",
            "/etc/passwd",
            ".staging/upload-1.part",
            ".staging",
            "a/../../secret.txt",
        ] {
            assert!(service.retrieve(name).await.is_err(), "{name:?} leaked");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_refused() {
        let outer = TempDir::new().unwrap();
        std::fs::write(outer.path().join("secret.txt"), b"top secret").unwrap();
        let root = outer.path().join("uploads");
        std::fs::create_dir(&root).unwrap();
        std::os::unix::fs::symlink(outer.path().join("secret.txt"), root.join("1-link.png"))
            .unwrap();

        let service = RetrievalService::new(root.canonicalize().unwrap());
        assert!(service.retrieve("1-link.png").await.is_err());
    }

    #[tokio::test]
    async fn test_directories_are_not_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("folder")).unwrap();
        assert!(service(&dir).retrieve("folder").await.is_err());
    }
}
