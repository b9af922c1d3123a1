use crate::services::scanner::{ScanResult, VirusScanner};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Verdict of the malware gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    Infected { threat_name: String },
    ScanFailure { reason: String },
}

/// Runs a staged file through the scanning capability with a bounded wait.
///
/// On `Infected` the file is removed here as well, whether or not the scanner
/// already deleted it.
#[derive(Clone)]
pub struct ScanGate {
    scanner: Arc<dyn VirusScanner>,
    timeout: Duration,
}

impl ScanGate {
    pub fn new(scanner: Arc<dyn VirusScanner>, timeout: Duration) -> Self {
        Self { scanner, timeout }
    }

    pub async fn scan(&self, path: &Path) -> ScanVerdict {
        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                return ScanVerdict::ScanFailure {
                    reason: format!("cannot open staged file: {}", e),
                };
            }
        };

        let verdict = match tokio::time::timeout(self.timeout, self.scanner.scan(Box::pin(file)))
            .await
        {
            Err(_) => ScanVerdict::ScanFailure {
                reason: format!("scan timed out after {:?}", self.timeout),
            },
            Ok(Err(e)) => ScanVerdict::ScanFailure {
                reason: e.to_string(),
            },
            Ok(Ok(ScanResult::Error { reason })) => ScanVerdict::ScanFailure { reason },
            Ok(Ok(ScanResult::Infected { threat_name })) => ScanVerdict::Infected { threat_name },
            Ok(Ok(ScanResult::Clean)) => ScanVerdict::Clean,
        };

        if let ScanVerdict::Infected { threat_name } = &verdict {
            tracing::warn!("🚨 Malware detected in {}: {}", path.display(), threat_name);
            match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    tracing::error!("Failed to remove infected file {}: {}", path.display(), e);
                }
                _ => {}
            }
        }

        verdict
    }

    pub async fn health_check(&self) -> bool {
        self.scanner.health_check().await
    }
}
