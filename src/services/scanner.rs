use crate::config::IntakeConfig;
use anyhow::{Result, anyhow};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Result of a virus scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// File is clean (no threats detected)
    Clean,
    /// File is infected with malware
    Infected { threat_name: String },
    /// Scan could not be completed
    Error { reason: String },
}

/// Trait for virus scanning implementations
#[async_trait::async_trait]
pub trait VirusScanner: Send + Sync {
    /// Scan file content for malware using a stream
    async fn scan(&self, reader: Pin<Box<dyn AsyncRead + Send>>) -> Result<ScanResult>;

    /// Check if the scanner is available/healthy
    async fn health_check(&self) -> bool;
}

/// ClamAV scanner using TCP socket (clamd)
///
/// Docker command to run ClamAV:
/// ```bash
/// docker run -d --name clamav -p 3310:3310 clamav/clamav:latest
/// ```
pub struct ClamAvScanner {
    host: String,
    port: u16,
}

impl ClamAvScanner {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(config.clamav_host.clone(), config.clamav_port)
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = format!("{}:{}", self.host, self.port);
        TcpStream::connect(&addr)
            .await
            .map_err(|e| anyhow!("Failed to connect to ClamAV at {}: {}", addr, e))
    }
}

/// Interprets a clamd reply such as `stream: OK` or `stream: Eicar-Signature FOUND`
pub fn parse_clamd_response(raw: &[u8]) -> ScanResult {
    let response = String::from_utf8_lossy(raw);
    let response = response.trim_end_matches('\0').trim();

    if response.ends_with("OK") {
        ScanResult::Clean
    } else if let Some(found) = response.strip_suffix("FOUND") {
        let threat = found
            .rsplit_once(':')
            .map(|(_, threat)| threat)
            .unwrap_or(found)
            .trim();
        ScanResult::Infected {
            threat_name: if threat.is_empty() {
                "Unknown threat".to_string()
            } else {
                threat.to_string()
            },
        }
    } else if response.contains("ERROR") {
        ScanResult::Error {
            reason: response.to_string(),
        }
    } else {
        ScanResult::Error {
            reason: format!("Unexpected ClamAV response: {}", response),
        }
    }
}

#[async_trait::async_trait]
impl VirusScanner for ClamAvScanner {
    async fn scan(&self, mut reader: Pin<Box<dyn AsyncRead + Send>>) -> Result<ScanResult> {
        let mut stream = self.connect().await?;

        // INSTREAM framing: zINSTREAM\0 <length:u32 big-endian> <data> ... <0:u32>
        stream.write_all(b"zINSTREAM\0").await?;

        const CHUNK_SIZE: usize = 64 * 1024;
        let mut buffer = vec![0u8; CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }

            stream.write_all(&(n as u32).to_be_bytes()).await?;
            stream.write_all(&buffer[..n]).await?;
        }

        stream.write_all(&0u32.to_be_bytes()).await?;
        stream.flush().await?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;

        tracing::debug!("ClamAV response: {}", String::from_utf8_lossy(&response));

        Ok(parse_clamd_response(&response))
    }

    async fn health_check(&self) -> bool {
        match self.connect().await {
            Ok(mut stream) => {
                if stream.write_all(b"zPING\0").await.is_err() {
                    return false;
                }
                if stream.flush().await.is_err() {
                    return false;
                }

                let mut response = [0u8; 16];
                match stream.read(&mut response).await {
                    Ok(n) => String::from_utf8_lossy(&response[..n]).contains("PONG"),
                    Err(_) => false,
                }
            }
            Err(_) => false,
        }
    }
}

/// No-op scanner for development/testing
pub struct NoOpScanner;

#[async_trait::async_trait]
impl VirusScanner for NoOpScanner {
    async fn scan(&self, _reader: Pin<Box<dyn AsyncRead + Send>>) -> Result<ScanResult> {
        tracing::warn!("NoOpScanner: Skipping virus scan (development mode)");
        Ok(ScanResult::Clean)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Scanner that always returns infected (for testing)
#[cfg(test)]
pub struct AlwaysInfectedScanner;

#[cfg(test)]
#[async_trait::async_trait]
impl VirusScanner for AlwaysInfectedScanner {
    async fn scan(&self, _reader: Pin<Box<dyn AsyncRead + Send>>) -> Result<ScanResult> {
        Ok(ScanResult::Infected {
            threat_name: "Test.Virus.EICAR".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Factory function to create appropriate scanner based on config
pub fn create_scanner(config: &IntakeConfig) -> Arc<dyn VirusScanner> {
    if !config.enable_virus_scan {
        return Arc::new(NoOpScanner);
    }

    match config.virus_scanner_type.to_lowercase().as_str() {
        "clamav" => Arc::new(ClamAvScanner::from_config(config)),
        "noop" | "none" | "disabled" => Arc::new(NoOpScanner),
        other => {
            tracing::warn!("Unknown scanner type '{}', using NoOpScanner", other);
            Arc::new(NoOpScanner)
        }
    }
}
