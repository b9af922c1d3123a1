use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default image types accepted by the intake endpoint
pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

/// Intake configuration for uploads, quota and scanning
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Flat storage directory for committed files (default: "uploads")
    pub upload_dir: PathBuf,

    /// Aggregate byte ceiling across all committed files (default: 100 MiB)
    pub max_storage: u64,

    /// Maximum size of a single file in bytes (default: 4 MiB)
    pub max_file_size: u64,

    /// Maximum number of files per upload request (default: 5)
    pub max_files: usize,

    /// Declared MIME types that are staged at all
    pub allowed_mime_types: Vec<String>,

    /// Enable virus scanning (default: true)
    pub enable_virus_scan: bool,

    /// Virus scanner type: "clamav" or "noop" (default: "clamav")
    pub virus_scanner_type: String,

    /// ClamAV host (default: "127.0.0.1")
    pub clamav_host: String,

    /// ClamAV port (default: 3310)
    pub clamav_port: u16,

    /// Upper bound on a single scan before it counts as a scan failure (default: 30s)
    pub scan_timeout: Duration,

    /// Sniff leading bytes and reject content that contradicts the declared type (default: true)
    pub verify_content_signature: bool,

    /// Listen address (default: 127.0.0.1:3000)
    pub bind_addr: SocketAddr,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_storage: 100 * 1024 * 1024, // 100 MiB
            max_file_size: 4 * 1024 * 1024, // 4 MiB
            max_files: 5,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
                .iter()
                .map(|m| m.to_string())
                .collect(),
            enable_virus_scan: true,
            virus_scanner_type: "clamav".to_string(),
            clamav_host: "127.0.0.1".to_string(),
            clamav_port: 3310,
            scan_timeout: Duration::from_secs(30),
            verify_content_signature: true,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl IntakeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_storage: parse_var("MAX_STORAGE").unwrap_or(default.max_storage),

            max_file_size: parse_var("MAX_FILE_SIZE").unwrap_or(default.max_file_size),

            max_files: parse_var("MAX_FILES_PER_REQUEST").unwrap_or(default.max_files),

            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .ok()
                .map(|v| parse_mime_list(&v))
                .filter(|list| !list.is_empty())
                .unwrap_or(default.allowed_mime_types),

            enable_virus_scan: env::var("ENABLE_VIRUS_SCAN")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.enable_virus_scan),

            virus_scanner_type: env::var("VIRUS_SCANNER_TYPE")
                .unwrap_or(default.virus_scanner_type),

            clamav_host: env::var("CLAMAV_HOST").unwrap_or(default.clamav_host),

            clamav_port: parse_var("CLAMAV_PORT").unwrap_or(default.clamav_port),

            scan_timeout: parse_var("SCAN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.scan_timeout),

            verify_content_signature: env::var("VERIFY_CONTENT_SIGNATURE")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.verify_content_signature),

            bind_addr: parse_var("BIND_ADDR").unwrap_or(default.bind_addr),
        }
    }

    /// Create config for development (no virus scanning)
    pub fn development() -> Self {
        Self {
            enable_virus_scan: false,
            virus_scanner_type: "noop".to_string(),
            ..Self::default()
        }
    }

    /// Create config for production (scanning required)
    pub fn production() -> Self {
        let default = Self::default();
        Self {
            enable_virus_scan: true,
            virus_scanner_type: "clamav".to_string(),
            clamav_host: env::var("CLAMAV_HOST").unwrap_or(default.clamav_host.clone()),
            clamav_port: parse_var("CLAMAV_PORT").unwrap_or(default.clamav_port),
            ..default
        }
    }

    /// Largest request body the transport layer will accept
    pub fn request_body_limit(&self) -> usize {
        let files = self.max_file_size.saturating_mul(self.max_files as u64);
        usize::try_from(files)
            .unwrap_or(usize::MAX)
            .saturating_add(1024 * 1024) // multipart framing overhead
    }
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_mime_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IntakeConfig::default();
        assert_eq!(config.max_storage, 100 * 1024 * 1024);
        assert_eq!(config.max_file_size, 4 * 1024 * 1024);
        assert_eq!(config.max_files, 5);
        assert_eq!(
            config.allowed_mime_types,
            vec!["image/jpeg", "image/png", "image/gif"]
        );
        assert!(config.enable_virus_scan);
        assert_eq!(config.virus_scanner_type, "clamav");
    }

    #[test]
    fn test_development_config() {
        let config = IntakeConfig::development();
        assert!(!config.enable_virus_scan);
        assert_eq!(config.virus_scanner_type, "noop");
        assert_eq!(config.max_storage, 100 * 1024 * 1024);
    }

    #[test]
    fn test_production_config() {
        let config = IntakeConfig::production();
        assert!(config.enable_virus_scan);
        assert_eq!(config.virus_scanner_type, "clamav");
    }

    #[test]
    fn test_request_body_limit_covers_full_batch() {
        let config = IntakeConfig::default();
        assert_eq!(
            config.request_body_limit(),
            5 * 4 * 1024 * 1024 + 1024 * 1024
        );
    }

    #[test]
    fn test_parse_mime_list() {
        assert_eq!(
            parse_mime_list(" image/PNG, ,image/gif "),
            vec!["image/png", "image/gif"]
        );
        assert!(parse_mime_list(" , ").is_empty());
    }
}
