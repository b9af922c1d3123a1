#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use file_intake::config::IntakeConfig;
use file_intake::infrastructure::storage::setup_storage;
use file_intake::services::scanner::{ScanResult, VirusScanner};
use file_intake::{AppState, create_app};
use http_body_util::BodyExt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tower::ServiceExt;

pub const MIB: usize = 1024 * 1024;
pub const BOUNDARY: &str = "------------------------intake0123456789";
pub const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
pub const EICAR_MARKER: &[u8] = b"EICAR-STANDARD-ANTIVIRUS-TEST-FILE";

pub struct TestApp {
    pub app: Router,
    pub root: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new(config: IntakeConfig, scanner: Arc<dyn VirusScanner>) -> Self {
        let dir = TempDir::new().unwrap();
        let config = IntakeConfig {
            upload_dir: dir.path().join("uploads"),
            ..config
        };
        let layout = setup_storage(&config).await.unwrap();
        let root = layout.root.clone();
        let app = create_app(AppState::new(config, layout, scanner));

        Self {
            app,
            root,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn upload(&self, parts: &[Part<'_>]) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/uploads")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Names of committed files, sorted
    pub fn committed(&self) -> Vec<String> {
        list_files(&self.root)
    }

    pub fn staged(&self) -> Vec<String> {
        list_files(&self.root.join(".staging"))
    }
}

pub struct Part<'a> {
    pub field: &'a str,
    pub filename: Option<&'a str>,
    pub content_type: &'a str,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(filename: &'a str, content_type: &'a str, data: Vec<u8>) -> Self {
        Self {
            field: "files",
            filename: Some(filename),
            content_type,
            data,
        }
    }

    pub fn png(filename: &'a str, len: usize) -> Self {
        Self::file(filename, "image/png", png_bytes(len))
    }
}

pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = PNG_HEADER.to_vec();
    data.extend((0..len.saturating_sub(PNG_HEADER.len())).map(|i| (i % 251) as u8));
    data
}

pub fn infected_png() -> Vec<u8> {
    let mut data = PNG_HEADER.to_vec();
    data.extend_from_slice(b"....");
    data.extend_from_slice(EICAR_MARKER);
    data
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    part.field, filename, part.content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    part.field
                )
                .as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn list_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Flags any content carrying the EICAR test marker
pub struct MarkerScanner;

#[async_trait]
impl VirusScanner for MarkerScanner {
    async fn scan(&self, mut reader: Pin<Box<dyn AsyncRead + Send>>) -> anyhow::Result<ScanResult> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;

        if data.windows(EICAR_MARKER.len()).any(|w| w == EICAR_MARKER) {
            Ok(ScanResult::Infected {
                threat_name: "Eicar-Test-Signature".to_string(),
            })
        } else {
            Ok(ScanResult::Clean)
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Behaves like an unreachable scanner daemon
pub struct OfflineScanner;

#[async_trait]
impl VirusScanner for OfflineScanner {
    async fn scan(&self, _reader: Pin<Box<dyn AsyncRead + Send>>) -> anyhow::Result<ScanResult> {
        Err(anyhow::anyhow!("connection refused"))
    }

    async fn health_check(&self) -> bool {
        false
    }
}

/// Clean verdict after a fixed delay, like a busy scanner daemon
pub struct SlowScanner(pub std::time::Duration);

#[async_trait]
impl VirusScanner for SlowScanner {
    async fn scan(&self, _reader: Pin<Box<dyn AsyncRead + Send>>) -> anyhow::Result<ScanResult> {
        tokio::time::sleep(self.0).await;
        Ok(ScanResult::Clean)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
