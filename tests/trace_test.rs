mod common;

use axum::http::StatusCode;
use common::*;
use file_intake::config::IntakeConfig;
use file_intake::services::scanner::NoOpScanner;
use std::io::Write;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn test_request_span_carries_generated_request_id() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = TestApp::new(IntakeConfig::development(), Arc::new(NoOpScanner)).await;

    // No client-supplied id, so the middleware generates one
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response.headers()["x-request-id"]
        .to_str()
        .unwrap()
        .to_string();

    let output = logs.text();
    assert!(
        output.contains(&format!("request_id={}", request_id)),
        "request span lacks the generated id: {}",
        output
    );
    assert!(!output.contains("request_id=unknown"));
}
