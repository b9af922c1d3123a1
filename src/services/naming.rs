use crate::utils::validation::{NameError, sanitize_filename};
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Turns untrusted client filenames into `<ingestionToken>-<sanitizedName>` storage names.
///
/// The token is the ingestion time in microseconds, bumped past the last issued
/// token so that two names handed out by the same sanitizer never share one,
/// even inside the same clock tick.
#[derive(Debug, Default)]
pub struct NameSanitizer {
    last_token: AtomicI64,
}

impl NameSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sanitize(&self, original_name: &str) -> Result<String, NameError> {
        let base = sanitize_filename(original_name)?;
        Ok(format!("{}-{}", self.next_token(), base))
    }

    fn next_token(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);
        now.max(previous + 1)
    }
}
