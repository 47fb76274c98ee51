// Cloudflare v4 response envelope

use serde::Deserialize;
use serde_json::Value;

/// Cloudflare API response wrapper
///
/// Every v4 endpoint answers with this envelope, on success and failure.
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
}

impl CloudflareResponse {
    /// Parse the envelope out of an already decoded body.
    ///
    /// Returns `None` when the body does not look like a Cloudflare envelope.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        if !object.contains_key("success") {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// All error messages joined, with their codes, or `None` if there are none
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let summary = self
            .errors
            .iter()
            .map(|e| {
                if e.code != 0 {
                    format!("{} (code {})", e.message, e.code)
                } else {
                    e.message.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("; ");
        Some(summary)
    }
}
