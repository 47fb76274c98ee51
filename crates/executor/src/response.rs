//! Response body decoding and provider error extraction.

use serde_json::Value;

use crate::cloudflare::CloudflareResponse;

/// Decode a response body.
///
/// Empty (or whitespace-only) bodies decode to `None`, JSON bodies to the
/// parsed value, and anything else to a JSON string holding the raw text.
pub fn decode_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(text.to_string())),
    }
}

/// Pull a human-readable error detail out of a failed response body.
///
/// Tried in order: Cloudflare `errors[].message`, a string `error` field,
/// `error.message`, a string `message` field, then the raw text of a
/// non-JSON body.
pub fn remote_detail(body: Option<&Value>) -> Option<String> {
    let body = body?;

    if let Some(summary) = CloudflareResponse::from_value(body).and_then(|e| e.error_summary()) {
        return Some(summary);
    }

    match body {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Object(object) => {
            if let Some(Value::String(error)) = object.get("error") {
                return Some(error.clone());
            }
            if let Some(message) = object
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
            {
                return Some(message.to_string());
            }
            object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        }
        _ => None,
    }
}
