use crate::error::ProxyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};
use url::Url;

/// Default request timeout when a provider does not set one
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP verbs the executor is willing to send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Whether a request body is sent for this verb
    pub fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// How the provider token is injected into the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    #[default]
    Bearer,
    /// `<name>: <token>`, e.g. `X-Auth-Key`
    Header { name: String },
}

/// Credential record for a single provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub api_token: String,
    pub base_url: Url,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Sent verbatim with every request to this provider
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ProviderCredentials {
    pub fn new(api_token: impl Into<String>, base_url: Url) -> Self {
        Self {
            api_token: api_token.into(),
            base_url,
            auth: AuthScheme::default(),
            extra_headers: BTreeMap::new(),
            timeout_secs: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    /// Token with everything past the first few characters hidden
    pub fn masked_token(&self) -> String {
        let visible: String = self.api_token.chars().take(4).collect();
        format!("{}...", visible)
    }
}

/// A single request to issue against a provider.
///
/// The method is kept as the caller supplied it; it is validated when the
/// request is executed so that an unsupported verb surfaces as a
/// [`ProxyError::InvalidMethod`] result rather than a construction failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProxyRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ProxyRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn query_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Outcome of one proxied call
pub type ProxyResult = std::result::Result<Option<Value>, ProxyError>;

/// Conversion into the conventional `(payload, error)` pair.
///
/// On a remote failure the decoded body is moved into the payload slot next
/// to the error; every other failure yields `(None, Some(error))`.
pub trait ResultPair {
    fn into_pair(self) -> (Option<Value>, Option<ProxyError>);
}

impl ResultPair for ProxyResult {
    fn into_pair(self) -> (Option<Value>, Option<ProxyError>) {
        match self {
            Ok(payload) => (payload, None),
            Err(ProxyError::Remote {
                status,
                detail,
                body,
            }) => {
                let payload = body.clone();
                (
                    payload,
                    Some(ProxyError::Remote {
                        status,
                        detail,
                        body,
                    }),
                )
            }
            Err(err) => (None, Some(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("Delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("FETCH".parse::<HttpMethod>().is_err());
        assert!("".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_method_display_roundtrips_every_variant() {
        for method in HttpMethod::iter() {
            let text = method.to_string();
            assert_eq!(text, text.to_uppercase());
            assert_eq!(text.parse::<HttpMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_carries_body() {
        assert!(!HttpMethod::Get.carries_body());
        assert!(HttpMethod::Post.carries_body());
        assert!(HttpMethod::Put.carries_body());
        assert!(HttpMethod::Patch.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
        assert!(!HttpMethod::Head.carries_body());
    }

    #[test]
    fn test_request_builder() {
        let request = ProxyRequest::new("GET", "/zones/abc/dns_records")
            .query("per_page", "100")
            .query_params([("page", "2")])
            .body(json!({"ignored": true}));

        assert_eq!(request.method, "GET");
        assert_eq!(request.query.len(), 2);
        assert_eq!(request.query["per_page"], "100");
        assert!(request.body.is_some());
    }

    #[test]
    fn test_credentials_timeout_default() {
        let url = Url::parse("https://api.example.com").unwrap();
        let mut creds = ProviderCredentials::new("secret-token", url);
        assert_eq!(creds.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        creds.timeout_secs = Some(5);
        assert_eq!(creds.timeout(), Duration::from_secs(5));
        assert_eq!(creds.masked_token(), "secr...");
    }

    #[test]
    fn test_into_pair_success() {
        let result: ProxyResult = Ok(Some(json!({"id": 1})));
        let (payload, error) = result.into_pair();
        assert_eq!(payload, Some(json!({"id": 1})));
        assert!(error.is_none());

        let result: ProxyResult = Ok(None);
        assert_eq!(result.into_pair(), (None, None));
    }

    #[test]
    fn test_into_pair_remote_keeps_body() {
        let body = json!({"error": "forbidden"});
        let result: ProxyResult = Err(ProxyError::Remote {
            status: 403,
            detail: Some("forbidden".to_string()),
            body: Some(body.clone()),
        });

        let (payload, error) = result.into_pair();
        assert_eq!(payload, Some(body));
        assert_eq!(error.and_then(|e| e.status()), Some(403));
    }

    #[test]
    fn test_into_pair_local_failure_has_no_payload() {
        let result: ProxyResult = Err(ProxyError::MissingCredential("netlify".into()));
        let (payload, error) = result.into_pair();
        assert!(payload.is_none());
        assert!(matches!(error, Some(ProxyError::MissingCredential(_))));
    }
}
