//! One-shot authenticated request execution.
//!
//! [`ProxyExecutor`] resolves a provider's credentials from its
//! [`CredentialStore`], builds the request, sends it exactly once and folds
//! every outcome into a [`ProxyResult`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use proxy_exec_core::{
    AuthScheme, CredentialStore, HttpMethod, ProviderCredentials, ProxyError, ProxyRequest,
    ProxyResult,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{Span, instrument};
use url::Url;

use crate::Execute;
use crate::response::{decode_body, remote_detail};

/// Executes requests against configured providers.
///
/// ## Examples
///
/// ```rust,ignore
/// use proxy_exec_core::{CredentialStore, ProxyRequest, ResultPair};
/// use proxy_exec_executor::ProxyExecutor;
///
/// let store = CredentialStore::new().apply_env([("PROXY_EXEC_CLOUDFLARE_API_TOKEN", token)])?;
/// let executor = ProxyExecutor::new(store);
///
/// let request = ProxyRequest::new("GET", "/zones/abc/dns_records").query("per_page", "100");
/// let (records, error) = executor.execute("cloudflare", &request).await.into_pair();
/// ```
#[derive(Debug)]
pub struct ProxyExecutor {
    client: reqwest::Client,
    credentials: CredentialStore,
}

impl ProxyExecutor {
    pub fn new(credentials: CredentialStore) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
        }
    }

    /// Issue `request` against `provider` and classify the outcome.
    ///
    /// Method and credential problems are reported before any network I/O.
    /// A non-2xx response yields [`ProxyError::Remote`] carrying the status,
    /// the provider's error detail and the decoded body.
    #[instrument(
        name = "proxy_request",
        skip(self, provider, request),
        fields(
            provider = %provider,
            http.method = tracing::field::Empty,
            http.url = tracing::field::Empty,
            http.status_code = tracing::field::Empty,
        )
    )]
    pub async fn execute(&self, provider: &str, request: &ProxyRequest) -> ProxyResult {
        let method: HttpMethod = request
            .method
            .trim()
            .parse()
            .map_err(|_| ProxyError::InvalidMethod(request.method.clone()))?;
        Span::current().record("http.method", method.to_string().as_str());

        let credentials = self.credentials.resolve(provider)?;

        let url = build_url(&credentials.base_url, &request.path, &request.query)?;
        Span::current().record("http.url", url.as_str());

        let headers = auth_headers(credentials)?;

        let mut builder = self
            .client
            .request(to_reqwest(method), url)
            .headers(headers)
            .timeout(credentials.timeout());

        if let Some(body) = &request.body {
            if method.carries_body() {
                builder = builder.json(body);
            } else {
                tracing::debug!(%method, "ignoring request body for method without payload");
            }
        }

        let response = builder.send().await.map_err(|e| {
            tracing::debug!(error = %e, "transport failure");
            transport_error(&e, credentials)
        })?;

        let status = response.status();
        Span::current().record("http.status_code", status.as_u16());

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(&e, credentials))?;
        let payload = decode_body(&text);

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "provider returned error status");
            return Err(ProxyError::Remote {
                status: status.as_u16(),
                detail: remote_detail(payload.as_ref())
                    .or_else(|| status.canonical_reason().map(str::to_string)),
                body: payload,
            });
        }

        Ok(payload)
    }
}

#[async_trait]
impl Execute for ProxyExecutor {
    async fn execute(&self, provider: &str, request: &ProxyRequest) -> ProxyResult {
        ProxyExecutor::execute(self, provider, request).await
    }
}

fn to_reqwest(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
    }
}

/// Prefix `path` with the provider base URL and append the query pairs.
fn build_url(
    base: &Url,
    path: &str,
    query: &BTreeMap<String, String>,
) -> Result<Url, ProxyError> {
    // anything after the path would swallow the appended segment
    let mut base = base.clone();
    base.set_fragment(None);
    base.set_query(None);
    let base = base.as_str().trim_end_matches('/');

    let joined = if path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };

    let mut url = Url::parse(&joined)
        .map_err(|e| ProxyError::InvalidRequest(format!("invalid URL '{}': {}", joined, e)))?;

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }

    Ok(url)
}

/// Credential and extra headers for one provider
fn auth_headers(credentials: &ProviderCredentials) -> Result<HeaderMap, ProxyError> {
    let mut headers = HeaderMap::new();

    for (name, value) in &credentials.extra_headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| ProxyError::InvalidRequest(format!("invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::try_from(value.as_str()).map_err(|e| {
            ProxyError::InvalidRequest(format!("invalid value for header '{}': {}", name, e))
        })?;
        headers.insert(name, value);
    }

    let (name, raw) = match &credentials.auth {
        AuthScheme::Bearer => (AUTHORIZATION, format!("Bearer {}", credentials.api_token)),
        AuthScheme::Header { name } => {
            let name = HeaderName::try_from(name.as_str()).map_err(|e| {
                ProxyError::InvalidRequest(format!("invalid auth header name '{}': {}", name, e))
            })?;
            (name, credentials.api_token.clone())
        }
    };

    // never echo the token itself in the error
    let mut value = HeaderValue::try_from(raw)
        .map_err(|_| ProxyError::InvalidRequest("API token is not a valid header value".into()))?;
    value.set_sensitive(true);
    headers.insert(name, value);

    Ok(headers)
}

fn transport_error(err: &reqwest::Error, credentials: &ProviderCredentials) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Transport(format!(
            "request timed out after {}s",
            credentials.timeout().as_secs()
        ))
    } else if err.is_connect() {
        ProxyError::Transport(format!("connection failed: {}", err))
    } else {
        ProxyError::Transport(err.to_string())
    }
}
