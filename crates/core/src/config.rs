use crate::error::{Error, ProxyError, Result};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use url::Url;

/// Prefix for credential environment variables
pub const ENV_PREFIX: &str = "PROXY_EXEC_";

const ENV_TOKEN_SUFFIX: &str = "_API_TOKEN";
const ENV_BASE_URL_SUFFIX: &str = "_BASE_URL";

/// Providers whose base URL does not need to be configured
const KNOWN_PROVIDERS: &[(&str, &str)] = &[("cloudflare", "https://api.cloudflare.com/client/v4")];

/// Raw TOML configuration structure
/// This matches the credentials.toml file structure exactly
#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    #[serde(default)]
    providers: BTreeMap<String, RawProvider>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawProvider {
    #[serde(default)]
    api_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_secs: Option<u64>,
    #[serde(default)]
    auth: AuthScheme,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra_headers: BTreeMap<String, String>,
}

/// Read-only credential lookup keyed by provider identity.
///
/// Built once at start-up and handed to the executor; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialStore {
    providers: BTreeMap<String, ProviderCredentials>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a provider while the store is being assembled
    pub fn with_provider(mut self, provider: &str, credentials: ProviderCredentials) -> Self {
        self.providers.insert(normalize_provider(provider), credentials);
        self
    }

    /// Look up the credentials for `provider`
    pub fn resolve(&self, provider: &str) -> std::result::Result<&ProviderCredentials, ProxyError> {
        self.providers
            .get(&normalize_provider(provider))
            .ok_or_else(|| ProxyError::MissingCredential(provider.to_string()))
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &ProviderCredentials)> {
        self.providers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Overlay `PROXY_EXEC_<PROVIDER>_API_TOKEN` / `PROXY_EXEC_<PROVIDER>_BASE_URL`
    /// variables on top of the file configuration.
    ///
    /// Takes the variables explicitly; pass `std::env::vars()` in production.
    pub fn apply_env<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut tokens = BTreeMap::new();
        let mut base_urls = BTreeMap::new();

        for (key, value) in vars {
            let Some(rest) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            if let Some(provider) = rest.strip_suffix(ENV_TOKEN_SUFFIX) {
                tokens.insert(normalize_provider(provider), value.into());
            } else if let Some(provider) = rest.strip_suffix(ENV_BASE_URL_SUFFIX) {
                base_urls.insert(normalize_provider(provider), value.into());
            }
        }

        for (provider, base_url) in &base_urls {
            if provider.is_empty() {
                continue;
            }
            let url = parse_base_url(base_url, provider)?;
            match self.providers.get_mut(provider) {
                Some(existing) => existing.base_url = url,
                None if !tokens.contains_key(provider) => {
                    return Err(Error::ConfigParse(format!(
                        "{}{}{} is set but no API token is configured for '{}'",
                        ENV_PREFIX,
                        provider.to_uppercase(),
                        ENV_BASE_URL_SUFFIX,
                        provider
                    )));
                }
                None => {}
            }
        }

        for (provider, token) in tokens {
            if provider.is_empty() {
                continue;
            }
            if token.trim().is_empty() {
                return Err(Error::ConfigParse(format!(
                    "Empty API token in environment for '{}'",
                    provider
                )));
            }
            if let Some(existing) = self.providers.get_mut(&provider) {
                existing.api_token = token;
                continue;
            }
            let base_url = match base_urls.get(&provider) {
                Some(url) => parse_base_url(url, &provider)?,
                None => default_base_url(&provider)?,
            };
            tracing::debug!(provider = %provider, "credentials loaded from environment");
            self.providers
                .insert(provider, ProviderCredentials::new(token, base_url));
        }

        Ok(self)
    }

    /// Render the store back into credentials.toml form
    pub fn to_toml_string(&self) -> Result<String> {
        let raw = RawConfig {
            providers: self
                .providers
                .iter()
                .map(|(name, creds)| {
                    (
                        name.clone(),
                        RawProvider {
                            api_token: creds.api_token.clone(),
                            base_url: Some(creds.base_url.to_string()),
                            timeout_secs: creds.timeout_secs,
                            auth: creds.auth.clone(),
                            extra_headers: creds.extra_headers.clone(),
                        },
                    )
                })
                .collect(),
        };
        Ok(toml::to_string_pretty(&raw)?)
    }
}

/// Load credentials.toml from a file path.
///
/// A missing file is an empty store, not an error.
pub fn load_credentials<P: AsRef<Path>>(path: P) -> Result<CredentialStore> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no credentials file, starting empty");
        return Ok(CredentialStore::new());
    }
    let content = fs::read_to_string(path)?;
    parse_credentials_str(&content)
}

/// Parse credentials.toml from a string (useful for testing)
pub fn parse_credentials_str(content: &str) -> Result<CredentialStore> {
    let raw: RawConfig = toml::from_str(content)?;

    let mut providers = BTreeMap::new();
    for (name, provider) in raw.providers {
        let key = normalize_provider(&name);
        if key.is_empty() {
            return Err(Error::ConfigParse("Empty provider name".to_string()));
        }
        if providers.contains_key(&key) {
            return Err(Error::ConfigParse(format!(
                "Provider '{}' is configured more than once",
                key
            )));
        }

        if provider.api_token.trim().is_empty() {
            return Err(Error::ConfigParse(format!(
                "Missing api_token in 'providers.{}'",
                key
            )));
        }

        if let AuthScheme::Header { name: header } = &provider.auth {
            if header.trim().is_empty() {
                return Err(Error::ConfigParse(format!(
                    "Empty header name in 'providers.{}.auth'",
                    key
                )));
            }
        }

        let base_url = match &provider.base_url {
            Some(url) => parse_base_url(url, &key)?,
            None => default_base_url(&key)?,
        };

        providers.insert(
            key,
            ProviderCredentials {
                api_token: provider.api_token,
                base_url,
                auth: provider.auth,
                extra_headers: provider.extra_headers,
                timeout_secs: provider.timeout_secs,
            },
        );
    }

    Ok(CredentialStore { providers })
}

fn normalize_provider(provider: &str) -> String {
    provider.trim().to_ascii_lowercase()
}

/// Built-in base URL for well-known providers
pub fn known_base_url(provider: &str) -> Option<&'static str> {
    let provider = normalize_provider(provider);
    KNOWN_PROVIDERS
        .iter()
        .find(|(name, _)| *name == provider)
        .map(|(_, url)| *url)
}

fn default_base_url(provider: &str) -> Result<Url> {
    let known = known_base_url(provider).ok_or_else(|| {
        Error::ConfigParse(format!(
            "Missing base_url for '{}' (no built-in default for this provider)",
            provider
        ))
    })?;
    parse_base_url(known, provider)
}

/// Validate a provider base URL: absolute, http or https
fn parse_base_url(raw: &str, provider: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| {
        Error::ConfigParse(format!("Invalid base_url for '{}': {}", provider, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(Error::ConfigParse(format!(
            "base_url for '{}' must use http or https, got '{}'",
            provider,
            url.scheme()
        )));
    }
    if url.query().is_some() {
        return Err(Error::ConfigParse(format!(
            "base_url for '{}' must not carry a query string",
            provider
        )));
    }
    if url.fragment().is_some() {
        return Err(Error::ConfigParse(format!(
            "base_url for '{}' must not carry a fragment",
            provider
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[providers.cloudflare]
api_token = "cf-token"
        "#;

        let store = parse_credentials_str(toml).unwrap();
        let creds = store.resolve("cloudflare").unwrap();
        assert_eq!(creds.api_token, "cf-token");
        assert_eq!(
            creds.base_url.as_str(),
            "https://api.cloudflare.com/client/v4"
        );
        assert_eq!(creds.auth, AuthScheme::Bearer);
        assert!(creds.extra_headers.is_empty());
    }

    #[test]
    fn test_parse_full_provider() {
        let toml = r#"
[providers.Legacy]
api_token = "global-key"
base_url = "http://localhost:8080/api"
auth = { scheme = "header", name = "X-Auth-Key" }
timeout_secs = 5

[providers.Legacy.extra_headers]
X-Auth-Email = "ops@example.com"
        "#;

        let store = parse_credentials_str(toml).unwrap();
        let creds = store.resolve("legacy").unwrap();
        assert_eq!(
            creds.auth,
            AuthScheme::Header {
                name: "X-Auth-Key".to_string()
            }
        );
        assert_eq!(creds.extra_headers["X-Auth-Email"], "ops@example.com");
        assert_eq!(creds.timeout_secs, Some(5));
        // lookups are case-insensitive
        assert!(store.resolve("LEGACY").is_ok());
    }

    #[test]
    fn test_resolve_missing_provider() {
        let store = parse_credentials_str("").unwrap();
        assert!(store.is_empty());
        let err = store.resolve("cloudflare").unwrap_err();
        assert_eq!(err, ProxyError::MissingCredential("cloudflare".to_string()));
    }

    #[test]
    fn test_rejects_missing_base_url_for_unknown_provider() {
        let toml = r#"
[providers.netlify]
api_token = "tok"
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Missing base_url"));
    }

    #[test]
    fn test_rejects_empty_token() {
        let toml = r#"
[providers.cloudflare]
api_token = "   "
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("providers.cloudflare")
        );
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let toml = r#"
[providers.files]
api_token = "tok"
base_url = "ftp://example.com"
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.unwrap_err().to_string().contains("http or https"));

        let toml = r#"
[providers.files]
api_token = "tok"
base_url = "not a url"
        "#;
        assert!(parse_credentials_str(toml).is_err());
    }

    #[test]
    fn test_rejects_base_url_with_query() {
        let toml = r#"
[providers.api]
api_token = "tok"
base_url = "https://api.example.com/v1?key=1"
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.unwrap_err().to_string().contains("query string"));
    }

    #[test]
    fn test_rejects_base_url_with_fragment() {
        let toml = r#"
[providers.api]
api_token = "tok"
base_url = "https://api.example.com/v4#x"
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.unwrap_err().to_string().contains("fragment"));

        let result = CredentialStore::new().apply_env([
            ("PROXY_EXEC_API_API_TOKEN", "tok"),
            ("PROXY_EXEC_API_BASE_URL", "https://api.example.com/v4#x"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_empty_header_name() {
        let toml = r#"
[providers.api]
api_token = "tok"
base_url = "https://api.example.com"
auth = { scheme = "header", name = "" }
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.unwrap_err().to_string().contains("header name"));
    }

    #[test]
    fn test_rejects_duplicate_after_normalization() {
        let toml = r#"
[providers.cloudflare]
api_token = "a"

[providers.CloudFlare]
api_token = "b"
        "#;

        let result = parse_credentials_str(toml);
        assert!(result.unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_env_adds_known_provider() {
        let store = CredentialStore::new()
            .apply_env([
                ("PROXY_EXEC_CLOUDFLARE_API_TOKEN", "env-token"),
                ("UNRELATED_VAR", "x"),
            ])
            .unwrap();

        let creds = store.resolve("cloudflare").unwrap();
        assert_eq!(creds.api_token, "env-token");
        assert_eq!(creds.base_url.host_str(), Some("api.cloudflare.com"));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let toml = r#"
[providers.cloudflare]
api_token = "file-token"
timeout_secs = 10
        "#;

        let store = parse_credentials_str(toml)
            .unwrap()
            .apply_env([
                ("PROXY_EXEC_CLOUDFLARE_API_TOKEN", "env-token"),
                ("PROXY_EXEC_CLOUDFLARE_BASE_URL", "http://127.0.0.1:9999"),
            ])
            .unwrap();

        let creds = store.resolve("cloudflare").unwrap();
        assert_eq!(creds.api_token, "env-token");
        assert_eq!(creds.base_url.as_str(), "http://127.0.0.1:9999/");
        // untouched fields survive the overlay
        assert_eq!(creds.timeout_secs, Some(10));
    }

    #[test]
    fn test_env_new_provider_with_base_url() {
        let store = CredentialStore::new()
            .apply_env([
                ("PROXY_EXEC_MY_API_BASE_URL", "https://my.example.com/v2"),
                ("PROXY_EXEC_MY_API_API_TOKEN", "tok"),
            ])
            .unwrap();

        let creds = store.resolve("my_api").unwrap();
        assert_eq!(creds.base_url.as_str(), "https://my.example.com/v2");
    }

    #[test]
    fn test_env_base_url_without_token_fails() {
        let result = CredentialStore::new()
            .apply_env([("PROXY_EXEC_ORPHAN_BASE_URL", "https://orphan.example.com")]);
        assert!(result.unwrap_err().to_string().contains("no API token"));
    }

    #[test]
    fn test_env_unknown_provider_without_base_url_fails() {
        let result = CredentialStore::new().apply_env([("PROXY_EXEC_NETLIFY_API_TOKEN", "tok")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_known_base_url() {
        assert_eq!(
            known_base_url("Cloudflare"),
            Some("https://api.cloudflare.com/client/v4")
        );
        assert_eq!(known_base_url("netlify"), None);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = load_credentials(dir.path().join("credentials.toml")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[providers.cloudflare]\napi_token = \"from-disk\"").unwrap();

        let store = load_credentials(file.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.resolve("cloudflare").unwrap().api_token, "from-disk");
    }

    #[test]
    fn test_toml_roundtrip_preserves_store() {
        let mut creds = ProviderCredentials::new(
            "tok",
            Url::parse("https://api.example.com/v1").unwrap(),
        );
        creds.auth = AuthScheme::Header {
            name: "X-Api-Key".to_string(),
        };
        creds
            .extra_headers
            .insert("X-Tenant".to_string(), "acme".to_string());
        let store = CredentialStore::new().with_provider("example", creds);

        let rendered = store.to_toml_string().unwrap();
        assert!(rendered.contains("[providers.example]"));
        assert_eq!(parse_credentials_str(&rendered).unwrap(), store);
    }
}
