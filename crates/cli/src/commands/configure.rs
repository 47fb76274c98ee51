use anyhow::{Context, Result};
use proxy_exec_core::{CredentialStore, ProviderCredentials, known_base_url};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use url::Url;

use super::config::{config_path, load_file_store, save_store};

/// Helper to read user input
fn read_input(input: &mut impl BufRead, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Prompt for a provider's credentials, using `existing` values as defaults
fn prompt_credentials(
    input: &mut impl BufRead,
    provider: &str,
    existing: Option<&ProviderCredentials>,
) -> Result<ProviderCredentials> {
    let api_token = match existing {
        Some(current) => {
            let entered = read_input(
                input,
                &format!("API Token [current: {}]: ", current.masked_token()),
            )?;
            if entered.is_empty() {
                current.api_token.clone()
            } else {
                entered
            }
        }
        None => read_input(input, "API Token: ")?,
    };

    if api_token.is_empty() {
        anyhow::bail!("API token is required");
    }

    let default_url = existing
        .map(|c| c.base_url.to_string())
        .or_else(|| known_base_url(provider).map(str::to_string));
    let base_url = match default_url {
        Some(default) => {
            let entered = read_input(input, &format!("Base URL [{}]: ", default))?;
            if entered.is_empty() { default } else { entered }
        }
        None => read_input(input, "Base URL: ")?,
    };

    if base_url.is_empty() {
        anyhow::bail!("Base URL is required for '{}'", provider);
    }
    let base_url = Url::parse(&base_url).with_context(|| format!("Invalid base URL '{}'", base_url))?;

    // keep auth scheme, headers and timeout from an earlier configuration
    let mut credentials = existing
        .cloned()
        .unwrap_or_else(|| ProviderCredentials::new(String::new(), base_url.clone()));
    credentials.api_token = api_token;
    credentials.base_url = base_url;
    Ok(credentials)
}

fn configure_with(
    input: &mut impl BufRead,
    path: &std::path::Path,
    provider: &str,
) -> Result<CredentialStore> {
    let store = load_file_store(path)?;
    let existing = store.resolve(provider).ok().cloned();

    let credentials = prompt_credentials(input, provider, existing.as_ref())?;
    let store = store.with_provider(provider, credentials);

    save_store(path, &store)?;
    Ok(store)
}

/// Configure credentials for a provider
pub fn run(config: Option<PathBuf>, provider: &str) -> Result<()> {
    let path = config_path(config.as_deref())?;

    println!("🔧 Configuring provider '{}'...\n", provider);
    if provider.eq_ignore_ascii_case("cloudflare") {
        println!("📋 Create a Cloudflare API token at:");
        println!("   https://dash.cloudflare.com/profile/api-tokens");
        println!();
    }

    let stdin = io::stdin();
    let store = configure_with(&mut stdin.lock(), &path, provider)?;

    println!();
    println!("✅ Configuration saved to: {}", path.display());
    println!("   Providers configured: {}", store.len());
    println!();
    println!(
        "🚀 Try: proxy-exec exec GET /user/tokens/verify --provider {}",
        provider
    );

    Ok(())
}
