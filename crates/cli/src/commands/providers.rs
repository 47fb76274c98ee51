use anyhow::Result;
use proxy_exec_core::{AuthScheme, CredentialStore};
use std::path::PathBuf;

use super::config::{config_path, load_store};

/// One line per provider, token masked
fn describe(store: &CredentialStore) -> Vec<String> {
    store
        .providers()
        .map(|(name, creds)| {
            let auth = match &creds.auth {
                AuthScheme::Bearer => "bearer".to_string(),
                AuthScheme::Header { name } => format!("header {}", name),
            };
            format!(
                "{:<16} {}  token={}  auth={}",
                name,
                creds.base_url,
                creds.masked_token(),
                auth
            )
        })
        .collect()
}

/// List configured providers
pub fn run(config: Option<PathBuf>) -> Result<()> {
    let path = config_path(config.as_deref())?;
    let store = load_store(Some(&path))?;

    if store.is_empty() {
        println!("No providers configured.");
        println!("   Run 'proxy-exec configure <provider>' or set PROXY_EXEC_<PROVIDER>_API_TOKEN");
        return Ok(());
    }

    println!("📋 Providers ({}):", path.display());
    for line in describe(&store) {
        println!("   {}", line);
    }

    Ok(())
}
