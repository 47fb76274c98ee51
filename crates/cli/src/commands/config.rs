use anyhow::{Context, Result};
use proxy_exec_core::CredentialStore;
use proxy_exec_core::config::{load_credentials, parse_credentials_str};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Get path to the credentials file
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home)
        .join(".proxy-exec")
        .join("credentials.toml"))
}

/// Load the credentials file only, without environment overrides
pub fn load_file_store(path: &Path) -> Result<CredentialStore> {
    load_credentials(path)
        .with_context(|| format!("Failed to load credentials from {}", path.display()))
}

/// Environment variables that are valid UTF-8; anything else is skipped
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Load the credentials file and overlay `PROXY_EXEC_*` environment variables
pub fn load_store(explicit: Option<&Path>) -> Result<CredentialStore> {
    load_store_with_env(explicit, utf8_vars(std::env::vars_os()))
}

pub fn load_store_with_env<I>(explicit: Option<&Path>, vars: I) -> Result<CredentialStore>
where
    I: IntoIterator<Item = (String, String)>,
{
    let path = config_path(explicit)?;
    let store = load_file_store(&path)?
        .apply_env(vars)
        .context("Invalid credentials in environment")?;
    tracing::debug!(providers = store.len(), "credential store loaded");
    Ok(store)
}

/// Save the credential store, readable by the owner only
pub fn save_store(path: &Path, store: &CredentialStore) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let contents = store
        .to_toml_string()
        .context("Failed to serialize credentials")?;

    // refuse to write something we could not read back
    parse_credentials_str(&contents).context("Serialized credentials do not parse")?;

    fs::write(path, contents).context("Failed to write credentials file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .context("Failed to restrict credentials file permissions")?;
    }

    Ok(())
}
