pub mod config;
pub mod error;
pub mod types;

pub use config::{CredentialStore, known_base_url, load_credentials};
pub use error::{Error, ProxyError, Result};
pub use types::*;
