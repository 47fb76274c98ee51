// Authenticated API-proxy executor

pub mod cloudflare;
mod executor;
mod response;

pub use executor::ProxyExecutor;
pub use response::{decode_body, remote_detail};

use async_trait::async_trait;
use proxy_exec_core::{ProxyRequest, ProxyResult};

/// Issues one request on behalf of a caller, injecting provider credentials.
///
/// Implementations never panic on a failed call; every failure comes back
/// as the `Err` side of the [`ProxyResult`].
#[async_trait]
pub trait Execute {
    async fn execute(&self, provider: &str, request: &ProxyRequest) -> ProxyResult;
}
