use anyhow::{Context, Result};
use clap::Args;
use proxy_exec_core::{ProxyError, ProxyRequest, ResultPair};
use proxy_exec_executor::{Execute, ProxyExecutor};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;

use super::config::load_store;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD)
    pub method: String,

    /// Provider-relative path, e.g. /zones/<id>/dns_records
    pub path: String,

    /// Provider key used to look up credentials
    #[arg(short, long, default_value = "cloudflare")]
    pub provider: String,

    /// Query parameter as key=value (repeatable)
    #[arg(short, long = "query", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,

    /// JSON request body
    #[arg(short, long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the JSON request body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,
}

/// Parse a `key=value` query argument
fn parse_query_pair(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty query key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Turn command-line arguments into a request descriptor
fn build_request(args: &ExecArgs) -> Result<ProxyRequest> {
    let body = match (&args.body, &args.body_file) {
        (Some(raw), _) => Some(serde_json::from_str::<Value>(raw).context("--body is not valid JSON")?),
        (None, Some(path)) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Some(
                serde_json::from_str::<Value>(&raw)
                    .with_context(|| format!("{} is not valid JSON", path.display()))?,
            )
        }
        (None, None) => None,
    };

    let mut request =
        ProxyRequest::new(&args.method, &args.path).query_params(args.query.iter().cloned());
    request.body = body;
    Ok(request)
}

/// Error as printed in the `error` slot
fn error_json(err: &ProxyError) -> Value {
    let mut value = json!({
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let ProxyError::Remote { status, detail, .. } = err {
        value["status"] = json!(status);
        value["detail"] = json!(detail);
    }
    value
}

/// Render the `(result, error)` pair for output
pub fn render_pair(payload: Option<&Value>, error: Option<&ProxyError>) -> Value {
    json!({
        "result": payload,
        "error": error.map(error_json),
    })
}

/// Run one request and render its pair
pub async fn execute_and_render<E>(
    executor: &E,
    provider: &str,
    request: &ProxyRequest,
) -> (Value, Option<ProxyError>)
where
    E: Execute + Sync + ?Sized,
{
    let (payload, error) = executor.execute(provider, request).await.into_pair();
    (render_pair(payload.as_ref(), error.as_ref()), error)
}

/// Execute a single proxied call and print the result pair
pub async fn run(config: Option<PathBuf>, args: ExecArgs) -> Result<()> {
    let request = build_request(&args)?;
    let store = load_store(config.as_deref())?;
    let executor = ProxyExecutor::new(store);

    let (rendered, error) = execute_and_render(&executor, &args.provider, &request).await;
    println!("{}", serde_json::to_string_pretty(&rendered)?);

    match error {
        Some(err) => Err(anyhow::Error::new(err).context(format!(
            "{} {} via '{}' failed",
            request.method.to_uppercase(),
            request.path,
            args.provider
        ))),
        None => Ok(()),
    }
}
