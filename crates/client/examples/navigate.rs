//! Drive a local DevTools endpoint: subscribe to page events, enable the
//! Page domain, navigate, and print what comes back.
//!
//! Point WIREMUX_URL at a page target (`ws://127.0.0.1:9222/devtools/page/<id>`)
//! before running.

use serde_json::json;

use wiremux_client::{Client, ClientConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ClientConfig::from_env()?;
    let client = Client::new(&config)?;
    client.connect().await?;

    client
        .on_event("Page.loadEventFired", |event| {
            tracing::info!(params = ?event.params, "page finished loading");
        })
        .await?;

    let enabled = client.execute("Page.enable", None).await?;
    if enabled.is_error() {
        anyhow::bail!("Page.enable failed: {:?}", enabled.error);
    }

    let reply = client
        .execute(
            "Page.navigate",
            Some(json!({"url": "https://www.rust-lang.org"})),
        )
        .await?;
    if reply.is_error() {
        anyhow::bail!("navigation failed: {:?}", reply.error);
    }
    tracing::info!(result = ?reply.result, "navigation started");

    tokio::time::sleep(std::time::Duration::from_secs(3)).await;
    client.disconnect().await?;
    Ok(())
}
