use pairlink::{PairlinkError, PairlinkServerBuilder, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), PairlinkError> {
    init_tracing();

    let config = ServerConfig::from_env()?;
    let server = PairlinkServerBuilder::from_config(config).build().await?;

    server.run_until(ctrl_c()).await
}

/// Logs to stderr, honoring `RUST_LOG` and defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves on Ctrl-C. Without a signal handler the server runs until killed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
