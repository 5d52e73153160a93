use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (ARTICLEGEN_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("ARTICLEGEN_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("articlegen_server=info".parse()?)
        .add_directive("articlegen_core=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = articlegen_server::config::ServerConfig::parse();
    tracing::info!("Starting article generator on {}", config.listen_addr);
    tracing::info!(
        "Azure deployment {} at {} (api-version {})",
        config.azure_deployment,
        config.azure_endpoint,
        config.azure_api_version
    );
    if config.api_key.is_none() {
        tracing::info!("No fallback API key configured; users must enter one in the form");
    }
    if config.skip_probe {
        tracing::warn!("Connectivity probe disabled");
    }

    let server = articlegen_server::server::Server::new(config);
    server.run().await
}
