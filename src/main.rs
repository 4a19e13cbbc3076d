#[macro_use]
extern crate log;

use airplay_voice_bridge::config;
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return Err(e);
        }
    };

    start(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}

#[cfg(feature = "discord")]
async fn start(config: &config::Config) -> Result<()> {
    // Both ring and aws-lc may be compiled in through the TLS stack, pick one explicitly
    let _ = rustls::crypto::ring::default_provider().install_default();

    airplay_voice_bridge::discord::init(config).await
}

#[cfg(not(feature = "discord"))]
async fn start(_config: &config::Config) -> Result<()> {
    anyhow::bail!("built without the `discord` feature, nothing to stream to")
}
