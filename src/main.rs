use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use eodms_api_client::app;
use eodms_api_client::cli::Cli;
use eodms_api_client::config::{Config, Credentials};
use eodms_api_client::eodms::EodmsClient;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.log_verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .init();

    let config = Config::locate(cli.config.as_deref())?;
    let credentials = Credentials::resolve(
        cli.username.clone(),
        cli.password.clone(),
        &config.credentials,
        None,
    )?;
    debug!("Using EODMS account {}", credentials.username);

    let client = EodmsClient::new(&config.service, credentials)?;
    app::run(&cli, &config, &client, Utc::now()).await?;

    Ok(())
}
