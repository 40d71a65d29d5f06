use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use sf_copier::api::SalesforceClient;
use sf_copier::auth::Credentials;
use sf_copier::cli::commands::{
    copy_command, deploy_command, folders_command, items_command, status_command,
};
use sf_copier::cli::{Cli, Commands};
use sf_copier::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials and overrides may live in .env, so load it before reading config
    let credentials = match &cli.env_file {
        Some(path) => Credentials::from_env_file(&path.to_string_lossy()),
        None => {
            dotenvy::dotenv().ok();
            Credentials::from_env()
        }
    };

    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config)?;
    info!("Starting sf-copier");
    debug!("Config: {:?}", config);

    let credentials = credentials.context("Salesforce credentials are not configured")?;
    let client = SalesforceClient::connect(&credentials, &config.api_version, config.poll_config())
        .await
        .context("Failed to log in to Salesforce")?;

    match cli.command {
        Commands::Folders(args) => folders_command(args, &client).await,
        Commands::Items(args) => items_command(args, &client).await,
        Commands::Copy(args) => copy_command(args, &client, &config).await,
        Commands::Deploy(args) => deploy_command(args, &client, &config).await,
        Commands::Status(args) => status_command(args, &client, &config).await,
    }
}

/// `RUST_LOG` wins over the configured level
fn init_logging(config: &Config) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = &config.log_file {
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}
