//! josgen command-line client
//!
//! Drives the organization API through the authenticated gateway:
//! 1. Loads config (file, env, flags)
//! 2. Opens the token file holding the session between invocations
//! 3. Runs one sub-command and prints its JSON result on stdout
//!
//! Logs go to stderr, filtered by LOG_LEVEL or RUST_LOG.

mod commands;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use josgen_auth::TokenStore;
use josgen_gateway::{AuthGateway, LogRedirect, LoginRedirect};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::Command;
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "josgen", version, about = "Command-line client for the josgen organization API")]
struct Cli {
    /// Config file (default: CONFIG_PATH, then ./josgen.toml if present)
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override api.base_url
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override ui.default_language
    #[arg(long, global = true)]
    language: Option<String>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

/// Stands in for the login screen: there is nothing to navigate to, so the
/// user is told how to sign in again.
struct CliRedirect;

impl LoginRedirect for CliRedirect {
    fn redirect_to_login(&self) {
        LogRedirect.redirect_to_login();
        eprintln!("Session expired. Run `josgen login` to sign in again.");
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let (path, explicit) = Config::resolve_path(cli.config.as_deref());

    let mut config = if explicit || path.exists() {
        info!(path = %path.display(), "loading configuration");
        Config::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?
    } else {
        debug!("no config file, using defaults and environment");
        Config::from_env().context("invalid environment configuration")?
    };

    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(language) = &cli.language {
        config.ui.default_language = language.clone();
    }
    config.validate().context("invalid command-line override")?;

    info!(
        base_url = %config.api.base_url,
        timeout_ms = config.api.timeout_ms,
        language = %config.ui.default_language,
        "configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(&cli)?;

    let token_file = config.token_file();
    let tokens = TokenStore::file(&token_file)
        .with_context(|| format!("failed to open token file {}", token_file.display()))?;

    let gateway = AuthGateway::new(config.gateway_config(), tokens, Arc::new(CliRedirect))
        .context("failed to initialize API gateway")?;

    let output = commands::run(cli.command, &gateway, &config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
