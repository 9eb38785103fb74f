pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::{chat, stdio};
pub use cli::{Cli, RunMode};
pub use config::AppConfig;
pub use domain::types;
pub use infrastructure::{generate, server};

use chat::ChatService;
use generate::OllamaGenerator;
use std::env;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    // In stdio mode stdout carries the JSON protocol, so logging stays off.
    let quiet_mode = matches!(cli.mode, RunMode::Stdio);
    init_tracing(quiet_mode);
    dotenvy::dotenv().ok();

    info!("Starting ciao-ai");
    debug!(
        mode = ?cli.mode,
        config = ?cli.config,
        system = ?cli.system,
        "CLI arguments parsed"
    );

    let config_path = cli.config.as_deref().map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    if let Some(path) = config_path {
        info!(path = %path.display(), "Loaded configuration from file");
    } else {
        info!("Loaded configuration from default path");
    }
    apply_env_overrides(&mut config);
    apply_cli_overrides(&cli, &mut config);

    let system_prompt = config.compose_system_prompt(cli.system.as_deref());
    debug!(
        model = config.model.as_str(),
        endpoint = config.endpoint.as_str(),
        timeout_secs = config.request_timeout.as_secs(),
        "Building response generator"
    );
    let generator = OllamaGenerator::new(config.endpoint.clone(), config.model.clone())
        .with_system_prompt(system_prompt);
    let service = Arc::new(ChatService::with_timeout(generator, config.request_timeout));

    info!(mode = ?cli.mode, "Running in selected mode");
    match cli.mode {
        RunMode::Stdio => {
            stdio::run(service).await?;
        }
        RunMode::Rest => {
            info!(addr = %cli.rest_addr, "Starting REST server");
            server::serve(service, cli.rest_addr).await?;
        }
    }
    info!("Execution finished");
    Ok(())
}

fn init_tracing(quiet: bool) {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = if quiet {
            EnvFilter::new("off")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
        };
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = env::var("CIAO_OLLAMA_URL") {
        info!(url = url.as_str(), "Overriding endpoint from environment");
        config.endpoint = url;
    }
    if let Ok(model) = env::var("CIAO_MODEL") {
        info!(model = model.as_str(), "Overriding model from environment");
        config.model = model;
    }
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) {
    if let Some(url) = &cli.ollama_url {
        info!(url = url.as_str(), "Overriding endpoint from CLI flag");
        config.endpoint = url.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
}
