pub mod cli;
pub mod core;
pub mod providers;

use crate::core::cache::Cache;
use crate::core::config::AppConfig;
use crate::core::ParameterOverrides;
use crate::providers::YahooFinancialsProvider;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// A command that needs the loaded configuration and a data provider.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Analyze {
        tickers: Vec<String>,
        overrides: ParameterOverrides,
        simulations: Option<usize>,
    },
    Info {
        ticker: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("xdcf starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let cache = Arc::new(Cache::new());
    let provider = YahooFinancialsProvider::new(config.yahoo_base_url(), Arc::clone(&cache));

    match command {
        AppCommand::Analyze {
            tickers,
            overrides,
            simulations,
        } => {
            let params = overrides
                .apply(&config.model)
                .context("Invalid model parameters")?;
            let tickers: Vec<String> = tickers.iter().map(|t| t.to_uppercase()).collect();
            cli::analyze::run(&tickers, &provider, &params, simulations).await
        }
        AppCommand::Info { ticker } => cli::info::run(&ticker.to_uppercase(), &provider).await,
    }
}
