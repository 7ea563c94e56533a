use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xdcf::core::ParameterOverrides;
use xdcf::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Estimate intrinsic value per share with a discounted cash flow model
    Analyze {
        /// One or more ticker symbols, e.g. AAPL MSFT
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Years of explicit cash flow forecast
        #[arg(long)]
        years: Option<u32>,

        /// Perpetual growth rate after the forecast, e.g. 0.025
        #[arg(long)]
        terminal_growth: Option<f64>,

        #[arg(long)]
        risk_free_rate: Option<f64>,

        #[arg(long)]
        market_risk_premium: Option<f64>,

        #[arg(long)]
        tax_rate: Option<f64>,

        /// Comma separated yearly growth rates, the last one repeats
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        growth_rates: Option<Vec<f64>>,

        /// Also run a Monte Carlo simulation with this many draws
        #[arg(long)]
        simulations: Option<usize>,
    },
    /// Display company profile and financial ratios
    Info {
        ticker: String,
    },
}

impl From<Commands> for xdcf::AppCommand {
    fn from(cmd: Commands) -> xdcf::AppCommand {
        match cmd {
            Commands::Analyze {
                tickers,
                years,
                terminal_growth,
                risk_free_rate,
                market_risk_premium,
                tax_rate,
                growth_rates,
                simulations,
            } => xdcf::AppCommand::Analyze {
                tickers,
                overrides: ParameterOverrides {
                    forecast_years: years,
                    terminal_growth,
                    risk_free_rate,
                    market_risk_premium,
                    tax_rate,
                    growth_rates,
                },
                simulations,
            },
            Commands::Info { ticker } => xdcf::AppCommand::Info { ticker },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => xdcf::cli::setup::setup_at_path(path),
            None => xdcf::cli::setup::setup(),
        },
        Some(cmd) => xdcf::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
