use super::ui;
use crate::core::simulation::{self, MonteCarloSummary, SimulationSpread};
use crate::core::valuation::log_event;
use crate::core::{DcfModel, FinancialDataProvider, ModelParameters, ValuationResult};
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;

/// Outcome of valuing one ticker. Failures are kept per ticker so one bad
/// symbol does not hide the others.
pub struct TickerReport {
    pub ticker: String,
    pub valuation: Result<ValuationResult, String>,
    pub simulation: Option<Result<MonteCarloSummary, String>>,
}

impl TickerReport {
    pub fn display_as_table(&self) -> String {
        let mut output = format!(
            "Ticker: {}\n\n",
            ui::style_text(&self.ticker, ui::StyleType::Title)
        );

        let result = match &self.valuation {
            Ok(result) => result,
            Err(e) => {
                output.push_str(&ui::style_text(
                    &format!("Valuation failed: {e}"),
                    ui::StyleType::Error,
                ));
                return output;
            }
        };

        output.push_str(&summary_table(result).to_string());
        output.push_str("\n\n");
        output.push_str(&forecast_table(result).to_string());

        match &self.simulation {
            Some(Ok(summary)) => {
                output.push_str(&format!(
                    "\n\n{}\n",
                    ui::style_text("Monte Carlo (equity value)", ui::StyleType::TotalLabel)
                ));
                output.push_str(&simulation_table(summary).to_string());
            }
            Some(Err(e)) => {
                output.push_str("\n\n");
                output.push_str(&ui::style_text(
                    &format!("Simulation failed: {e}"),
                    ui::StyleType::Error,
                ));
            }
            None => {}
        }

        output
    }
}

fn summary_table(result: &ValuationResult) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

    let price = (result.current_price > 0.0).then_some(result.current_price);
    table.add_row(vec![
        ui::label_cell("Intrinsic Value / Share"),
        ui::highlight_cell(format!("{:.2}", result.per_share_value)),
    ]);
    table.add_row(vec![
        ui::label_cell("Current Price"),
        ui::format_optional_cell(price, |p| format!("{p:.2}")),
    ]);
    table.add_row(vec![
        ui::label_cell("Upside"),
        result.upside().map_or(ui::na_cell(false), ui::change_cell),
    ]);

    let rows = [
        ("Enterprise Value", ui::format_money(result.enterprise_value)),
        ("Equity Value", ui::format_money(result.equity_value)),
        ("Terminal Value", ui::format_money(result.terminal_value)),
        ("Discount Rate", ui::format_percent(result.discount_rate)),
        ("Beta", format!("{:.2}", result.beta)),
        ("Market Cap", ui::format_money(result.market_cap)),
        ("Total Debt", ui::format_money(result.total_debt)),
        ("Cash", ui::format_money(result.cash)),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), ui::value_cell(value)]);
    }
    table
}

fn forecast_table(result: &ValuationResult) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Year"),
        ui::header_cell("Growth"),
        ui::header_cell("Free Cash Flow"),
    ]);
    for (i, (growth, cash_flow)) in result
        .growth_rates
        .iter()
        .zip(&result.forecasted_cash_flows)
        .enumerate()
    {
        table.add_row(vec![
            Cell::new(i + 1),
            ui::value_cell(ui::format_percent(*growth)),
            ui::value_cell(ui::format_money(*cash_flow)),
        ]);
    }
    table
}

fn simulation_table(summary: &MonteCarloSummary) -> comfy_table::Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Draws"),
        ui::header_cell("Mean"),
        ui::header_cell("Median"),
        ui::header_cell("Std Dev"),
        ui::header_cell("95% Range"),
    ]);
    table.add_row(vec![
        ui::value_cell(summary.num_simulations.to_string()),
        ui::value_cell(ui::format_money(summary.mean)),
        ui::value_cell(ui::format_money(summary.median)),
        ui::value_cell(ui::format_money(summary.std)),
        ui::value_cell(format!(
            "{} to {}",
            ui::format_money(summary.ci_lower),
            ui::format_money(summary.ci_upper)
        )),
    ]);
    table
}

/// Loads every ticker concurrently and values each one with `params`.
pub async fn analyze_tickers(
    tickers: &[String],
    provider: &(dyn FinancialDataProvider + Send + Sync),
    params: &ModelParameters,
    simulations: Option<usize>,
) -> Vec<TickerReport> {
    let pb = ui::new_progress_bar(tickers.len() as u64, true);
    pb.set_message("Fetching financials...");

    let model_futures = tickers.iter().map(|ticker| {
        let pb_clone = pb.clone();
        async move {
            let model = DcfModel::load(provider, ticker).await;
            pb_clone.inc(1);
            (ticker.clone(), model)
        }
    });
    let models = join_all(model_futures).await;
    pb.finish_and_clear();

    models
        .into_iter()
        .map(|(ticker, model)| {
            let valuation = model
                .run_analysis(params, &log_event)
                .map_err(|e| e.to_string());
            let simulation = match (&valuation, simulations) {
                (Ok(_), Some(n)) => Some(
                    simulation::simulate(
                        &model,
                        params,
                        n,
                        SimulationSpread::default(),
                        &mut rand::thread_rng(),
                    )
                    .map_err(|e| e.to_string()),
                ),
                _ => None,
            };
            TickerReport {
                ticker,
                valuation,
                simulation,
            }
        })
        .collect()
}

pub async fn run(
    tickers: &[String],
    provider: &(dyn FinancialDataProvider + Send + Sync),
    params: &ModelParameters,
    simulations: Option<usize>,
) -> Result<()> {
    if tickers.is_empty() {
        println!("No tickers given to analyze.");
        return Ok(());
    }

    let reports = analyze_tickers(tickers, provider, params, simulations).await;
    let count = reports.len();
    for (i, report) in reports.iter().enumerate() {
        println!("{}", report.display_as_table());
        if i < count - 1 {
            ui::print_separator();
        }
    }

    Ok(())
}
