use super::ui;
use crate::core::ratios;
use crate::core::statements::{FinancialStatement, line_items};
use crate::core::{CompanyInfo, FinancialDataProvider, FinancialStatements};
use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

/// Latest ratios derived from the statements; `None` where an input is missing.
#[derive(Debug, Default, PartialEq)]
pub struct RatioSummary {
    pub debt_ratio: Option<f64>,
    pub interest_coverage: Option<f64>,
    pub ebit_margin: Option<f64>,
    pub capex_ratio: Option<f64>,
    pub working_capital_ratio: Option<f64>,
    pub revenue_cagr: Option<f64>,
    pub cash_flow_growth: Option<f64>,
}

/// Reported values of a line item, oldest first.
fn reported(statement: &FinancialStatement, name: &str) -> Vec<f64> {
    statement
        .values(name)
        .map(|values| values.iter().rev().flatten().copied().collect())
        .unwrap_or_default()
}

/// Earliest and latest reported values of a line item and the number of
/// periods between them, unreported periods included.
fn reported_span(statement: &FinancialStatement, name: &str) -> Option<(f64, f64, u32)> {
    let reported: Vec<(usize, f64)> = statement
        .values(name)?
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    // Periods run most recent first
    let (&(latest_index, latest), &(earliest_index, earliest)) =
        (reported.first()?, reported.last()?);
    let span = u32::try_from(earliest_index - latest_index).ok()?;
    Some((earliest, latest, span))
}

impl RatioSummary {
    pub fn from_statements(statements: &FinancialStatements) -> Self {
        let income = &statements.income_statement;
        RatioSummary {
            debt_ratio: ratios::debt_ratio(&statements.balance_sheet).ok(),
            interest_coverage: ratios::interest_coverage_ratio(income).ok(),
            ebit_margin: ratios::ebit_margin(income).ok(),
            capex_ratio: ratios::capex_ratio(&statements.cash_flow, income).ok(),
            working_capital_ratio: ratios::working_capital_ratio(&statements.balance_sheet, income)
                .ok(),
            revenue_cagr: reported_span(income, line_items::TOTAL_REVENUE).and_then(
                |(earliest, latest, periods)| ratios::calculate_cagr(earliest, latest, periods).ok(),
            ),
            cash_flow_growth: ratios::average_growth_rate(&reported(
                &statements.cash_flow,
                line_items::OPERATING_CASH_FLOW,
            ))
            .ok(),
        }
    }
}

fn info_table(info: &CompanyInfo) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);

    let text = |value: &Option<String>| value.clone().map_or(ui::na_cell(false), Cell::new);
    table.add_row(vec![ui::label_cell("Sector"), text(&info.sector)]);
    table.add_row(vec![ui::label_cell("Industry"), text(&info.industry)]);
    table.add_row(vec![ui::label_cell("Country"), text(&info.country)]);
    table.add_row(vec![ui::label_cell("Website"), text(&info.website)]);
    table.add_row(vec![
        ui::label_cell("Employees"),
        ui::format_optional_cell(info.employees, |e| e.to_string()),
    ]);
    table.add_row(vec![
        ui::label_cell("Market Cap"),
        ui::format_optional_cell(info.market_cap, ui::format_money),
    ]);
    table.add_row(vec![
        ui::label_cell("Current Price"),
        ui::format_optional_cell(info.current_price, |p| format!("{p:.2}")),
    ]);
    table.add_row(vec![
        ui::label_cell("P/E (trailing)"),
        ui::format_optional_cell(info.pe_ratio, |pe| format!("{pe:.2}")),
    ]);
    table.add_row(vec![
        ui::label_cell("Dividend Yield"),
        ui::format_optional_cell(info.dividend_yield, |y| format!("{y:.2}%")),
    ]);
    table.add_row(vec![
        ui::label_cell("Beta"),
        ui::format_optional_cell(info.beta, |b| format!("{b:.2}")),
    ]);
    table.add_row(vec![
        ui::label_cell("52 Week Range"),
        match (info.fifty_two_week_low, info.fifty_two_week_high) {
            (Some(low), Some(high)) => ui::value_cell(format!("{low:.2} - {high:.2}")),
            _ => ui::na_cell(false),
        },
    ]);
    table
}

fn ratio_table(summary: &RatioSummary) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Ratio"), ui::header_cell("Value")]);
    let rows = [
        ("Debt / Assets", summary.debt_ratio.map(ui::format_percent)),
        (
            "Interest Coverage",
            summary.interest_coverage.map(|r| format!("{r:.2}x")),
        ),
        ("EBIT Margin", summary.ebit_margin.map(ui::format_percent)),
        ("Capex / Revenue", summary.capex_ratio.map(ui::format_percent)),
        (
            "Working Capital / Revenue",
            summary.working_capital_ratio.map(ui::format_percent),
        ),
        ("Revenue CAGR", summary.revenue_cagr.map(ui::format_percent)),
        (
            "Operating Cash Flow Growth",
            summary.cash_flow_growth.map(ui::format_percent),
        ),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            ui::format_optional_cell(value, |v| v),
        ]);
    }
    table
}

pub fn display_as_table(info: &CompanyInfo, ratios: Option<&RatioSummary>) -> String {
    let title = match &info.name {
        Some(name) => format!("{name} ({})", info.ticker),
        None => info.ticker.clone(),
    };
    let mut output = format!("{}\n\n", ui::style_text(&title, ui::StyleType::Title));
    output.push_str(&info_table(info).to_string());

    if let Some(ratios) = ratios {
        output.push_str("\n\n");
        output.push_str(&ratio_table(ratios).to_string());
    }

    if let Some(description) = &info.description {
        output.push_str("\n\n");
        output.push_str(&ui::style_text(description, ui::StyleType::Subtle));
    }
    output
}

pub async fn run(ticker: &str, provider: &(dyn FinancialDataProvider + Send + Sync)) -> Result<()> {
    let pb = ui::new_progress_bar(1, true);
    pb.set_message("Fetching company info...");
    let (info, statements) = futures::join!(
        provider.fetch_company_info(ticker),
        provider.fetch_statements(ticker)
    );
    pb.finish_and_clear();

    let info = info.with_context(|| format!("Failed to fetch company info for {ticker}"))?;
    // Ratios are an extra; the info table is still useful without them
    let ratios = match statements {
        Ok(statements) => Some(RatioSummary::from_statements(&statements)),
        Err(e) => {
            tracing::warn!(ticker, error = %e, "Statements unavailable, skipping ratios");
            None
        }
    };

    println!("{}", display_as_table(&info, ratios.as_ref()));
    Ok(())
}
