//! Financial ratio helpers.
//!
//! Unlike the valuation path, these never substitute defaults: a
//! non-positive denominator is an [`ValuationError::InvalidInput`] and an
//! absent line item is a [`ValuationError::MissingField`].

use crate::core::error::ValuationError;
use crate::core::statements::{FinancialStatement, line_items};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use statrs::statistics::Statistics;
use tracing::debug;

fn invalid(message: impl Into<String>) -> ValuationError {
    ValuationError::InvalidInput(message.into())
}

fn positive(value: f64, what: &str) -> Result<f64, ValuationError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(format!("{what} must be positive, got {value}")))
    }
}

/// Latest values of every name in `required`, or the full list of the
/// names that are absent.
fn latest_values<const N: usize>(
    statement: &FinancialStatement,
    required: [&str; N],
) -> Result<[f64; N], ValuationError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| statement.latest(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValuationError::MissingField(missing));
    }
    let mut values = [0.0; N];
    for (slot, name) in values.iter_mut().zip(required) {
        *slot = statement.require_latest(name)?;
    }
    Ok(values)
}

/// Compound annual growth rate from `start_value` to `end_value`.
pub fn calculate_cagr(start_value: f64, end_value: f64, periods: u32) -> Result<f64, ValuationError> {
    positive(start_value, "start value")?;
    if periods == 0 {
        return Err(invalid("number of periods cannot be zero"));
    }
    if end_value < 0.0 {
        return Err(invalid(format!(
            "end value must not be negative, got {end_value}"
        )));
    }
    if end_value == 0.0 {
        return Ok(-1.0);
    }

    let begin_bal =
        Decimal::from_f64(start_value).ok_or_else(|| invalid("start value is not representable"))?;
    let end_bal =
        Decimal::from_f64(end_value).ok_or_else(|| invalid("end value is not representable"))?;
    let n = Decimal::from(periods);
    // `cagr` divides and raises with panicking Decimal operators
    let within_range = end_bal
        .checked_div(begin_bal)
        .and_then(|ratio| ratio.checked_powd(Decimal::ONE / n))
        .is_some();
    if !within_range {
        return Err(invalid(format!(
            "growth from {start_value} to {end_value} over {periods} periods is out of range"
        )));
    }
    let rate = cagr(begin_bal, end_bal, n);
    debug!("cagr: {begin_bal}, {end_bal}, {periods} = {rate}");

    rate.to_f64()
        .ok_or_else(|| invalid("CAGR is not representable as a float"))
}

/// Mean of the period-over-period growth rates of `values`.
pub fn average_growth_rate(values: &[f64]) -> Result<f64, ValuationError> {
    if values.len() < 2 {
        return Err(invalid("at least two values are required"));
    }
    if values[..values.len() - 1].contains(&0.0) {
        return Err(invalid("zero value encountered in growth calculation"));
    }

    Ok(values
        .windows(2)
        .map(|w| (w[1] - w[0]) / w[0])
        .mean())
}

/// Total debt over total assets.
pub fn debt_ratio(balance_sheet: &FinancialStatement) -> Result<f64, ValuationError> {
    let [debt, assets] = latest_values(
        balance_sheet,
        [line_items::TOTAL_DEBT, line_items::TOTAL_ASSETS],
    )?;
    Ok(debt / positive(assets, "total assets")?)
}

/// EBIT over interest expense.
pub fn interest_coverage_ratio(income_statement: &FinancialStatement) -> Result<f64, ValuationError> {
    let [ebit, interest] = latest_values(
        income_statement,
        [line_items::EBIT, line_items::INTEREST_EXPENSE],
    )?;
    Ok(ebit / positive(interest, "interest expense")?)
}

/// EBIT over revenue.
pub fn ebit_margin(income_statement: &FinancialStatement) -> Result<f64, ValuationError> {
    let [ebit, revenue] = latest_values(
        income_statement,
        [line_items::EBIT, line_items::TOTAL_REVENUE],
    )?;
    Ok(ebit / positive(revenue, "revenue")?)
}

/// Absolute capital expenditure over revenue.
pub fn capex_ratio(
    cash_flow: &FinancialStatement,
    income_statement: &FinancialStatement,
) -> Result<f64, ValuationError> {
    let capex = cash_flow.require_latest(line_items::CAPITAL_EXPENDITURE)?;
    let revenue = income_statement.require_latest(line_items::TOTAL_REVENUE)?;
    Ok(capex.abs() / positive(revenue, "revenue")?)
}

/// Working capital over revenue.
pub fn working_capital_ratio(
    balance_sheet: &FinancialStatement,
    income_statement: &FinancialStatement,
) -> Result<f64, ValuationError> {
    let working_capital = balance_sheet.require_latest(line_items::WORKING_CAPITAL)?;
    let revenue = income_statement.require_latest(line_items::TOTAL_REVENUE)?;
    Ok(working_capital / positive(revenue, "revenue")?)
}

/// Compounds the most recent revenue forward at `growth_rate` for
/// `periods` periods.
pub fn project_revenue(
    historical_revenue: &[f64],
    growth_rate: f64,
    periods: u32,
) -> Result<Vec<f64>, ValuationError> {
    let Some(&last) = historical_revenue.last() else {
        return Err(invalid("at least one historical revenue value is required"));
    };

    Ok((1..=periods)
        .scan(last, |revenue, _| {
            *revenue *= 1.0 + growth_rate;
            Some(*revenue)
        })
        .collect())
}

/// Fills gaps with zero and clips outliers beyond three standard deviations.
pub fn clean_financial_data(statement: &FinancialStatement) -> FinancialStatement {
    statement.cleaned()
}

/// Whether every name in `required` is present in `statement`.
pub fn validate_financial_data(statement: &FinancialStatement, required: &[&str]) -> bool {
    let missing = statement.missing_items(required);
    if !missing.is_empty() {
        debug!(?missing, "Missing required columns");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::line_items::*;
    use super::*;
    use chrono::NaiveDate;

    fn statement(items: &[(&str, f64)]) -> FinancialStatement {
        items.iter().fold(
            FinancialStatement::new(vec![NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()]),
            |st, (name, value)| st.with_item(name, vec![Some(*value)]),
        )
    }

    fn is_invalid<T: std::fmt::Debug>(result: Result<T, ValuationError>) -> bool {
        matches!(result, Err(ValuationError::InvalidInput(_)))
    }

    #[test]
    fn cagr_doubling_over_five_periods() {
        let rate = calculate_cagr(100.0, 200.0, 5).unwrap();
        assert!((rate - 0.1487).abs() < 1e-4, "got {rate}");
    }

    #[test]
    fn cagr_single_period_is_simple_growth() {
        let rate = calculate_cagr(80.0, 100.0, 1).unwrap();
        assert!((rate - 0.25).abs() < 1e-6);
    }

    #[test]
    fn cagr_rejects_invalid_inputs() {
        assert!(is_invalid(calculate_cagr(0.0, 200.0, 5)));
        assert!(is_invalid(calculate_cagr(-10.0, 200.0, 5)));
        assert!(is_invalid(calculate_cagr(100.0, 200.0, 0)));
        assert!(is_invalid(calculate_cagr(100.0, -1.0, 3)));
    }

    #[test]
    fn cagr_rejects_ratios_beyond_decimal_range() {
        assert!(is_invalid(calculate_cagr(1e-10, 1e20, 1)));
        assert!(is_invalid(calculate_cagr(1e-30, 5.0, 2)));
        assert!(is_invalid(calculate_cagr(1e29, 2e29, 2)));
        // Large but representable growth still computes
        let rate = calculate_cagr(1.0, 1e12, 4).unwrap();
        assert!((rate - 999.0).abs() < 0.1, "got {rate}");
    }

    #[test]
    fn cagr_total_loss() {
        assert_eq!(calculate_cagr(100.0, 0.0, 4), Ok(-1.0));
    }

    #[test]
    fn average_growth_of_series() {
        let rate = average_growth_rate(&[100.0, 110.0, 121.0]).unwrap();
        assert!((rate - 0.10).abs() < 1e-12);

        let mixed = average_growth_rate(&[100.0, 120.0, 108.0]).unwrap();
        assert!((mixed - (0.20 - 0.10) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn average_growth_rejects_short_or_zero_series() {
        assert!(is_invalid(average_growth_rate(&[100.0])));
        assert!(is_invalid(average_growth_rate(&[100.0, 0.0, 5.0])));
        // A trailing zero is a valid end point
        assert!(average_growth_rate(&[100.0, 0.0]).is_ok());
    }

    #[test]
    fn debt_ratio_of_balance_sheet() {
        let bs = statement(&[(TOTAL_DEBT, 250.0), (TOTAL_ASSETS, 1000.0)]);
        assert_eq!(debt_ratio(&bs), Ok(0.25));

        let bad = statement(&[(TOTAL_DEBT, 250.0), (TOTAL_ASSETS, 0.0)]);
        assert!(is_invalid(debt_ratio(&bad)));
    }

    #[test]
    fn debt_ratio_names_missing_columns() {
        let bs = statement(&[(CASH, 5.0)]);
        assert_eq!(
            debt_ratio(&bs),
            Err(ValuationError::MissingField(vec![
                TOTAL_DEBT.to_string(),
                TOTAL_ASSETS.to_string()
            ]))
        );
    }

    #[test]
    fn interest_coverage_of_income_statement() {
        let income = statement(&[(EBIT, 500.0), (INTEREST_EXPENSE, 50.0)]);
        assert_eq!(interest_coverage_ratio(&income), Ok(10.0));

        let bad = statement(&[(EBIT, 500.0), (INTEREST_EXPENSE, -50.0)]);
        assert!(is_invalid(interest_coverage_ratio(&bad)));
    }

    #[test]
    fn ebit_margin_of_income_statement() {
        let income = statement(&[(EBIT, 150.0), (TOTAL_REVENUE, 1000.0)]);
        assert_eq!(ebit_margin(&income), Ok(0.15));

        let bad = statement(&[(EBIT, 150.0), (TOTAL_REVENUE, 0.0)]);
        assert!(is_invalid(ebit_margin(&bad)));
        assert!(matches!(
            ebit_margin(&statement(&[(EBIT, 1.0)])),
            Err(ValuationError::MissingField(_))
        ));
    }

    #[test]
    fn capex_ratio_uses_absolute_capex() {
        let cf = statement(&[(CAPITAL_EXPENDITURE, -80.0)]);
        let income = statement(&[(TOTAL_REVENUE, 1000.0)]);
        assert_eq!(capex_ratio(&cf, &income), Ok(0.08));

        let no_revenue = statement(&[(TOTAL_REVENUE, -1.0)]);
        assert!(is_invalid(capex_ratio(&cf, &no_revenue)));
        assert_eq!(
            capex_ratio(&FinancialStatement::default(), &income),
            Err(ValuationError::missing(CAPITAL_EXPENDITURE))
        );
    }

    #[test]
    fn working_capital_ratio_of_statements() {
        let bs = statement(&[(WORKING_CAPITAL, 300.0)]);
        let income = statement(&[(TOTAL_REVENUE, 1200.0)]);
        assert_eq!(working_capital_ratio(&bs, &income), Ok(0.25));

        let zero = statement(&[(TOTAL_REVENUE, 0.0)]);
        assert!(is_invalid(working_capital_ratio(&bs, &zero)));
    }

    #[test]
    fn revenue_projection_compounds_last_value() {
        let projected = project_revenue(&[80.0, 100.0], 0.10, 3).unwrap();
        let expected = [110.0, 121.0, 133.1];
        for (p, e) in projected.iter().zip(expected) {
            assert!((p - e).abs() < 1e-9);
        }
        assert!(project_revenue(&[100.0], 0.1, 0).unwrap().is_empty());
        assert!(is_invalid(project_revenue(&[], 0.1, 3)));
    }

    #[test]
    fn validator_reports_presence_without_failing() {
        let income = statement(&[(EBIT, 1.0), (TOTAL_REVENUE, 2.0)]);
        assert!(validate_financial_data(&income, &[EBIT, TOTAL_REVENUE]));
        assert!(!validate_financial_data(&income, &[EBIT, INTEREST_EXPENSE]));
        assert!(validate_financial_data(&income, &[]));
    }

    #[test]
    fn clean_financial_data_fills_missing() {
        let periods = vec![
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        ];
        let cf = FinancialStatement::new(periods)
            .with_item(CAPITAL_EXPENDITURE, vec![None, Some(-10.0)]);
        let cleaned = clean_financial_data(&cf);
        assert_eq!(cleaned.latest(CAPITAL_EXPENDITURE), Some(0.0));
    }
}
