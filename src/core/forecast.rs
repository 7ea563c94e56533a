//! Free cash flow baseline and forward projection.

use crate::core::error::ValuationError;
use crate::core::params::ModelParameters;
use crate::core::statements::{FinancialStatement, line_items};
use serde::{Deserialize, Serialize};

/// Baseline used when the cash flow statement cannot supply one.
pub const FALLBACK_FREE_CASH_FLOW: f64 = 100_000_000.0;

pub const INITIAL_GROWTH_RATE: f64 = 0.05;
pub const GROWTH_RATE_DECAY: f64 = 0.005;
pub const GROWTH_RATE_FLOOR: f64 = 0.02;

/// Starting point of a forecast and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Baseline {
    pub free_cash_flow: f64,
    /// Set when the statement could not be used and the fixed fallback was
    /// substituted.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastYear {
    pub year: u32,
    pub growth_rate: f64,
    pub free_cash_flow: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastSchedule {
    years: Vec<ForecastYear>,
}

impl ForecastSchedule {
    pub fn years(&self) -> &[ForecastYear] {
        &self.years
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn growth_rates(&self) -> Vec<f64> {
        self.years.iter().map(|y| y.growth_rate).collect()
    }

    pub fn cash_flows(&self) -> Vec<f64> {
        self.years.iter().map(|y| y.free_cash_flow).collect()
    }

    pub fn final_cash_flow(&self) -> Option<f64> {
        self.years.last().map(|y| y.free_cash_flow)
    }
}

/// Operating cash flow plus capital expenditure for the latest period.
/// Capital expenditure is reported as a negative figure.
pub fn historical_free_cash_flow(cash_flow: &FinancialStatement) -> Result<f64, ValuationError> {
    let missing = cash_flow.missing_items(&[
        line_items::OPERATING_CASH_FLOW,
        line_items::CAPITAL_EXPENDITURE,
    ]);
    if !missing.is_empty() {
        return Err(ValuationError::MissingField(
            missing.into_iter().map(str::to_string).collect(),
        ));
    }

    let operating = cash_flow.require_latest(line_items::OPERATING_CASH_FLOW)?;
    let capex = cash_flow.require_latest(line_items::CAPITAL_EXPENDITURE)?;
    Ok(operating + capex)
}

/// Historical free cash flow, or [`FALLBACK_FREE_CASH_FLOW`] when the
/// statement is empty or lacks the required line items.
pub fn baseline_free_cash_flow(cash_flow: &FinancialStatement) -> Baseline {
    if cash_flow.is_empty() {
        return Baseline {
            free_cash_flow: FALLBACK_FREE_CASH_FLOW,
            fallback_reason: Some("cash flow statement is empty".to_string()),
        };
    }

    match historical_free_cash_flow(cash_flow) {
        Ok(free_cash_flow) => Baseline {
            free_cash_flow,
            fallback_reason: None,
        },
        Err(e) => Baseline {
            free_cash_flow: FALLBACK_FREE_CASH_FLOW,
            fallback_reason: Some(e.to_string()),
        },
    }
}

/// Default schedule: 5% in the first year, 0.5 points less each following
/// year, never below 2%.
pub fn decaying_growth_rates(years: u32) -> Vec<f64> {
    (0..years)
        .map(|i| (INITIAL_GROWTH_RATE - GROWTH_RATE_DECAY * f64::from(i)).max(GROWTH_RATE_FLOOR))
        .collect()
}

/// Growth rates for the configured horizon, honouring custom rates.
pub fn growth_rates(params: &ModelParameters) -> Vec<f64> {
    match params.growth_rates.as_deref() {
        Some(custom @ [.., last]) => (0..params.forecast_years as usize)
            .map(|i| custom.get(i).copied().unwrap_or(*last))
            .collect(),
        _ => decaying_growth_rates(params.forecast_years),
    }
}

/// Compounds `baseline` forward, one year per growth rate.
pub fn project(baseline: f64, growth_rates: &[f64]) -> ForecastSchedule {
    let mut current = baseline;
    let years = growth_rates
        .iter()
        .zip(1..)
        .map(|(&growth_rate, year)| {
            current *= 1.0 + growth_rate;
            ForecastYear {
                year,
                growth_rate,
                free_cash_flow: current,
            }
        })
        .collect();
    ForecastSchedule { years }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use line_items::{CAPITAL_EXPENDITURE, OPERATING_CASH_FLOW};

    fn cash_flow(ocf: Option<f64>, capex: Option<f64>) -> FinancialStatement {
        let mut cf = FinancialStatement::new(vec![
            NaiveDate::from_ymd_opt(2024, 9, 30).unwrap(),
            NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
        ]);
        if let Some(ocf) = ocf {
            cf.insert(OPERATING_CASH_FLOW, vec![Some(ocf), Some(1.0)]);
        }
        if let Some(capex) = capex {
            cf.insert(CAPITAL_EXPENDITURE, vec![Some(capex), Some(-1.0)]);
        }
        cf
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn five_year_default_schedule() {
        assert_close(
            &decaying_growth_rates(5),
            &[0.05, 0.045, 0.04, 0.035, 0.03],
        );
    }

    #[test]
    fn default_schedule_is_non_increasing_and_floored() {
        let rates = decaying_growth_rates(15);
        assert!(rates.windows(2).all(|w| w[1] <= w[0]));
        assert!(rates.iter().all(|&g| g >= GROWTH_RATE_FLOOR));
        assert_eq!(rates[14], 0.02);
    }

    #[test]
    fn projection_compounds_from_baseline() {
        let schedule = project(100.0, &decaying_growth_rates(2));
        assert_close(&schedule.cash_flows(), &[105.0, 109.725]);
        assert_eq!(schedule.years()[0].year, 1);
        assert_eq!(schedule.years()[1].year, 2);
        assert!((schedule.final_cash_flow().unwrap() - 109.725).abs() < 1e-9);
    }

    #[test]
    fn historical_fcf_adds_negative_capex() {
        let cf = cash_flow(Some(1.5e8), Some(-5e7));
        assert_eq!(historical_free_cash_flow(&cf), Ok(1e8));

        let baseline = baseline_free_cash_flow(&cf);
        assert_eq!(baseline.free_cash_flow, 1e8);
        assert!(baseline.fallback_reason.is_none());
    }

    #[test]
    fn missing_line_items_fall_back() {
        let cf = cash_flow(Some(1.5e8), None);
        assert_eq!(
            historical_free_cash_flow(&cf),
            Err(ValuationError::missing(CAPITAL_EXPENDITURE))
        );

        let baseline = baseline_free_cash_flow(&cf);
        assert_eq!(baseline.free_cash_flow, FALLBACK_FREE_CASH_FLOW);
        assert!(baseline.fallback_reason.unwrap().contains(CAPITAL_EXPENDITURE));
    }

    #[test]
    fn empty_statement_falls_back() {
        let baseline = baseline_free_cash_flow(&FinancialStatement::default());
        assert_eq!(baseline.free_cash_flow, 100_000_000.0);
        assert!(baseline.fallback_reason.is_some());
    }

    #[test]
    fn unreported_latest_value_falls_back() {
        let mut cf = cash_flow(Some(1.0), Some(-1.0));
        cf.insert(OPERATING_CASH_FLOW, vec![None, Some(2.0)]);
        assert_eq!(
            baseline_free_cash_flow(&cf).free_cash_flow,
            FALLBACK_FREE_CASH_FLOW
        );
    }

    #[test]
    fn custom_growth_rates_extend_with_last_rate() {
        let params = ModelParameters {
            forecast_years: 4,
            growth_rates: Some(vec![0.10, 0.08]),
            ..Default::default()
        };
        assert_eq!(growth_rates(&params), vec![0.10, 0.08, 0.08, 0.08]);

        let params = ModelParameters {
            forecast_years: 1,
            growth_rates: Some(vec![0.10, 0.08]),
            ..Default::default()
        };
        assert_eq!(growth_rates(&params), vec![0.10]);
    }

    #[test]
    fn absent_custom_rates_use_default_schedule() {
        let params = ModelParameters::default();
        assert_eq!(growth_rates(&params), decaying_growth_rates(5));
    }
}
