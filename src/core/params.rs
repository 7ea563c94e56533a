//! Model parameters and per-run overrides

use crate::core::error::ValuationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FORECAST_YEARS: u32 = 5;
pub const DEFAULT_TERMINAL_GROWTH: f64 = 0.03;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.035;
pub const DEFAULT_MARKET_RISK_PREMIUM: f64 = 0.05;
pub const DEFAULT_TAX_RATE: f64 = 0.21;
pub const DEFAULT_COST_OF_DEBT: f64 = 0.05;
pub const MAX_FORECAST_YEARS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub forecast_years: u32,
    pub terminal_growth: f64,
    pub risk_free_rate: f64,
    pub market_risk_premium: f64,
    pub tax_rate: f64,
    pub cost_of_debt: f64,
    /// Explicit yearly growth rates. The last rate repeats when the list is
    /// shorter than the horizon. `None` selects the decaying default schedule.
    pub growth_rates: Option<Vec<f64>>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        ModelParameters {
            forecast_years: DEFAULT_FORECAST_YEARS,
            terminal_growth: DEFAULT_TERMINAL_GROWTH,
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            market_risk_premium: DEFAULT_MARKET_RISK_PREMIUM,
            tax_rate: DEFAULT_TAX_RATE,
            cost_of_debt: DEFAULT_COST_OF_DEBT,
            growth_rates: None,
        }
    }
}

impl ModelParameters {
    /// Checks the parameters in isolation. The terminal growth versus
    /// discount rate invariant depends on the company and is checked when
    /// the analysis runs.
    pub fn validate(&self) -> Result<(), ValuationError> {
        if self.forecast_years == 0 {
            return Err(ValuationError::InvalidParameter(
                "forecast horizon must be at least one year".to_string(),
            ));
        }
        if self.forecast_years > MAX_FORECAST_YEARS {
            return Err(ValuationError::InvalidParameter(format!(
                "forecast horizon must be at most {MAX_FORECAST_YEARS} years, got {}",
                self.forecast_years
            )));
        }

        let rates = [
            ("terminal growth", self.terminal_growth),
            ("risk-free rate", self.risk_free_rate),
            ("market risk premium", self.market_risk_premium),
            ("tax rate", self.tax_rate),
            ("cost of debt", self.cost_of_debt),
        ];
        if let Some((name, value)) = rates.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValuationError::InvalidParameter(format!(
                "{name} must be a finite number, got {value}"
            )));
        }

        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(ValuationError::InvalidParameter(format!(
                "tax rate must be in [0, 1), got {}",
                self.tax_rate
            )));
        }

        if let Some(growth_rates) = &self.growth_rates {
            if growth_rates.is_empty() {
                return Err(ValuationError::InvalidParameter(
                    "custom growth rates must not be empty".to_string(),
                ));
            }
            if let Some(rate) = growth_rates.iter().find(|g| !g.is_finite() || **g <= -1.0) {
                return Err(ValuationError::InvalidParameter(format!(
                    "growth rate {rate} is not a usable growth rate"
                )));
            }
        }

        Ok(())
    }
}

/// Caller supplied what-if values layered over configured parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterOverrides {
    pub forecast_years: Option<u32>,
    pub terminal_growth: Option<f64>,
    pub risk_free_rate: Option<f64>,
    pub market_risk_premium: Option<f64>,
    pub tax_rate: Option<f64>,
    pub growth_rates: Option<Vec<f64>>,
}

impl ParameterOverrides {
    /// Returns `base` with every provided override applied, validated.
    pub fn apply(&self, base: &ModelParameters) -> Result<ModelParameters, ValuationError> {
        let params = ModelParameters {
            forecast_years: self.forecast_years.unwrap_or(base.forecast_years),
            terminal_growth: self.terminal_growth.unwrap_or(base.terminal_growth),
            risk_free_rate: self.risk_free_rate.unwrap_or(base.risk_free_rate),
            market_risk_premium: self.market_risk_premium.unwrap_or(base.market_risk_premium),
            tax_rate: self.tax_rate.unwrap_or(base.tax_rate),
            cost_of_debt: base.cost_of_debt,
            growth_rates: self
                .growth_rates
                .clone()
                .or_else(|| base.growth_rates.clone()),
        };
        params.validate()?;
        Ok(params)
    }
}
