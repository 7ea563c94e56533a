//! Discounted cash flow valuation of a single company.
//!
//! [`DcfModel`] holds the profile and statements fetched for one ticker and
//! values the company for any number of [`ModelParameters`] sets. The model
//! never mutates after construction, so what-if runs can share it.

use crate::core::company::{CompanyProfile, FinancialDataProvider, FinancialStatements};
use crate::core::discount;
use crate::core::error::ValuationError;
use crate::core::forecast::{self, ForecastSchedule};
use crate::core::params::ModelParameters;
use crate::core::terminal::{present_value, terminal_value};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub ticker: String,
    pub enterprise_value: f64,
    pub equity_value: f64,
    pub terminal_value: f64,
    pub discount_rate: f64,
    pub forecast_years: u32,
    pub growth_rates: Vec<f64>,
    pub forecasted_cash_flows: Vec<f64>,
    pub per_share_value: f64,
    pub current_price: f64,
    pub beta: f64,
    pub market_cap: f64,
    pub total_debt: f64,
    pub cash: f64,
}

impl ValuationResult {
    /// Per-share value relative to the market price, `None` without a price.
    pub fn upside(&self) -> Option<f64> {
        (self.current_price > 0.0)
            .then(|| (self.per_share_value - self.current_price) / self.current_price)
    }
}

/// Progress of an analysis, reported to the observer passed to
/// [`DcfModel::run_analysis`].
#[derive(Debug)]
pub enum AnalysisEvent<'a> {
    BaselineFallback { ticker: &'a str, reason: &'a str },
    DiscountRate { ticker: &'a str, rate: f64 },
    Forecast { ticker: &'a str, schedule: &'a ForecastSchedule },
    TerminalValue { ticker: &'a str, value: f64, present_value: f64 },
    Completed { result: &'a ValuationResult },
}

/// Observer that forwards analysis events to `tracing`.
pub fn log_event(event: &AnalysisEvent) {
    match event {
        AnalysisEvent::BaselineFallback { ticker, reason } => {
            warn!(ticker, reason, "Using fallback free cash flow baseline");
        }
        AnalysisEvent::DiscountRate { ticker, rate } => {
            debug!(ticker, rate, "Computed discount rate");
        }
        AnalysisEvent::Forecast { ticker, schedule } => {
            debug!(ticker, cash_flows = ?schedule.cash_flows(), "Forecasted free cash flows");
        }
        AnalysisEvent::TerminalValue {
            ticker,
            value,
            present_value,
        } => {
            debug!(ticker, value, present_value, "Computed terminal value");
        }
        AnalysisEvent::Completed { result } => {
            debug!(
                ticker = %result.ticker,
                equity_value = result.equity_value,
                per_share_value = result.per_share_value,
                "Analysis completed"
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct DcfModel {
    profile: CompanyProfile,
    statements: FinancialStatements,
}

impl DcfModel {
    pub fn new(profile: CompanyProfile, statements: FinancialStatements) -> Self {
        DcfModel {
            profile,
            statements,
        }
    }

    /// Fetches company data, substituting fallback figures for whatever the
    /// provider cannot supply.
    pub async fn load(provider: &(dyn FinancialDataProvider + Send + Sync), ticker: &str) -> Self {
        let (profile, statements) = futures::join!(
            provider.fetch_profile(ticker),
            provider.fetch_statements(ticker)
        );

        let profile = profile.unwrap_or_else(|e| {
            warn!(ticker, error = %e, "Profile unavailable, using fallback figures");
            CompanyProfile::fallback(ticker)
        });
        let statements = statements.unwrap_or_else(|e| {
            warn!(ticker, error = %e, "Statements unavailable, continuing without them");
            FinancialStatements::default()
        });

        Self::new(profile, statements)
    }

    /// Fetches company data and fails if the provider does.
    pub async fn load_strict(
        provider: &(dyn FinancialDataProvider + Send + Sync),
        ticker: &str,
    ) -> Result<Self> {
        let profile = provider
            .fetch_profile(ticker)
            .await
            .with_context(|| format!("Failed to fetch profile for {ticker}"))?;
        let statements = provider
            .fetch_statements(ticker)
            .await
            .with_context(|| format!("Failed to fetch statements for {ticker}"))?;
        Ok(Self::new(profile, statements))
    }

    pub fn profile(&self) -> &CompanyProfile {
        &self.profile
    }

    pub fn statements(&self) -> &FinancialStatements {
        &self.statements
    }

    pub fn discount_rate(&self, params: &ModelParameters) -> f64 {
        discount::discount_rate(&self.profile, params)
    }

    pub fn baseline(&self) -> forecast::Baseline {
        forecast::baseline_free_cash_flow(&self.statements.cash_flow)
    }

    pub fn forecast(&self, params: &ModelParameters) -> ForecastSchedule {
        forecast::project(
            self.baseline().free_cash_flow,
            &forecast::growth_rates(params),
        )
    }

    /// Runs the full valuation for `params`.
    ///
    /// Missing statement data degrades to fallbacks. Fails only for invalid
    /// parameters, including a discount rate that does not exceed the
    /// terminal growth rate.
    pub fn run_analysis(
        &self,
        params: &ModelParameters,
        observer: &dyn Fn(&AnalysisEvent),
    ) -> Result<ValuationResult, ValuationError> {
        params.validate()?;
        let ticker = self.profile.ticker.as_str();

        let rate = self.discount_rate(params);
        observer(&AnalysisEvent::DiscountRate { ticker, rate });

        let baseline = self.baseline();
        if let Some(reason) = &baseline.fallback_reason {
            observer(&AnalysisEvent::BaselineFallback { ticker, reason });
        }
        let schedule = forecast::project(baseline.free_cash_flow, &forecast::growth_rates(params));
        observer(&AnalysisEvent::Forecast {
            ticker,
            schedule: &schedule,
        });

        let result = self.value(rate, &schedule, params.terminal_growth)?;
        observer(&AnalysisEvent::TerminalValue {
            ticker,
            value: result.terminal_value,
            present_value: present_value(result.terminal_value, rate, result.forecast_years),
        });
        observer(&AnalysisEvent::Completed { result: &result });

        Ok(result)
    }

    /// Discounts `schedule` and its terminal value at `rate` and converts the
    /// enterprise value into equity and per-share values.
    pub(crate) fn value(
        &self,
        rate: f64,
        schedule: &ForecastSchedule,
        terminal_growth: f64,
    ) -> Result<ValuationResult, ValuationError> {
        if rate <= terminal_growth {
            return Err(ValuationError::InvalidParameter(format!(
                "discount rate {rate:.4} must exceed terminal growth {terminal_growth:.4}"
            )));
        }
        let final_cash_flow = schedule.final_cash_flow().ok_or_else(|| {
            ValuationError::InvalidParameter("forecast schedule is empty".to_string())
        })?;
        let horizon = schedule.len() as u32;

        let pv_cash_flows: f64 = schedule
            .years()
            .iter()
            .map(|y| present_value(y.free_cash_flow, rate, y.year))
            .sum();
        let terminal = terminal_value(final_cash_flow, terminal_growth, rate);
        let pv_terminal = present_value(terminal, rate, horizon);

        let enterprise_value = pv_cash_flows + pv_terminal;
        let equity_value = enterprise_value - self.profile.total_debt + self.profile.cash;
        let per_share_value = if self.profile.shares_outstanding > 0.0 {
            equity_value / self.profile.shares_outstanding
        } else {
            0.0
        };

        Ok(ValuationResult {
            ticker: self.profile.ticker.clone(),
            enterprise_value,
            equity_value,
            terminal_value: terminal,
            discount_rate: rate,
            forecast_years: horizon,
            growth_rates: schedule.growth_rates(),
            forecasted_cash_flows: schedule.cash_flows(),
            per_share_value,
            current_price: self.profile.current_price,
            beta: self.profile.beta,
            market_cap: self.profile.market_cap,
            total_debt: self.profile.total_debt,
            cash: self.profile.cash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::company::CompanyInfo;
    use crate::core::statements::{FinancialStatement, line_items};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::cell::RefCell;

    fn reference_profile() -> CompanyProfile {
        CompanyProfile {
            ticker: "REF".to_string(),
            beta: 1.2,
            market_cap: 1e9,
            total_debt: 2e8,
            cash: 1e8,
            shares_outstanding: 1e8,
            current_price: 15.0,
        }
    }

    fn statements_with_fcf(ocf: f64, capex: f64) -> FinancialStatements {
        let cash_flow = FinancialStatement::new(vec![NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()])
            .with_item(line_items::OPERATING_CASH_FLOW, vec![Some(ocf)])
            .with_item(line_items::CAPITAL_EXPENDITURE, vec![Some(capex)]);
        FinancialStatements {
            cash_flow,
            ..Default::default()
        }
    }

    fn reference_model() -> DcfModel {
        DcfModel::new(reference_profile(), statements_with_fcf(1.3e8, -3e7))
    }

    fn close(actual: f64, expected: f64) -> bool {
        ((actual - expected) / expected).abs() < 1e-9
    }

    #[test]
    fn reference_company_end_to_end() {
        let result = reference_model()
            .run_analysis(&ModelParameters::default(), &|_| ())
            .unwrap();

        assert!(close(result.discount_rate, 0.08575));
        assert_eq!(result.forecast_years, 5);
        let expected_fcf = [
            105_000_000.0,
            109_725_000.0,
            114_114_000.0,
            118_107_990.0,
            121_651_229.7,
        ];
        for (actual, expected) in result.forecasted_cash_flows.iter().zip(expected_fcf) {
            assert!(close(*actual, expected), "{actual} != {expected}");
        }
        assert!(close(result.terminal_value, 2_247_547_382.798_205));
        assert!(close(result.enterprise_value, 1_934_119_579.644_514));
        assert!(close(result.equity_value, 1_834_119_579.644_514));
        assert!(close(result.per_share_value, 18.341_195_796_445_14));
        assert_eq!(result.current_price, 15.0);
        assert_eq!(result.beta, 1.2);
        assert_eq!(result.market_cap, 1e9);
        assert_eq!(result.total_debt, 2e8);
        assert_eq!(result.cash, 1e8);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let model = reference_model();
        let params = ModelParameters::default();
        let first = model.run_analysis(&params, &|_| ()).unwrap();
        let second = model.run_analysis(&params, &|_| ()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn equity_nets_debt_and_cash() {
        let result = reference_model()
            .run_analysis(&ModelParameters::default(), &|_| ())
            .unwrap();
        assert!(close(
            result.equity_value,
            result.enterprise_value - result.total_debt + result.cash
        ));
    }

    #[test]
    fn no_shares_gives_zero_per_share_value() {
        for shares in [0.0, -5.0] {
            let profile = CompanyProfile {
                shares_outstanding: shares,
                ..reference_profile()
            };
            let model = DcfModel::new(profile, statements_with_fcf(1.3e8, -3e7));
            let result = model
                .run_analysis(&ModelParameters::default(), &|_| ())
                .unwrap();
            assert_eq!(result.per_share_value, 0.0);
        }
    }

    #[test]
    fn missing_statements_use_fallback_baseline() {
        let model = DcfModel::new(reference_profile(), FinancialStatements::default());
        let with_data = reference_model()
            .run_analysis(&ModelParameters::default(), &|_| ())
            .unwrap();
        let without = model
            .run_analysis(&ModelParameters::default(), &|_| ())
            .unwrap();
        // The fallback baseline is 1e8, the same figure as the reference data
        assert_eq!(with_data.forecasted_cash_flows, without.forecasted_cash_flows);
    }

    #[test]
    fn terminal_growth_at_or_above_discount_rate_is_rejected() {
        let params = ModelParameters {
            terminal_growth: 0.09,
            ..Default::default()
        };
        let err = reference_model().run_analysis(&params, &|_| ()).unwrap_err();
        assert!(matches!(err, ValuationError::InvalidParameter(_)));

        let no_capital = CompanyProfile {
            market_cap: 0.0,
            total_debt: 0.0,
            ..reference_profile()
        };
        let params = ModelParameters {
            terminal_growth: 0.10,
            ..Default::default()
        };
        let model = DcfModel::new(no_capital, FinancialStatements::default());
        assert!(model.run_analysis(&params, &|_| ()).is_err());
    }

    #[test]
    fn custom_growth_rates_drive_forecast() {
        let params = ModelParameters {
            forecast_years: 3,
            growth_rates: Some(vec![0.10]),
            ..Default::default()
        };
        let result = reference_model().run_analysis(&params, &|_| ()).unwrap();
        assert_eq!(result.growth_rates, vec![0.10, 0.10, 0.10]);
        assert!(close(result.forecasted_cash_flows[2], 1e8 * 1.1 * 1.1 * 1.1));
    }

    #[test]
    fn observer_sees_every_stage() {
        let seen = RefCell::new(Vec::new());
        let observer = |event: &AnalysisEvent| {
            let name = match event {
                AnalysisEvent::BaselineFallback { .. } => "fallback",
                AnalysisEvent::DiscountRate { .. } => "rate",
                AnalysisEvent::Forecast { .. } => "forecast",
                AnalysisEvent::TerminalValue { .. } => "terminal",
                AnalysisEvent::Completed { .. } => "completed",
            };
            seen.borrow_mut().push(name);
        };

        DcfModel::new(reference_profile(), FinancialStatements::default())
            .run_analysis(&ModelParameters::default(), &observer)
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec!["rate", "fallback", "forecast", "terminal", "completed"]
        );
    }

    #[test]
    fn upside_relative_to_market_price() {
        let result = reference_model()
            .run_analysis(&ModelParameters::default(), &|_| ())
            .unwrap();
        let upside = result.upside().unwrap();
        assert!(close(upside, (result.per_share_value - 15.0) / 15.0));

        let no_price = ValuationResult {
            current_price: 0.0,
            ..result
        };
        assert!(no_price.upside().is_none());
    }

    struct FailingProvider;

    #[async_trait]
    impl FinancialDataProvider for FailingProvider {
        async fn fetch_profile(&self, _ticker: &str) -> anyhow::Result<CompanyProfile> {
            Err(anyhow!("profile service down"))
        }

        async fn fetch_statements(&self, _ticker: &str) -> anyhow::Result<FinancialStatements> {
            Err(anyhow!("statement service down"))
        }

        async fn fetch_company_info(&self, _ticker: &str) -> anyhow::Result<CompanyInfo> {
            Err(anyhow!("info service down"))
        }
    }

    #[tokio::test]
    async fn load_substitutes_fallbacks_when_provider_fails() {
        let model = DcfModel::load(&FailingProvider, "DOWN").await;
        assert_eq!(model.profile(), &CompanyProfile::fallback("DOWN"));
        assert!(model.statements().is_empty());

        let result = model
            .run_analysis(&ModelParameters::default(), &log_event)
            .unwrap();
        assert!(result.per_share_value > 0.0);
    }

    #[tokio::test]
    async fn load_strict_propagates_provider_failure() {
        let err = DcfModel::load_strict(&FailingProvider, "DOWN")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to fetch profile for DOWN"));
    }
}
