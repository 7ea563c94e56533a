//! Company data abstractions and the provider seam

use crate::core::statements::FinancialStatement;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capital structure and market figures used by the valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub ticker: String,
    pub beta: f64,
    pub market_cap: f64,
    pub total_debt: f64,
    pub cash: f64,
    pub shares_outstanding: f64,
    pub current_price: f64,
}

impl CompanyProfile {
    /// Stand-in figures for a company whose profile could not be fetched.
    pub fn fallback(ticker: &str) -> Self {
        CompanyProfile {
            ticker: ticker.to_string(),
            beta: 1.0,
            market_cap: 1_000_000_000.0,
            total_debt: 200_000_000.0,
            cash: 100_000_000.0,
            shares_outstanding: 100_000_000.0,
            current_price: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub balance_sheet: FinancialStatement,
    pub cash_flow: FinancialStatement,
    pub income_statement: FinancialStatement,
}

impl FinancialStatements {
    pub fn is_empty(&self) -> bool {
        self.balance_sheet.is_empty()
            && self.cash_flow.is_empty()
            && self.income_statement.is_empty()
    }
}

/// Descriptive company metadata, not used by the valuation itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub ticker: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub website: Option<String>,
    pub country: Option<String>,
    pub employees: Option<u64>,
    pub market_cap: Option<f64>,
    pub current_price: Option<f64>,
    pub pe_ratio: Option<f64>,
    /// Percent, e.g. `0.52` for a 0.52% yield.
    pub dividend_yield: Option<f64>,
    pub beta: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

#[async_trait]
pub trait FinancialDataProvider: Send + Sync {
    async fn fetch_profile(&self, ticker: &str) -> Result<CompanyProfile>;
    async fn fetch_statements(&self, ticker: &str) -> Result<FinancialStatements>;
    async fn fetch_company_info(&self, ticker: &str) -> Result<CompanyInfo>;
}
