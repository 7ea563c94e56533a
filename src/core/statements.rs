//! Typed financial statement tables.
//!
//! A [`FinancialStatement`] holds named line items over reporting periods,
//! ordered most recent first. Lookups return `Option` so that callers decide
//! between falling back and failing.

use crate::core::error::ValuationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Canonical line item names shared by providers and ratio calculations.
pub mod line_items {
    pub const OPERATING_CASH_FLOW: &str = "Operating Cash Flow";
    pub const CAPITAL_EXPENDITURE: &str = "Capital Expenditure";
    pub const NET_INCOME: &str = "Net Income";
    pub const DEPRECIATION: &str = "Depreciation";
    pub const TOTAL_ASSETS: &str = "Total Assets";
    pub const TOTAL_LIABILITIES: &str = "Total Liabilities";
    pub const TOTAL_DEBT: &str = "Total Debt";
    pub const CASH: &str = "Cash";
    pub const WORKING_CAPITAL: &str = "Working Capital";
    pub const TOTAL_REVENUE: &str = "Total Revenue";
    pub const EBIT: &str = "EBIT";
    pub const INTEREST_EXPENSE: &str = "Interest Expense";
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    periods: Vec<NaiveDate>,
    items: BTreeMap<String, Vec<Option<f64>>>,
}

impl FinancialStatement {
    /// Creates an empty table over `periods`, which must be most recent first.
    pub fn new(periods: Vec<NaiveDate>) -> Self {
        Self {
            periods,
            items: BTreeMap::new(),
        }
    }

    /// Builder form of [`FinancialStatement::insert`].
    pub fn with_item(mut self, name: &str, values: Vec<Option<f64>>) -> Self {
        self.insert(name, values);
        self
    }

    /// Sets the values of a line item. The series is padded with `None` or
    /// truncated so it lines up with the periods of the table.
    pub fn insert(&mut self, name: &str, mut values: Vec<Option<f64>>) {
        values.resize(self.periods.len(), None);
        self.items.insert(name.to_string(), values);
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() || self.items.is_empty()
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn values(&self, name: &str) -> Option<&[Option<f64>]> {
        self.items.get(name).map(Vec::as_slice)
    }

    /// Value of `name` in the most recent period, if reported and finite.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.items
            .get(name)
            .and_then(|values| values.first().copied().flatten())
            .filter(|v| v.is_finite())
    }

    pub fn require_latest(&self, name: &str) -> Result<f64, ValuationError> {
        self.latest(name)
            .ok_or_else(|| ValuationError::missing(name))
    }

    /// Names from `required` that the table does not carry.
    pub fn missing_items<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|name| !self.has_item(name))
            .collect()
    }

    /// Returns a copy with gaps filled with zero and every line item clipped
    /// to within three standard deviations of its mean.
    pub fn cleaned(&self) -> FinancialStatement {
        let items = self
            .items
            .iter()
            .map(|(name, values)| {
                let filled: Vec<f64> = values
                    .iter()
                    .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
                    .collect();
                let mean = filled.iter().mean();
                let std_dev = filled.iter().std_dev();
                let clipped = if mean.is_finite() && std_dev.is_finite() {
                    let (lower, upper) = (mean - 3.0 * std_dev, mean + 3.0 * std_dev);
                    filled.into_iter().map(|v| Some(v.clamp(lower, upper))).collect()
                } else {
                    // Fewer than two observations have no spread to clip against
                    filled.into_iter().map(Some).collect()
                };
                (name.clone(), clipped)
            })
            .collect();

        FinancialStatement {
            periods: self.periods.clone(),
            items,
        }
    }
}
