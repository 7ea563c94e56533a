use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::cache::Cache;
use crate::core::company::{
    CompanyInfo, CompanyProfile, FinancialDataProvider, FinancialStatements,
};
use crate::core::statements::{FinancialStatement, line_items};
use crate::providers::util::{RetryPolicy, with_retry};

const QUOTE_SUMMARY_MODULES: &str = "price,summaryDetail,summaryProfile,defaultKeyStatistics,\
financialData,balanceSheetHistory,cashflowStatementHistory,incomeStatementHistory";

/// Everything a single quoteSummary request yields for one ticker.
#[derive(Debug, Clone)]
pub struct CompanySnapshot {
    pub profile: CompanyProfile,
    pub statements: FinancialStatements,
    pub info: CompanyInfo,
}

pub struct YahooFinancialsProvider {
    base_url: String,
    cache: Arc<Cache<String, CompanySnapshot>>,
    retry: RetryPolicy,
}

impl YahooFinancialsProvider {
    pub fn new(base_url: &str, cache: Arc<Cache<String, CompanySnapshot>>) -> Self {
        YahooFinancialsProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn snapshot(&self, ticker: &str) -> Result<CompanySnapshot> {
        let key = ticker.to_uppercase();
        if let Some(cached) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules={}",
            self.base_url, ticker, QUOTE_SUMMARY_MODULES
        );
        debug!("Requesting quote summary from {}", url);

        let client = reqwest::Client::builder().user_agent("xdcf/1.0").build()?;
        let response = with_retry(|| client.get(&url).send(), self.retry)
            .await
            .map_err(|e| anyhow!("Request error: {} for ticker: {} URL: {}", e, ticker, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ticker: {}",
                response.status(),
                ticker
            ));
        }

        let text = response.text().await?;
        let data: QuoteSummaryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", ticker, e))?;

        let item = data
            .quote_summary
            .result
            .and_then(|result| result.into_iter().next())
            .ok_or_else(|| anyhow!("No quote summary found for ticker: {}", ticker))?;

        let snapshot = CompanySnapshot {
            profile: item.profile(&key),
            statements: item.statements(),
            info: item.info(&key),
        };
        self.cache.put(key, snapshot.clone()).await;
        Ok(snapshot)
    }
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Deserialize, Debug)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryItem>>,
}

/// Yahoo wraps numbers as `{"raw": 1.2, "fmt": "1.20"}` and sends `{}` when
/// a figure is not reported.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
struct RawValue {
    raw: Option<f64>,
}

fn raw(value: &Option<RawValue>) -> Option<f64> {
    value.and_then(|v| v.raw).filter(|v| v.is_finite())
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct QuoteSummaryItem {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    summary_profile: Option<SummaryProfile>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    balance_sheet_history: Option<BalanceSheetHistory>,
    cashflow_statement_history: Option<CashflowStatementHistory>,
    income_statement_history: Option<IncomeStatementHistory>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct PriceModule {
    short_name: Option<String>,
    long_name: Option<String>,
    market_cap: Option<RawValue>,
    regular_market_price: Option<RawValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct SummaryDetail {
    beta: Option<RawValue>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    fifty_two_week_high: Option<RawValue>,
    fifty_two_week_low: Option<RawValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct SummaryProfile {
    sector: Option<String>,
    industry: Option<String>,
    long_business_summary: Option<String>,
    website: Option<String>,
    country: Option<String>,
    full_time_employees: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct KeyStatistics {
    beta: Option<RawValue>,
    shares_outstanding: Option<RawValue>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct FinancialData {
    current_price: Option<RawValue>,
    total_debt: Option<RawValue>,
    total_cash: Option<RawValue>,
}

type StatementEntry = HashMap<String, Value>;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct BalanceSheetHistory {
    balance_sheet_statements: Vec<StatementEntry>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct CashflowStatementHistory {
    cashflow_statements: Vec<StatementEntry>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct IncomeStatementHistory {
    income_statement_history: Vec<StatementEntry>,
}

impl QuoteSummaryItem {
    fn profile(&self, ticker: &str) -> CompanyProfile {
        let detail = self.summary_detail.as_ref();
        let stats = self.default_key_statistics.as_ref();
        let financials = self.financial_data.as_ref();
        let price = self.price.as_ref();

        let beta = detail
            .and_then(|d| raw(&d.beta))
            .or_else(|| stats.and_then(|s| raw(&s.beta)))
            .unwrap_or(1.0);
        let current_price = financials
            .and_then(|f| raw(&f.current_price))
            .or_else(|| price.and_then(|p| raw(&p.regular_market_price)));

        CompanyProfile {
            ticker: ticker.to_string(),
            beta,
            market_cap: price.and_then(|p| raw(&p.market_cap)).unwrap_or(0.0),
            total_debt: financials.and_then(|f| raw(&f.total_debt)).unwrap_or(0.0),
            cash: financials.and_then(|f| raw(&f.total_cash)).unwrap_or(0.0),
            shares_outstanding: stats
                .and_then(|s| raw(&s.shares_outstanding))
                .unwrap_or(0.0),
            current_price: current_price.unwrap_or(0.0),
        }
    }

    fn statements(&self) -> FinancialStatements {
        let balance_sheet = self
            .balance_sheet_history
            .as_ref()
            .map(|h| balance_sheet(&h.balance_sheet_statements))
            .unwrap_or_default();
        let cash_flow = self
            .cashflow_statement_history
            .as_ref()
            .map(|h| cash_flow(&h.cashflow_statements))
            .unwrap_or_default();
        let income_statement = self
            .income_statement_history
            .as_ref()
            .map(|h| income_statement(&h.income_statement_history))
            .unwrap_or_default();

        FinancialStatements {
            balance_sheet,
            cash_flow,
            income_statement,
        }
    }

    fn info(&self, ticker: &str) -> CompanyInfo {
        let price = self.price.as_ref();
        let detail = self.summary_detail.as_ref();
        let profile = self.summary_profile.as_ref();
        let stats = self.default_key_statistics.as_ref();

        CompanyInfo {
            ticker: ticker.to_string(),
            name: price.and_then(|p| p.long_name.clone().or_else(|| p.short_name.clone())),
            sector: profile.and_then(|p| p.sector.clone()),
            industry: profile.and_then(|p| p.industry.clone()),
            description: profile.and_then(|p| p.long_business_summary.clone()),
            website: profile.and_then(|p| p.website.clone()),
            country: profile.and_then(|p| p.country.clone()),
            employees: profile.and_then(|p| p.full_time_employees),
            market_cap: price.and_then(|p| raw(&p.market_cap)),
            current_price: self
                .financial_data
                .as_ref()
                .and_then(|f| raw(&f.current_price))
                .or_else(|| price.and_then(|p| raw(&p.regular_market_price))),
            pe_ratio: detail.and_then(|d| raw(&d.trailing_pe)),
            dividend_yield: detail.and_then(|d| raw(&d.dividend_yield)).map(|y| y * 100.0),
            beta: detail
                .and_then(|d| raw(&d.beta))
                .or_else(|| stats.and_then(|s| raw(&s.beta))),
            fifty_two_week_high: detail.and_then(|d| raw(&d.fifty_two_week_high)),
            fifty_two_week_low: detail.and_then(|d| raw(&d.fifty_two_week_low)),
        }
    }
}

fn entry_value(entry: &StatementEntry, key: &str) -> Option<f64> {
    entry
        .get(key)
        .and_then(|v| v.get("raw"))
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn period_end(entry: &StatementEntry) -> Option<NaiveDate> {
    let ts = entry
        .get("endDate")
        .and_then(|v| v.get("raw"))
        .and_then(Value::as_i64)?;
    Utc.timestamp_opt(ts, 0).single().map(|dt| dt.date_naive())
}

/// Lines up Yahoo statement entries as periods, most recent first, and
/// collects canonical line items from them.
struct StatementBuilder<'a> {
    entries: Vec<&'a StatementEntry>,
    statement: FinancialStatement,
}

impl<'a> StatementBuilder<'a> {
    fn new(entries: &'a [StatementEntry]) -> Self {
        let mut dated: Vec<(NaiveDate, &StatementEntry)> = entries
            .iter()
            .filter_map(|entry| period_end(entry).map(|date| (date, entry)))
            .collect();
        dated.sort_by(|a, b| b.0.cmp(&a.0));

        let periods = dated.iter().map(|(date, _)| *date).collect();
        StatementBuilder {
            entries: dated.into_iter().map(|(_, entry)| entry).collect(),
            statement: FinancialStatement::new(periods),
        }
    }

    /// Adds a line item unless no period reports it.
    fn item<F>(mut self, name: &str, extract: F) -> Self
    where
        F: Fn(&StatementEntry) -> Option<f64>,
    {
        let values: Vec<Option<f64>> = self.entries.iter().map(|&e| extract(e)).collect();
        if values.iter().any(Option::is_some) {
            self.statement.insert(name, values);
        }
        self
    }

    fn field(self, name: &str, key: &'static str) -> Self {
        self.item(name, |e| entry_value(e, key))
    }

    fn build(self) -> FinancialStatement {
        self.statement
    }
}

fn cash_flow(entries: &[StatementEntry]) -> FinancialStatement {
    StatementBuilder::new(entries)
        .field(
            line_items::OPERATING_CASH_FLOW,
            "totalCashFromOperatingActivities",
        )
        .field(line_items::CAPITAL_EXPENDITURE, "capitalExpenditures")
        .field(line_items::NET_INCOME, "netIncome")
        .field(line_items::DEPRECIATION, "depreciation")
        .build()
}

fn balance_sheet(entries: &[StatementEntry]) -> FinancialStatement {
    StatementBuilder::new(entries)
        .field(line_items::TOTAL_ASSETS, "totalAssets")
        .field(line_items::TOTAL_LIABILITIES, "totalLiab")
        .item(line_items::TOTAL_DEBT, |e| {
            let short = entry_value(e, "shortLongTermDebt");
            let long = entry_value(e, "longTermDebt");
            match (short, long) {
                (None, None) => None,
                (short, long) => Some(short.unwrap_or(0.0) + long.unwrap_or(0.0)),
            }
        })
        .field(line_items::CASH, "cash")
        .item(line_items::WORKING_CAPITAL, |e| {
            let assets = entry_value(e, "totalCurrentAssets")?;
            let liabilities = entry_value(e, "totalCurrentLiabilities")?;
            Some(assets - liabilities)
        })
        .build()
}

fn income_statement(entries: &[StatementEntry]) -> FinancialStatement {
    StatementBuilder::new(entries)
        .field(line_items::TOTAL_REVENUE, "totalRevenue")
        .field(line_items::EBIT, "ebit")
        .field(line_items::NET_INCOME, "netIncome")
        // Yahoo reports interest expense as a negative figure
        .item(line_items::INTEREST_EXPENSE, |e| {
            entry_value(e, "interestExpense").map(f64::abs)
        })
        .build()
}

#[async_trait]
impl FinancialDataProvider for YahooFinancialsProvider {
    #[instrument(name = "YahooProfileFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_profile(&self, ticker: &str) -> Result<CompanyProfile> {
        Ok(self.snapshot(ticker).await?.profile)
    }

    #[instrument(name = "YahooStatementsFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_statements(&self, ticker: &str) -> Result<FinancialStatements> {
        Ok(self.snapshot(ticker).await?.statements)
    }

    #[instrument(name = "YahooInfoFetch", skip(self), fields(ticker = %ticker))]
    async fn fetch_company_info(&self, ticker: &str) -> Result<CompanyInfo> {
        Ok(self.snapshot(ticker).await?.info)
    }
}
