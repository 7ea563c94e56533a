//! Valuation engine and its supporting abstractions

pub mod cache;
pub mod company;
pub mod config;
pub mod discount;
pub mod error;
pub mod forecast;
pub mod log;
pub mod params;
pub mod ratios;
pub mod simulation;
pub mod statements;
pub mod terminal;
pub mod valuation;

// Re-export main types for cleaner imports
pub use company::{CompanyInfo, CompanyProfile, FinancialDataProvider, FinancialStatements};
pub use error::ValuationError;
pub use params::{ModelParameters, ParameterOverrides};
pub use statements::FinancialStatement;
pub use valuation::{AnalysisEvent, DcfModel, ValuationResult};
