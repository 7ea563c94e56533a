//! Error vocabulary of the valuation core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    /// A ratio or growth calculation was asked to divide by a non-positive
    /// denominator or to compound over zero periods.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// One or more required line items are absent from a statement.
    #[error("Missing required field(s): {}", .0.join(", "))]
    MissingField(Vec<String>),

    /// Model parameters that cannot produce a meaningful valuation.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ValuationError {
    pub fn missing(field: &str) -> Self {
        ValuationError::MissingField(vec![field.to_string()])
    }
}
