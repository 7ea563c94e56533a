//! Terminal value via the Gordon growth model.

/// `final_cash_flow * (1 + g) / (r - g)`.
///
/// The formula is applied as is: when `discount_rate <= terminal_growth` the
/// result is infinite or negative. [`crate::core::valuation::DcfModel`]
/// rejects such parameters before calling this.
pub fn terminal_value(final_cash_flow: f64, terminal_growth: f64, discount_rate: f64) -> f64 {
    final_cash_flow * (1.0 + terminal_growth) / (discount_rate - terminal_growth)
}

/// Value today of `amount` received after `years` years.
pub fn present_value(amount: f64, discount_rate: f64, years: u32) -> f64 {
    amount / (1.0 + discount_rate).powf(f64::from(years))
}
