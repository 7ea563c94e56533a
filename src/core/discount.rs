//! Discount rate (WACC) derivation.

use crate::core::company::CompanyProfile;
use crate::core::params::ModelParameters;

/// Rate used when the company has neither market capitalisation nor debt.
pub const FALLBACK_DISCOUNT_RATE: f64 = 0.10;

/// Share of equity and debt in the capital structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalWeights {
    pub equity: f64,
    pub debt: f64,
}

/// CAPM cost of equity.
pub fn cost_of_equity(risk_free_rate: f64, beta: f64, market_risk_premium: f64) -> f64 {
    risk_free_rate + beta * market_risk_premium
}

/// `None` when there is no capital to weigh.
pub fn capital_weights(market_cap: f64, total_debt: f64) -> Option<CapitalWeights> {
    let total = market_cap + total_debt;
    if total == 0.0 {
        return None;
    }
    Some(CapitalWeights {
        equity: market_cap / total,
        debt: total_debt / total,
    })
}

/// Blends the cost of equity and the after-tax cost of debt by capital
/// weights. Never fails; degrades to [`FALLBACK_DISCOUNT_RATE`].
pub fn discount_rate(profile: &CompanyProfile, params: &ModelParameters) -> f64 {
    let Some(weights) = capital_weights(profile.market_cap, profile.total_debt) else {
        return FALLBACK_DISCOUNT_RATE;
    };

    let equity_cost = cost_of_equity(
        params.risk_free_rate,
        profile.beta,
        params.market_risk_premium,
    );
    let after_tax_debt_cost = params.cost_of_debt * (1.0 - params.tax_rate);

    weights.equity * equity_cost + weights.debt * after_tax_debt_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(beta: f64, market_cap: f64, total_debt: f64) -> CompanyProfile {
        CompanyProfile {
            beta,
            market_cap,
            total_debt,
            ..CompanyProfile::fallback("TEST")
        }
    }

    #[test]
    fn capm_cost_of_equity() {
        assert!((cost_of_equity(0.035, 1.2, 0.05) - 0.095).abs() < 1e-12);
        assert_eq!(cost_of_equity(0.04, 0.0, 0.06), 0.04);
    }

    #[test]
    fn weights_sum_to_one() {
        for (mc, debt) in [
            (1e9, 2e8),
            (1.0, 0.0),
            (0.0, 5e6),
            (3.3e12, 1.7e11),
            (123_456.789, 987_654.321),
        ] {
            let w = capital_weights(mc, debt).unwrap();
            assert!((w.equity + w.debt - 1.0).abs() < 1e-12, "mc={mc} debt={debt}");
        }
    }

    #[test]
    fn no_capital_uses_fallback_rate() {
        assert!(capital_weights(0.0, 0.0).is_none());
        let rate = discount_rate(&profile(1.5, 0.0, 0.0), &ModelParameters::default());
        assert_eq!(rate, 0.10);
    }

    #[test]
    fn blended_rate_for_reference_company() {
        let rate = discount_rate(&profile(1.2, 1e9, 2e8), &ModelParameters::default());
        // 5/6 * 0.095 + 1/6 * 0.05 * 0.79
        assert!((rate - 0.08575).abs() < 1e-12);
    }

    #[test]
    fn all_equity_company_discounts_at_cost_of_equity() {
        let params = ModelParameters::default();
        let rate = discount_rate(&profile(0.8, 5e9, 0.0), &params);
        assert!((rate - (0.035 + 0.8 * 0.05)).abs() < 1e-12);
    }

    #[test]
    fn all_debt_company_discounts_at_after_tax_cost_of_debt() {
        let params = ModelParameters {
            tax_rate: 0.3,
            ..Default::default()
        };
        let rate = discount_rate(&profile(2.0, 0.0, 1e6), &params);
        assert!((rate - 0.05 * 0.7).abs() < 1e-12);
    }
}
