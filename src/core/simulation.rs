//! Monte Carlo distribution of equity value.
//!
//! Each draw perturbs the discount rate, the terminal growth rate and the
//! yearly growth rates around their deterministic values, then reruns the
//! valuation. Draws where the discount rate does not exceed terminal growth
//! are discarded.

use crate::core::error::ValuationError;
use crate::core::forecast;
use crate::core::params::ModelParameters;
use crate::core::valuation::DcfModel;
use rand::Rng;
use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use statrs::statistics::{Data, Median, OrderStatistics, Statistics};

pub const DEFAULT_SIMULATIONS: usize = 1000;
pub const MAX_SIMULATIONS: usize = 1_000_000;

/// Standard deviations of the input perturbations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationSpread {
    pub discount_rate: f64,
    pub terminal_growth: f64,
    pub growth_rate: f64,
}

impl Default for SimulationSpread {
    fn default() -> Self {
        SimulationSpread {
            discount_rate: 0.01,
            terminal_growth: 0.005,
            growth_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    /// Draws that produced a valuation.
    pub num_simulations: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    /// 2.5th percentile.
    pub ci_lower: f64,
    /// 97.5th percentile.
    pub ci_upper: f64,
}

/// Zero-mean normal noise; a zero spread yields no noise at all.
struct Jitter(Option<Normal>);

impl Jitter {
    fn new(std_dev: f64) -> Result<Self, ValuationError> {
        if std_dev == 0.0 {
            return Ok(Jitter(None));
        }
        Normal::new(0.0, std_dev)
            .map(|dist| Jitter(Some(dist)))
            .map_err(|e| {
                ValuationError::InvalidParameter(format!("invalid spread {std_dev}: {e}"))
            })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.0.as_ref().map_or(0.0, |dist| dist.sample(rng))
    }
}

pub fn simulate<R: Rng + ?Sized>(
    model: &DcfModel,
    params: &ModelParameters,
    num_simulations: usize,
    spread: SimulationSpread,
    rng: &mut R,
) -> Result<MonteCarloSummary, ValuationError> {
    if num_simulations == 0 {
        return Err(ValuationError::InvalidInput(
            "number of simulations must be positive".to_string(),
        ));
    }
    if num_simulations > MAX_SIMULATIONS {
        return Err(ValuationError::InvalidInput(format!(
            "number of simulations must be at most {MAX_SIMULATIONS}, got {num_simulations}"
        )));
    }
    params.validate()?;

    let baseline = model.baseline().free_cash_flow;
    let base_growth = forecast::growth_rates(params);
    let base_rate = model.discount_rate(params);
    let rate_jitter = Jitter::new(spread.discount_rate)?;
    let terminal_jitter = Jitter::new(spread.terminal_growth)?;
    let growth_jitter = Jitter::new(spread.growth_rate)?;

    let mut equity_values = Vec::new();
    for _ in 0..num_simulations {
        let rate = base_rate + rate_jitter.sample(rng);
        let terminal_growth = params.terminal_growth + terminal_jitter.sample(rng);
        let growth: Vec<f64> = base_growth
            .iter()
            .map(|g| g + growth_jitter.sample(rng))
            .collect();

        let schedule = forecast::project(baseline, &growth);
        if let Ok(result) = model.value(rate, &schedule, terminal_growth) {
            equity_values.push(result.equity_value);
        }
    }

    if equity_values.is_empty() {
        return Err(ValuationError::InvalidParameter(
            "no simulated draw had a discount rate above terminal growth".to_string(),
        ));
    }

    let count = equity_values.len();
    let mean = equity_values.iter().mean();
    let std = equity_values.iter().std_dev();
    let mut data = Data::new(equity_values);

    Ok(MonteCarloSummary {
        num_simulations: count,
        mean,
        median: data.median(),
        std: if std.is_finite() { std } else { 0.0 },
        ci_lower: data.quantile(0.025),
        ci_upper: data.quantile(0.975),
    })
}
