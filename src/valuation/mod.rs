//! Discounted-cash-flow valuation.
//!
//! Pure computation over a [`StockRecord`]: beta picks a discount rate,
//! operating cash flow is grown at the forecast rate for the projection
//! horizon, and the discounted sum is spread over the shares outstanding.
//! Nothing is rounded here; presentation rounds to two decimals.

use crate::models::StockRecord;
use serde::Serialize;
use thiserror::Error;

/// (beta ceiling, discount rate in percent), ascending.
pub const DISCOUNT_BREAKPOINTS: [(f64, f64); 7] = [
    (0.8, 5.0),
    (1.0, 6.0),
    (1.1, 6.8),
    (1.2, 7.0),
    (1.3, 7.9),
    (1.4, 8.0),
    (1.5, 8.9),
];

/// Discount rate in percent for betas at or above [`CEILING_BETA`].
pub const DISCOUNT_CEILING: f64 = 9.0;

pub const CEILING_BETA: f64 = 1.5;

pub const DEFAULT_PROJECTION_YEARS: usize = 10;

const OPERATING_CASH_FLOW: &str = "Cash From Operating Activities";
const SHARES_OUTSTANDING: &str = "Shares Outstanding";
const LONG_TERM_DEBT: &str = "Total Long Term Debt";
const CASH_AND_EQUIVALENT: &str = "Cash & Equivalent";

#[derive(Error, Debug, PartialEq)]
pub enum ValuationError {
    #[error("missing valuation input: {0}")]
    MissingInput(&'static str),

    #[error("shares outstanding must be positive, got {0}")]
    NoShares(f64),
}

/// Fractional discount rate for a beta.
///
/// Betas from [`CEILING_BETA`] up get the ceiling. Below that, breakpoints are
/// scanned in ascending order and the first one the beta does not exceed
/// decides the rate. Non-decreasing in beta.
pub fn beta_to_discount_rate(beta: f64) -> f64 {
    if beta >= CEILING_BETA {
        return DISCOUNT_CEILING / 100.0;
    }
    let pct = DISCOUNT_BREAKPOINTS
        .iter()
        .find(|(limit, _)| beta <= *limit)
        .map(|(_, pct)| *pct)
        .unwrap_or(DISCOUNT_CEILING);
    pct / 100.0
}

/// `years` cash flows; the first is already one year of growth past `base`.
pub fn project_cash_flow(base: f64, growth_rate: f64, years: usize) -> Vec<f64> {
    let mut flows = Vec::with_capacity(years);
    let mut current = base;
    for _ in 0..years {
        current *= 1.0 + growth_rate;
        flows.push(current);
    }
    flows
}

/// 1 / (1 + rate)^i for i = 1..=years.
pub fn discount_factors(rate: f64, years: usize) -> Vec<f64> {
    (1..=years).map(|i| 1.0 / (1.0 + rate).powi(i as i32)).collect()
}

/// Σ cf_i / (1 + rate)^i, divided by shares outstanding (millions).
pub fn net_present_value_per_share(cash_flows: &[f64], rate: f64, shares_millions: f64) -> f64 {
    let pv: f64 = cash_flows
        .iter()
        .zip(discount_factors(rate, cash_flows.len()))
        .map(|(cf, factor)| cf * factor)
        .sum();
    pv / shares_millions
}

// ── Inputs ────────────────────────────────────────────────────────────────────

/// Figures a valuation needs, in the statements' units (millions).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationInputs {
    pub operating_cash_flow: f64,
    pub growth_rate: f64,
    pub discount_rate: f64,
    pub shares_outstanding: f64,
    pub total_debt: Option<f64>,
    pub cash: Option<f64>,
}

impl ValuationInputs {
    pub fn from_record(record: &StockRecord) -> Result<Self, ValuationError> {
        let operating_cash_flow = record
            .cash_flow
            .as_ref()
            .and_then(|t| t.number(OPERATING_CASH_FLOW))
            .ok_or(ValuationError::MissingInput("operating cash flow"))?;
        let shares = record
            .overview
            .as_ref()
            .and_then(|t| t.number(SHARES_OUTSTANDING))
            .ok_or(ValuationError::MissingInput("shares outstanding"))?;
        let growth_rate = record
            .growth_rate
            .ok_or(ValuationError::MissingInput("growth rate"))?;
        let discount_rate = record
            .discount_rate
            .ok_or(ValuationError::MissingInput("discount rate"))?;

        let balance = record.balance_sheet.as_ref();
        Ok(Self {
            operating_cash_flow,
            growth_rate,
            discount_rate,
            shares_outstanding: shares / 1_000_000.0,
            total_debt: balance.and_then(|t| t.number(LONG_TERM_DEBT)),
            cash: balance.and_then(|t| t.number(CASH_AND_EQUIVALENT)),
        })
    }
}

// ── Result ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationResult {
    pub inputs: ValuationInputs,
    pub cash_flows: Vec<f64>,
    pub discount_factors: Vec<f64>,
    pub present_values: Vec<f64>,
    pub total_present_value: f64,
    pub npv_per_share: f64,
    pub debt_per_share: Option<f64>,
    pub cash_per_share: Option<f64>,
    /// Intrinsic value less debt plus cash, per share.
    pub net_cash_value_per_share: Option<f64>,
}

pub fn value(inputs: ValuationInputs, years: usize) -> Result<ValuationResult, ValuationError> {
    let shares = inputs.shares_outstanding;
    if shares.is_nan() || shares <= 0.0 {
        return Err(ValuationError::NoShares(shares));
    }

    let cash_flows = project_cash_flow(inputs.operating_cash_flow, inputs.growth_rate, years);
    let factors = discount_factors(inputs.discount_rate, years);
    let present_values: Vec<f64> = cash_flows.iter().zip(&factors).map(|(cf, f)| cf * f).collect();
    let total_present_value: f64 = present_values.iter().sum();
    let npv_per_share = total_present_value / shares;

    let debt_per_share = inputs.total_debt.map(|d| d / shares);
    let cash_per_share = inputs.cash.map(|c| c / shares);
    let net_cash_value_per_share = match (debt_per_share, cash_per_share) {
        (Some(debt), Some(cash)) => Some(npv_per_share - debt + cash),
        _ => None,
    };

    Ok(ValuationResult {
        inputs,
        cash_flows,
        discount_factors: factors,
        present_values,
        total_present_value,
        npv_per_share,
        debt_per_share,
        cash_per_share,
        net_cash_value_per_share,
    })
}

pub fn value_record(record: &StockRecord, years: usize) -> Result<ValuationResult, ValuationError> {
    value(ValuationInputs::from_record(record)?, years)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BetaEstimate, GrowthEstimate, Overview, StockRecordBuilder};

    const EPS: f64 = 1e-6;

    #[test]
    fn discount_rate_steps() {
        assert_eq!(beta_to_discount_rate(0.75), 0.05);
        assert_eq!(beta_to_discount_rate(1.0), 0.06);
        assert!((beta_to_discount_rate(1.05) - 0.068).abs() < 1e-12);
        assert!((beta_to_discount_rate(1.45) - 0.089).abs() < 1e-12);
        assert_eq!(beta_to_discount_rate(1.5), 0.09);
        assert_eq!(beta_to_discount_rate(1.6), 0.09);
        assert_eq!(beta_to_discount_rate(-0.3), 0.05);
    }

    #[test]
    fn discount_rate_is_monotonic() {
        let mut last = f64::MIN;
        for i in 0..=250 {
            let rate = beta_to_discount_rate(i as f64 * 0.01);
            assert!(rate >= last, "rate fell at beta {}", i as f64 * 0.01);
            last = rate;
        }
    }

    #[test]
    fn projection_compounds_from_first_year() {
        let flows = project_cash_flow(100.0, 0.10, 10);
        assert_eq!(flows.len(), 10);
        assert!((flows[0] - 110.0).abs() < EPS);
        for pair in flows.windows(2) {
            assert!((pair[1] - pair[0] * 1.10).abs() < EPS);
        }
        assert!((flows[9] - 259.374_246_01).abs() < EPS);
    }

    #[test]
    fn npv_matches_closed_form() {
        let flows = project_cash_flow(100.0, 0.10, 10);
        let expected: f64 = flows
            .iter()
            .enumerate()
            .map(|(i, cf)| cf / 1.06_f64.powi(i as i32 + 1))
            .sum::<f64>()
            / 50.0;
        assert!((net_present_value_per_share(&flows, 0.06, 50.0) - expected).abs() < EPS);
    }

    fn record(cash_flow: &str, shares: &str) -> StockRecord {
        let mut b = StockRecordBuilder::new("abc-corp");
        b.overview(Ok(Overview {
            table: [("Last Price", "12.34"), ("Shares Outstanding", shares)]
                .into_iter()
                .collect(),
            internal_id: "1".into(),
            url: "u".into(),
        }))
        .cash_flow(Ok([("Cash From Operating Activities", cash_flow)].into_iter().collect()))
        .balance_sheet(Ok([("Total Long Term Debt", "100"), ("Cash & Equivalent", "250")]
            .into_iter()
            .collect()))
        .growth_rate(Ok(GrowthEstimate { rate: 0.10, url: "g".into() }))
        .beta(Ok(BetaEstimate { beta: 1.0, url: "b".into() }));
        b.build()
    }

    #[test]
    fn record_valuation_uses_millions_of_shares() {
        let result = value_record(&record("100", "50,000,000"), 10).unwrap();

        assert_eq!(result.inputs.shares_outstanding, 50.0);
        assert_eq!(result.cash_flows.len(), 10);
        assert_eq!(result.discount_factors.len(), 10);
        assert!((result.npv_per_share - result.total_present_value / 50.0).abs() < EPS);
        assert!(
            (result.npv_per_share - net_present_value_per_share(&result.cash_flows, 0.06, 50.0)).abs()
                < EPS
        );
        assert_eq!(result.debt_per_share, Some(2.0));
        assert_eq!(result.cash_per_share, Some(5.0));
        let net = result.net_cash_value_per_share.unwrap();
        assert!((net - (result.npv_per_share + 3.0)).abs() < EPS);
    }

    #[test]
    fn missing_inputs_are_reported_not_zeroed() {
        let mut b = StockRecordBuilder::new("abc-corp");
        b.cash_flow(Ok([("Cash From Operating Activities", "100")].into_iter().collect()));
        let err = value_record(&b.build(), 10).unwrap_err();
        assert_eq!(err, ValuationError::MissingInput("shares outstanding"));
    }

    #[test]
    fn zero_shares_rejected() {
        let err = value_record(&record("100", "0"), 10).unwrap_err();
        assert_eq!(err, ValuationError::NoShares(0.0));
    }
}
