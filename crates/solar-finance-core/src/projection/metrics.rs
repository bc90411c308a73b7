use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::time_value;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

use super::cash_flow::{cumulative, CashFlowProjection};

const IRR_GUESS: Rate = dec!(0.10);

/// Break-even point of a cash-flow series, in periods of that series.
///
/// `BeyondHorizon` carries the horizon so the caller can render e.g. ">25";
/// formatting is left to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaybackPeriod {
    WithinHorizon { period: u32 },
    BeyondHorizon { horizon: u32 },
}

impl PaybackPeriod {
    pub fn period(&self) -> Option<u32> {
        match self {
            PaybackPeriod::WithinHorizon { period } => Some(*period),
            PaybackPeriod::BeyondHorizon { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitabilityMetrics {
    pub discount_rate: Rate,
    pub npv: Money,
    /// `None` when the root-finder fails; the reason is in the warnings
    pub irr: Option<Rate>,
    /// `None` when the adjusted system cost is zero
    pub roi: Option<Rate>,
    pub payback_years: PaybackPeriod,
    pub payback_months: PaybackPeriod,
}

/// Smallest index whose cumulative cash flow is non-negative.
pub fn payback_period(cash_flows: &[Money]) -> SolarFinanceResult<PaybackPeriod> {
    Ok(cumulative(cash_flows)?
        .iter()
        .position(|cum| *cum >= Decimal::ZERO)
        .map(|i| PaybackPeriod::WithinHorizon { period: i as u32 })
        .unwrap_or(PaybackPeriod::BeyondHorizon {
            horizon: cash_flows.len().saturating_sub(1) as u32,
        }))
}

/// `(sum(cash_flows[1..]) - adjusted_system_cost) / adjusted_system_cost`
pub fn return_on_investment(
    cash_flows: &[Money],
    adjusted_system_cost: Money,
) -> SolarFinanceResult<Rate> {
    if adjusted_system_cost.is_zero() {
        return Err(SolarFinanceError::DivisionByZero {
            context: "ROI with an adjusted system cost of zero".into(),
        });
    }
    cash_flows
        .iter()
        .skip(1)
        .try_fold(Decimal::ZERO, |acc, cf| acc.checked_add(*cf))
        .and_then(|returns| returns.checked_sub(adjusted_system_cost))
        .and_then(|gain| gain.checked_div(adjusted_system_cost))
        .ok_or_else(|| SolarFinanceError::overflow("roi"))
}

/// NPV, IRR, ROI and payback over the annual series (payback also over the
/// monthly series). IRR and ROI failures are downgraded to warnings.
pub fn profitability_metrics(
    cash_flows: &CashFlowProjection,
    discount_rate: Rate,
    warnings: &mut Vec<String>,
) -> SolarFinanceResult<ProfitabilityMetrics> {
    let npv = time_value::npv(discount_rate, &cash_flows.annual)?;

    let irr = match time_value::irr(&cash_flows.annual, IRR_GUESS) {
        Ok(r) => Some(r),
        Err(e) => {
            warnings.push(format!("IRR calculation warning: {e}"));
            None
        }
    };

    let roi = match return_on_investment(&cash_flows.annual, cash_flows.adjusted_system_cost) {
        Ok(r) => Some(r),
        Err(e) => {
            warnings.push(format!("ROI calculation warning: {e}"));
            None
        }
    };

    Ok(ProfitabilityMetrics {
        discount_rate,
        npv,
        irr,
        roi,
        payback_years: payback_period(&cash_flows.annual)?,
        payback_months: payback_period(&cash_flows.monthly)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::cash_flow::build_cash_flows;

    #[test]
    fn test_payback_within_horizon() {
        let flows = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        assert_eq!(
            payback_period(&flows).unwrap(),
            PaybackPeriod::WithinHorizon { period: 3 }
        );
    }

    #[test]
    fn test_payback_exact_break_even_counts() {
        let flows = vec![dec!(-1000), dec!(500), dec!(500), dec!(500)];
        assert_eq!(payback_period(&flows).unwrap().period(), Some(2));
    }

    #[test]
    fn test_payback_beyond_horizon_carries_horizon() {
        let flows = vec![dec!(-1000), dec!(100), dec!(100)];
        assert_eq!(
            payback_period(&flows).unwrap(),
            PaybackPeriod::BeyondHorizon { horizon: 2 }
        );
    }

    #[test]
    fn test_payback_sentinel_wire_format() {
        let json = serde_json::to_value(PaybackPeriod::BeyondHorizon { horizon: 25 }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "beyond_horizon", "horizon": 25}));
    }

    #[test]
    fn test_roi_basic() {
        let flows = vec![dec!(-1000), dec!(1000), dec!(1000)];
        assert_eq!(return_on_investment(&flows, dec!(1000)).unwrap(), dec!(1));
    }

    #[test]
    fn test_roi_zero_cost_is_division_by_zero() {
        let flows = vec![dec!(0), dec!(100)];
        assert!(matches!(
            return_on_investment(&flows, Decimal::ZERO),
            Err(SolarFinanceError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn test_metrics_downgrade_failures_to_warnings() {
        // Zero outlay: ROI divides by zero and there is no IRR sign change.
        let projection = build_cash_flows(Decimal::ZERO, dec!(100), 5).unwrap();
        let mut warnings = Vec::new();
        let metrics = profitability_metrics(&projection, dec!(0.05), &mut warnings).unwrap();
        assert_eq!(metrics.roi, None);
        assert_eq!(metrics.irr, None);
        assert_eq!(warnings.len(), 2);
        assert_eq!(metrics.payback_years.period(), Some(0));
        assert!(metrics.npv > Decimal::ZERO);
    }

    #[test]
    fn test_metrics_typical_projection() {
        let projection = build_cash_flows(dec!(30000), dec!(250), 25).unwrap();
        let mut warnings = Vec::new();
        let metrics = profitability_metrics(&projection, dec!(0.05), &mut warnings).unwrap();
        assert!(warnings.is_empty());
        // 3000/yr against 30000 pays back in year 10
        assert_eq!(metrics.payback_years.period(), Some(10));
        assert_eq!(metrics.payback_months.period(), Some(120));
        // (75000 - 30000) / 30000
        assert_eq!(metrics.roi, Some(dec!(1.5)));
        let irr = metrics.irr.unwrap();
        assert!(irr > dec!(0.08) && irr < dec!(0.09), "irr {irr}");
    }

    #[test]
    fn test_roi_on_tiny_cost_overflows_to_an_error() {
        let flows = vec![dec!(-0.0000000000000000000000001), dec!(100000)];
        assert!(matches!(
            return_on_investment(&flows, dec!(0.0000000000000000000000001)),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }
}
