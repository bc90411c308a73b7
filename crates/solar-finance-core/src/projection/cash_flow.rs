use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::types::Money;
use crate::SolarFinanceResult;

/// Annual and monthly customer cash flows. Index 0 of each series is the
/// upfront outlay; every later entry is the utility saving for the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowProjection {
    /// Gross cost less incentives, when incentives are counted in the cash flow
    pub adjusted_system_cost: Money,
    pub annual_savings: Money,
    pub monthly_savings: Money,
    /// `term_years + 1` entries
    pub annual: Vec<Money>,
    pub cumulative_annual: Vec<Money>,
    /// `term_years * 12 + 1` entries
    pub monthly: Vec<Money>,
    pub cumulative_monthly: Vec<Money>,
}

/// One row of the annual cash-flow export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualCashFlowRow {
    pub year: u32,
    pub annual_cash_flow: Money,
    pub cumulative: Money,
}

/// One row of the monthly cash-flow export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCashFlowRow {
    pub month: u32,
    pub monthly_cash_flow: Money,
    pub cumulative: Money,
}

pub fn adjusted_system_cost(gross_cost: Money, total_incentives: Money, include_incentives: bool) -> Money {
    if include_incentives {
        gross_cost - total_incentives
    } else {
        gross_cost
    }
}

/// `[-outlay, saving, saving, ...]` with `periods` savings entries.
pub fn build_series(outlay: Money, saving: Money, periods: u32) -> Vec<Money> {
    std::iter::once(-outlay)
        .chain(std::iter::repeat(saving).take(periods as usize))
        .collect()
}

/// Running sum from index 0.
pub fn cumulative(cash_flows: &[Money]) -> SolarFinanceResult<Vec<Money>> {
    let mut running = Decimal::ZERO;
    cash_flows
        .iter()
        .map(|cf| {
            running = running
                .checked_add(*cf)
                .ok_or_else(|| SolarFinanceError::overflow("cumulative_cash_flow"))?;
            Ok(running)
        })
        .collect()
}

pub fn build_cash_flows(
    adjusted_system_cost: Money,
    monthly_savings: Money,
    term_years: u32,
) -> SolarFinanceResult<CashFlowProjection> {
    let annual_savings = monthly_savings
        .checked_mul(Decimal::from(12))
        .ok_or_else(|| SolarFinanceError::overflow("annual_savings"))?;
    let term_months = term_years
        .checked_mul(12)
        .ok_or_else(|| SolarFinanceError::overflow("term_months"))?;
    let annual = build_series(adjusted_system_cost, annual_savings, term_years);
    let monthly = build_series(adjusted_system_cost, monthly_savings, term_months);

    Ok(CashFlowProjection {
        adjusted_system_cost,
        annual_savings,
        monthly_savings,
        cumulative_annual: cumulative(&annual)?,
        cumulative_monthly: cumulative(&monthly)?,
        annual,
        monthly,
    })
}

impl CashFlowProjection {
    pub fn annual_rows(&self) -> Vec<AnnualCashFlowRow> {
        self.annual
            .iter()
            .zip(&self.cumulative_annual)
            .enumerate()
            .map(|(year, (cf, cum))| AnnualCashFlowRow {
                year: year as u32,
                annual_cash_flow: *cf,
                cumulative: *cum,
            })
            .collect()
    }

    pub fn monthly_rows(&self) -> Vec<MonthlyCashFlowRow> {
        self.monthly
            .iter()
            .zip(&self.cumulative_monthly)
            .enumerate()
            .map(|(month, (cf, cum))| MonthlyCashFlowRow {
                month: month as u32,
                monthly_cash_flow: *cf,
                cumulative: *cum,
            })
            .collect()
    }
}
