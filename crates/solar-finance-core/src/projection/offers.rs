//! Side-by-side views shown next to the loan: the utility bill with and
//! without discounts, a cash purchase, and an optional lease.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

use super::incentives::WATTS_PER_KW;
use super::input::{LeaseTerms, ScenarioInput, State};

/// Expected utility escalation applied to today's bill.
pub const UTILITY_ESCALATION: Rate = dec!(0.15);
pub const LEASE_DISCOUNT_LOW: Rate = dec!(0.07);
pub const LEASE_DISCOUNT_HIGH: Rate = dec!(0.15);
/// NY rebate per installed watt, netted from a cash purchase.
pub const STATE_REBATE_PER_WATT: Money = dec!(0.20);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilityComparison {
    pub current_bill: Money,
    pub escalated_bill: Money,
    pub escalated_bill_less_7_pct: Money,
    pub escalated_bill_less_15_pct: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashPurchase {
    /// `size * 1000 * cost_per_watt`, before discount and roof work
    pub base_price: Money,
    pub state_rebate: Money,
    /// `(base_price + roof_cost) * discount_factor - state_rebate`
    pub total_cost: Money,
    pub monthly_savings: Money,
    /// `None` when there are no savings to pay the system back
    pub simple_payback_years: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseYear {
    pub year: u32,
    pub monthly_payment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseOption {
    pub annual_escalator: Rate,
    pub schedule: Vec<LeaseYear>,
}

pub fn utility_comparison(monthly_bill: Money) -> SolarFinanceResult<UtilityComparison> {
    let overflow = || SolarFinanceError::overflow("utility.escalated_bill");
    let escalated_bill = monthly_bill
        .checked_mul(Decimal::ONE + UTILITY_ESCALATION)
        .ok_or_else(overflow)?;
    Ok(UtilityComparison {
        current_bill: monthly_bill,
        escalated_bill,
        escalated_bill_less_7_pct: escalated_bill * (Decimal::ONE - LEASE_DISCOUNT_LOW),
        escalated_bill_less_15_pct: escalated_bill * (Decimal::ONE - LEASE_DISCOUNT_HIGH),
    })
}

pub fn cash_purchase(
    input: &ScenarioInput,
    warnings: &mut Vec<String>,
) -> SolarFinanceResult<CashPurchase> {
    let overflow = || SolarFinanceError::overflow("cash_purchase");
    let installed_watts = input
        .system_size_kw
        .checked_mul(WATTS_PER_KW)
        .ok_or_else(overflow)?;
    let base_price = installed_watts
        .checked_mul(input.cost_per_watt)
        .ok_or_else(overflow)?;
    let state_rebate = match input.state {
        State::NY => installed_watts
            .checked_mul(STATE_REBATE_PER_WATT)
            .ok_or_else(overflow)?,
        State::NJ => Decimal::ZERO,
    };
    let total_cost = base_price
        .checked_add(input.roof_cost)
        .and_then(|v| v.checked_mul(input.discount_factor()))
        .and_then(|v| v.checked_sub(state_rebate))
        .ok_or_else(overflow)?;

    let annual_savings = input.annual_savings()?;
    let simple_payback_years = if annual_savings.is_zero() {
        warnings.push("Cash purchase payback undefined: monthly electric bill is zero".into());
        None
    } else {
        let payback = (base_price - state_rebate).checked_div(annual_savings);
        if payback.is_none() {
            warnings.push("Cash purchase payback undefined: savings too small to repay".into());
        }
        payback
    };

    Ok(CashPurchase {
        base_price,
        state_rebate,
        total_cost,
        monthly_savings: input.monthly_electric_bill,
        simple_payback_years,
    })
}

/// Monthly lease payment for each year of the term, escalating annually.
pub fn lease_option(terms: &LeaseTerms, term_years: u32) -> SolarFinanceResult<LeaseOption> {
    let growth = Decimal::ONE + terms.annual_escalator;
    let schedule = (1..=term_years)
        .map(|year| {
            let overflow = || SolarFinanceError::InvalidInput {
                field: "lease_terms.annual_escalator".into(),
                reason: format!("Escalation overflows by year {year}"),
            };
            let monthly_payment = growth
                .checked_powi(i64::from(year - 1))
                .and_then(|factor| terms.base_monthly_payment.checked_mul(factor))
                .ok_or_else(overflow)?;
            Ok(LeaseYear {
                year,
                monthly_payment,
            })
        })
        .collect::<SolarFinanceResult<Vec<_>>>()?;

    Ok(LeaseOption {
        annual_escalator: terms.annual_escalator,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LoanProfile;
    use crate::projection::input::{BatteryCreditGate, DiscountScope, EngineConfig};

    fn scenario(state: State, bill: Money) -> ScenarioInput {
        ScenarioInput {
            system_size_kw: dec!(7.5),
            cost_per_watt: dec!(5.88),
            battery_cost: Decimal::ZERO,
            roof_cost: dec!(5000),
            monthly_electric_bill: bill,
            state,
            lease_eligible: false,
            incentives_applied: true,
            include_incentives_in_cashflow: true,
            loan_profile: LoanProfile::new(25, dec!(4.49), dec!(35.99)),
            project_discount_percent: dec!(10),
            deferral_months: 3,
            discount_rate_for_npv: dec!(0.05),
            lease_terms: None,
            first_payment_date: None,
            config: EngineConfig {
                battery_credit_gate: BatteryCreditGate::WhenApplied,
                discount_scope: DiscountScope::BaseAndGross,
            },
        }
    }

    #[test]
    fn test_utility_comparison() {
        let view = utility_comparison(dec!(300)).unwrap();
        assert_eq!(view.escalated_bill, dec!(345));
        assert_eq!(view.escalated_bill_less_7_pct, dec!(320.85));
        assert_eq!(view.escalated_bill_less_15_pct, dec!(293.25));
    }

    #[test]
    fn test_cash_purchase_ny() {
        let mut warnings = Vec::new();
        let view = cash_purchase(&scenario(State::NY, dec!(300)), &mut warnings).unwrap();
        assert_eq!(view.base_price, dec!(44100));
        assert_eq!(view.state_rebate, dec!(1500));
        // (44100 + 5000) * 0.9 - 1500
        assert_eq!(view.total_cost, dec!(42690));
        // (44100 - 1500) / 3600
        let payback = view.simple_payback_years.unwrap();
        assert!((payback - dec!(11.8333)).abs() < dec!(0.0001));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_cash_purchase_nj_without_bill() {
        let mut warnings = Vec::new();
        let view = cash_purchase(&scenario(State::NJ, Decimal::ZERO), &mut warnings).unwrap();
        assert_eq!(view.state_rebate, Decimal::ZERO);
        assert_eq!(view.simple_payback_years, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_lease_escalation() {
        let terms = LeaseTerms {
            base_monthly_payment: dec!(110),
            annual_escalator: dec!(0.028),
        };
        let lease = lease_option(&terms, 3).unwrap();
        assert_eq!(lease.schedule.len(), 3);
        assert_eq!(lease.schedule[0].monthly_payment, dec!(110));
        assert_eq!(lease.schedule[1].monthly_payment, dec!(113.08));
        assert_eq!(lease.schedule[2].monthly_payment.round_dp(2), dec!(116.25));
    }

    #[test]
    fn test_runaway_escalator_is_an_error() {
        let terms = LeaseTerms {
            base_monthly_payment: dec!(110),
            annual_escalator: dec!(100000),
        };
        assert!(matches!(
            lease_option(&terms, 25),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_utility_comparison_overflow_is_an_error() {
        assert!(utility_comparison(Decimal::MAX).is_err());
    }
}
