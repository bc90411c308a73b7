use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::catalog::dealer_fee_factor;
use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

use super::input::{DiscountScope, ScenarioInput, State};

pub const WATTS_PER_KW: Decimal = dec!(1000);
/// Federal credit applies to at most this many kW of the system.
pub const FEDERAL_CREDIT_SIZE_CAP_KW: Decimal = dec!(8);
pub const FEDERAL_CREDIT_RATE: Rate = dec!(0.30);
pub const BATTERY_CREDIT_RATE: Rate = dec!(0.30);
pub const STATE_CREDIT_RATE: Rate = dec!(0.25);
pub const STATE_CREDIT_CAP: Money = dec!(5000);

/// Project cost as priced and as financed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// `cost_per_watt * 1000 * size - battery_cost`
    pub base_cost: Money,
    /// Base cost after the project discount
    pub discounted_base_cost: Money,
    /// Financed amount after the dealer-fee gross-up
    pub gross_cost: Money,
    pub dealer_fee_factor: Decimal,
    /// Dealer-fee markup on the base cost, after the project discount
    pub company_margin: Money,
}

/// Credits the customer can claim against the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncentiveBreakdown {
    pub federal_tax_credit: Money,
    pub battery_credit: Money,
    pub state_credit: Money,
    pub total: Money,
    /// Whether the configured gate granted the battery and state credits
    pub credit_gate_open: bool,
}

impl IncentiveBreakdown {
    /// Credits applied against the loan principal (battery + state).
    pub fn loan_paydown_credits(&self) -> Money {
        self.battery_credit + self.state_credit
    }
}

/// `(cost_per_watt * 1000 * size - battery_cost) / (1 - dealer_fee / 100)`
pub fn gross_cost(
    system_size_kw: Decimal,
    cost_per_watt: Money,
    battery_cost: Money,
    dealer_fee_percent: Decimal,
) -> SolarFinanceResult<Money> {
    let factor = dealer_fee_factor(dealer_fee_percent)?;
    base_cost(system_size_kw, cost_per_watt, battery_cost)?
        .checked_div(factor)
        .ok_or_else(|| SolarFinanceError::overflow("gross_cost"))
}

fn base_cost(
    system_size_kw: Decimal,
    cost_per_watt: Money,
    battery_cost: Money,
) -> SolarFinanceResult<Money> {
    cost_per_watt
        .checked_mul(WATTS_PER_KW)
        .and_then(|v| v.checked_mul(system_size_kw))
        .and_then(|v| v.checked_sub(battery_cost))
        .ok_or_else(|| SolarFinanceError::overflow("base_cost"))
}

/// Base, discounted and gross cost for the scenario, with the discount
/// applied according to the configured [`DiscountScope`].
///
/// The company margin is the dealer-fee markup on the base cost, scaled by
/// the discount under either scope.
pub fn cost_breakdown(input: &ScenarioInput) -> SolarFinanceResult<CostBreakdown> {
    let fee_factor = input.loan_profile.dealer_fee_factor()?;
    let discount = input.discount_factor();
    let overflow = || SolarFinanceError::overflow("gross_cost");

    let base_cost = base_cost(input.system_size_kw, input.cost_per_watt, input.battery_cost)?;
    let discounted_base_cost = base_cost.checked_mul(discount).ok_or_else(overflow)?;
    let undiscounted_gross = base_cost.checked_div(fee_factor).ok_or_else(overflow)?;
    let gross_cost = match input.config.discount_scope {
        DiscountScope::BaseOnly => undiscounted_gross,
        DiscountScope::BaseAndGross => discounted_base_cost
            .checked_div(fee_factor)
            .ok_or_else(overflow)?,
    };
    let company_margin = undiscounted_gross
        .checked_sub(base_cost)
        .and_then(|markup| markup.checked_mul(discount))
        .ok_or_else(overflow)?;

    Ok(CostBreakdown {
        base_cost,
        discounted_base_cost,
        gross_cost,
        dealer_fee_factor: fee_factor,
        company_margin,
    })
}

/// 30% of the grossed-up cost of at most 8 kW; zero for leased systems.
pub fn federal_tax_credit(
    input: &ScenarioInput,
    dealer_fee_factor: Decimal,
) -> SolarFinanceResult<Money> {
    if input.lease_eligible {
        return Ok(Decimal::ZERO);
    }
    let capped_size = input.system_size_kw.min(FEDERAL_CREDIT_SIZE_CAP_KW);
    input
        .cost_per_watt
        .checked_mul(WATTS_PER_KW)
        .and_then(|v| v.checked_mul(capped_size))
        .and_then(|v| v.checked_div(dealer_fee_factor))
        .and_then(|v| v.checked_mul(FEDERAL_CREDIT_RATE))
        .ok_or_else(|| SolarFinanceError::overflow("federal_tax_credit"))
}

/// Federal, battery and state credits. Battery and state credits are both
/// subject to `config.battery_credit_gate`; the state credit exists for NY only.
pub fn incentive_breakdown(
    input: &ScenarioInput,
    costs: &CostBreakdown,
) -> SolarFinanceResult<IncentiveBreakdown> {
    let federal_tax_credit = federal_tax_credit(input, costs.dealer_fee_factor)?;
    let credit_gate_open = input
        .config
        .battery_credit_gate
        .is_open(input.incentives_applied);

    let creditable = costs
        .gross_cost
        .checked_add(input.battery_cost)
        .ok_or_else(|| SolarFinanceError::overflow("battery_credit"))?;
    let (battery_credit, state_credit) = if credit_gate_open {
        let state_credit = match input.state {
            State::NY => STATE_CREDIT_CAP.min(creditable * STATE_CREDIT_RATE),
            State::NJ => Decimal::ZERO,
        };
        (creditable * BATTERY_CREDIT_RATE, state_credit)
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };
    let total = federal_tax_credit
        .checked_add(battery_credit)
        .and_then(|v| v.checked_add(state_credit))
        .ok_or_else(|| SolarFinanceError::overflow("incentives.total"))?;

    Ok(IncentiveBreakdown {
        federal_tax_credit,
        battery_credit,
        state_credit,
        total,
        credit_gate_open,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LoanProfile;
    use crate::projection::input::{BatteryCreditGate, EngineConfig};

    fn input(system_size_kw: Decimal, dealer_fee: Decimal) -> ScenarioInput {
        ScenarioInput {
            system_size_kw,
            cost_per_watt: dec!(10.0),
            battery_cost: Decimal::ZERO,
            roof_cost: Decimal::ZERO,
            monthly_electric_bill: dec!(250),
            state: State::NY,
            lease_eligible: false,
            incentives_applied: true,
            include_incentives_in_cashflow: true,
            loan_profile: LoanProfile::new(25, dec!(4.49), dealer_fee),
            project_discount_percent: Decimal::ZERO,
            deferral_months: 0,
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
    fn test_gross_cost_reference_example() {
        let gross = gross_cost(dec!(5.2), dec!(10.0), Decimal::ZERO, dec!(8.99)).unwrap();
        // 52000 / 0.9101 ≈ 57136.58
        assert!((gross - dec!(57136.58)).abs() < dec!(0.01), "got {gross}");
    }

    #[test]
    fn test_gross_cost_fee_of_100_is_configuration_error() {
        assert!(matches!(
            gross_cost(dec!(5.2), dec!(10.0), Decimal::ZERO, dec!(100)),
            Err(SolarFinanceError::Configuration { .. })
        ));
    }

    #[test]
    fn test_cost_breakdown_without_discount() {
        let costs = cost_breakdown(&input(dec!(5.2), dec!(8.99))).unwrap();
        assert_eq!(costs.base_cost, dec!(52000));
        assert_eq!(costs.discounted_base_cost, dec!(52000));
        assert!((costs.gross_cost - dec!(57136.58)).abs() < dec!(0.01));
        assert!((costs.company_margin - dec!(5136.58)).abs() < dec!(0.01));
    }

    #[test]
    fn test_discount_scope_base_only_keeps_financed_amount() {
        let mut scenario = input(dec!(5.2), dec!(8.99));
        scenario.project_discount_percent = dec!(10);
        scenario.config.discount_scope = DiscountScope::BaseOnly;
        let costs = cost_breakdown(&scenario).unwrap();
        assert_eq!(costs.discounted_base_cost, dec!(46800));
        assert!((costs.gross_cost - dec!(57136.58)).abs() < dec!(0.01));
        // Markup 5,136.58 scaled by the 10% discount
        assert!((costs.company_margin - dec!(4622.92)).abs() < dec!(0.01));

        scenario.config.discount_scope = DiscountScope::BaseAndGross;
        let costs = cost_breakdown(&scenario).unwrap();
        assert!((costs.gross_cost - dec!(51422.92)).abs() < dec!(0.01));
    }

    #[test]
    fn test_federal_credit_caps_size_at_8kw() {
        let scenario = input(dec!(10), dec!(0));
        // 10 * 1000 * 8 * 0.30
        assert_eq!(federal_tax_credit(&scenario, Decimal::ONE).unwrap(), dec!(24000));
    }

    #[test]
    fn test_federal_credit_zero_for_lease() {
        let mut scenario = input(dec!(5.2), dec!(8.99));
        scenario.lease_eligible = true;
        assert_eq!(federal_tax_credit(&scenario, dec!(0.9101)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_ny_credits_with_gate_open() {
        let scenario = input(dec!(5.2), dec!(0));
        let costs = cost_breakdown(&scenario).unwrap();
        let incentives = incentive_breakdown(&scenario, &costs).unwrap();
        assert!(incentives.credit_gate_open);
        assert_eq!(incentives.federal_tax_credit, dec!(15600));
        assert_eq!(incentives.battery_credit, dec!(15600));
        // 0.25 * 52000 = 13000, capped at 5000
        assert_eq!(incentives.state_credit, dec!(5000));
        assert_eq!(incentives.total, dec!(36200));
        assert_eq!(incentives.loan_paydown_credits(), dec!(20600));
    }

    #[test]
    fn test_state_credit_below_cap() {
        let scenario = input(dec!(1), dec!(0));
        let costs = cost_breakdown(&scenario).unwrap();
        let incentives = incentive_breakdown(&scenario, &costs).unwrap();
        assert_eq!(incentives.state_credit, dec!(2500));
    }

    #[test]
    fn test_nj_has_no_state_credit() {
        let mut scenario = input(dec!(5.2), dec!(0));
        scenario.state = State::NJ;
        let costs = cost_breakdown(&scenario).unwrap();
        let incentives = incentive_breakdown(&scenario, &costs).unwrap();
        assert_eq!(incentives.state_credit, Decimal::ZERO);
        assert_eq!(incentives.battery_credit, dec!(15600));
    }

    #[test]
    fn test_gate_when_not_applied_closes_credits() {
        let mut scenario = input(dec!(5.2), dec!(0));
        scenario.config.battery_credit_gate = BatteryCreditGate::WhenNotApplied;
        let costs = cost_breakdown(&scenario).unwrap();
        let incentives = incentive_breakdown(&scenario, &costs).unwrap();
        assert!(!incentives.credit_gate_open);
        assert_eq!(incentives.battery_credit, Decimal::ZERO);
        assert_eq!(incentives.state_credit, Decimal::ZERO);
        assert_eq!(incentives.total, incentives.federal_tax_credit);

        scenario.incentives_applied = false;
        let incentives = incentive_breakdown(&scenario, &costs).unwrap();
        assert!(incentives.credit_gate_open);
        assert_eq!(incentives.battery_credit, dec!(15600));
    }

    #[test]
    fn test_margin_shrinks_with_discount_under_both_scopes() {
        let mut scenario = input(dec!(5.2), dec!(35.99));
        scenario.config.discount_scope = DiscountScope::BaseOnly;
        let full = cost_breakdown(&scenario).unwrap();
        // 52000 / 0.6401 - 52000
        assert!((full.company_margin - dec!(29237.31)).abs() < dec!(0.01));

        scenario.project_discount_percent = dec!(10);
        let base_only = cost_breakdown(&scenario).unwrap();
        assert!((base_only.company_margin - dec!(26313.58)).abs() < dec!(0.01));

        scenario.config.discount_scope = DiscountScope::BaseAndGross;
        let both = cost_breakdown(&scenario).unwrap();
        assert!((both.company_margin - base_only.company_margin).abs() < dec!(0.000001));
        assert!(
            (both.company_margin - (both.gross_cost - both.discounted_base_cost)).abs()
                < dec!(0.000001)
        );
    }

    #[test]
    fn test_cost_overflow_is_an_error() {
        // A dealer fee a hair under 100% drives the gross-up past Decimal range
        let scenario = input(dec!(1000), dec!(99.99999999999999999999999));
        assert!(matches!(
            cost_breakdown(&scenario),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }
}
