use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::catalog::{LoanCatalog, LoanProfile, LoanProfileId};
use crate::error::SolarFinanceError;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};
use crate::SolarFinanceResult;

use super::amortization::{
    floor_principal, monthly_payment, paydown_payments, payment_schedule, PaydownPayment,
    PaymentScheduleEntry,
};
use super::cash_flow::{
    adjusted_system_cost, build_cash_flows, AnnualCashFlowRow, CashFlowProjection,
    MonthlyCashFlowRow,
};
use super::incentives::{cost_breakdown, incentive_breakdown, CostBreakdown, IncentiveBreakdown};
use super::input::{validate_scenario_input, ScenarioInput};
use super::metrics::{profitability_metrics, PaybackPeriod, ProfitabilityMetrics};
use super::offers::{
    cash_purchase, lease_option, utility_comparison, CashPurchase, LeaseOption, UtilityComparison,
};

/// Loan terms and payments for the selected profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancingSummary {
    pub loan_profile: LoanProfile,
    /// Principal of the base loan (the gross cost)
    pub financed_amount: Money,
    /// Gross cost less battery and state credits
    pub adjusted_principal: Money,
    pub monthly_rate: Rate,
    pub base_monthly_payment: Money,
    pub adjusted_monthly_payment: Money,
    pub deferral_months: u32,
    pub paydown: Vec<PaydownPayment>,
    pub payment_schedule: Vec<PaymentScheduleEntry>,
}

/// Everything derived from one [`ScenarioInput`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub costs: CostBreakdown,
    pub incentives: IncentiveBreakdown,
    pub financing: FinancingSummary,
    pub cash_flows: CashFlowProjection,
    pub metrics: ProfitabilityMetrics,
    pub utility: UtilityComparison,
    pub cash_purchase: CashPurchase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease: Option<LeaseOption>,
}

impl ScenarioResult {
    pub fn gross_cost(&self) -> Money {
        self.costs.gross_cost
    }

    pub fn annual_rows(&self) -> Vec<AnnualCashFlowRow> {
        self.cash_flows.annual_rows()
    }

    pub fn monthly_rows(&self) -> Vec<MonthlyCashFlowRow> {
        self.cash_flows.monthly_rows()
    }
}

/// One loan program's headline numbers for the same project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanComparisonRow {
    pub profile_id: LoanProfileId,
    pub profile: LoanProfile,
    pub gross_cost: Money,
    pub base_monthly_payment: Money,
    pub adjusted_monthly_payment: Money,
    pub npv: Money,
    pub irr: Option<Rate>,
    pub roi: Option<Rate>,
    pub payback_years: PaybackPeriod,
}

/// Run a full projection for one scenario.
///
/// Configuration and input errors abort; IRR, ROI and cash-purchase payback
/// failures leave the field `None` and add a warning.
pub fn compute(input: &ScenarioInput) -> SolarFinanceResult<ComputationOutput<ScenarioResult>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_scenario_input(input)?;
    let result = project(input, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Solar loan projection: dealer-fee gross-up, incentive credits, annuity payments, annual/monthly cash flows",
        &assumptions(input),
        warnings,
        elapsed,
        result,
    ))
}

/// Run the scenario once per catalog profile, substituting each profile for
/// `input.loan_profile`. Profiles the scenario cannot use (e.g. a deferral
/// longer than the term) are skipped with a warning.
pub fn compare_loan_profiles(
    input: &ScenarioInput,
    catalog: &LoanCatalog,
) -> SolarFinanceResult<ComputationOutput<Vec<LoanComparisonRow>>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_scenario_input(input)?;

    let mut rows = Vec::with_capacity(catalog.len());
    for (profile_id, profile) in catalog.iter() {
        let scenario = ScenarioInput {
            loan_profile: *profile,
            ..input.clone()
        };
        if let Err(e) = validate_scenario_input(&scenario) {
            warnings.push(format!("Skipped loan profile {profile_id} ({profile}): {e}"));
            continue;
        }

        let mut row_warnings = Vec::new();
        let result = project(&scenario, &mut row_warnings)?;
        warnings.extend(
            row_warnings
                .into_iter()
                .map(|w| format!("Loan profile {profile_id}: {w}")),
        );

        rows.push(LoanComparisonRow {
            profile_id,
            profile: *profile,
            gross_cost: result.costs.gross_cost,
            base_monthly_payment: result.financing.base_monthly_payment,
            adjusted_monthly_payment: result.financing.adjusted_monthly_payment,
            npv: result.metrics.npv,
            irr: result.metrics.irr,
            roi: result.metrics.roi,
            payback_years: result.metrics.payback_years,
        });
    }

    if rows.is_empty() {
        return Err(SolarFinanceError::InsufficientData(
            "No loan profile in the catalog can finance this scenario".into(),
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan program comparison: one projection per catalog profile",
        &assumptions(input),
        warnings,
        elapsed,
        rows,
    ))
}

fn project(input: &ScenarioInput, warnings: &mut Vec<String>) -> SolarFinanceResult<ScenarioResult> {
    let profile = &input.loan_profile;
    let annual_rate = profile.annual_rate();
    let term_months = profile.term_months()?;

    // --- Cost & incentives ---
    let costs = cost_breakdown(input)?;
    if costs.gross_cost <= Decimal::ZERO {
        return Err(SolarFinanceError::InvalidInput {
            field: "battery_cost".into(),
            reason: format!(
                "Battery cost leaves nothing to finance (gross cost {})",
                costs.gross_cost.round_dp(2)
            ),
        });
    }
    let incentives = incentive_breakdown(input, &costs)?;
    debug!(
        base_cost = %costs.base_cost,
        gross_cost = %costs.gross_cost,
        federal_tax_credit = %incentives.federal_tax_credit,
        battery_credit = %incentives.battery_credit,
        state_credit = %incentives.state_credit,
        "costs and incentives derived"
    );

    // --- Financing ---
    let base_monthly_payment = monthly_payment(costs.gross_cost, annual_rate, term_months)?;
    let adjusted_principal = floor_principal(
        costs.gross_cost - incentives.loan_paydown_credits(),
        "Adjusted loan",
        warnings,
    );
    let adjusted_monthly_payment = monthly_payment(adjusted_principal, annual_rate, term_months)?;
    let paydown = paydown_payments(
        costs.gross_cost,
        incentives.federal_tax_credit,
        incentives.total,
        annual_rate,
        term_months,
        warnings,
    )?;
    let schedule = payment_schedule(
        base_monthly_payment,
        adjusted_monthly_payment,
        term_months,
        input.deferral_months,
        input.first_payment_date,
    );
    debug!(
        base_monthly_payment = %base_monthly_payment,
        adjusted_monthly_payment = %adjusted_monthly_payment,
        deferral_months = input.deferral_months,
        "loan payments derived"
    );

    // --- Cash flows & profitability ---
    let adjusted_cost = adjusted_system_cost(
        costs.gross_cost,
        incentives.total,
        input.include_incentives_in_cashflow,
    );
    let cash_flows =
        build_cash_flows(adjusted_cost, input.monthly_electric_bill, profile.term_years)?;
    let metrics = profitability_metrics(&cash_flows, input.discount_rate_for_npv, warnings)?;
    debug!(
        adjusted_system_cost = %adjusted_cost,
        npv = %metrics.npv,
        irr = ?metrics.irr,
        roi = ?metrics.roi,
        "profitability metrics derived"
    );

    // --- Alternative offers ---
    let lease = input
        .lease_terms
        .as_ref()
        .map(|terms| lease_option(terms, profile.term_years))
        .transpose()?;

    Ok(ScenarioResult {
        financing: FinancingSummary {
            loan_profile: *profile,
            financed_amount: costs.gross_cost,
            adjusted_principal,
            monthly_rate: profile.monthly_rate(),
            base_monthly_payment,
            adjusted_monthly_payment,
            deferral_months: input.deferral_months,
            paydown,
            payment_schedule: schedule,
        },
        costs,
        incentives,
        cash_flows,
        metrics,
        utility: utility_comparison(input.monthly_electric_bill)?,
        cash_purchase: cash_purchase(input, warnings)?,
        lease,
    })
}

fn assumptions(input: &ScenarioInput) -> serde_json::Value {
    serde_json::json!({
        "loan_profile": input.loan_profile.to_string(),
        "monthly_rate": "apr / 12",
        "battery_credit_gate": input.config.battery_credit_gate,
        "discount_scope": input.config.discount_scope,
        "project_discount_percent": input.project_discount_percent.to_string(),
        "deferral_months": input.deferral_months,
        "deferral_interest": "not capitalised",
        "discount_rate_for_npv": input.discount_rate_for_npv.to_string(),
        "include_incentives_in_cashflow": input.include_incentives_in_cashflow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::input::{BatteryCreditGate, DiscountScope, EngineConfig, State};
    use rust_decimal_macros::dec;

    fn scenario() -> ScenarioInput {
        ScenarioInput {
            system_size_kw: dec!(5.2),
            cost_per_watt: dec!(10.0),
            battery_cost: Decimal::ZERO,
            roof_cost: Decimal::ZERO,
            monthly_electric_bill: dec!(300),
            state: State::NY,
            lease_eligible: false,
            incentives_applied: true,
            include_incentives_in_cashflow: true,
            loan_profile: LoanProfile::new(25, dec!(4.49), dec!(8.99)),
            project_discount_percent: Decimal::ZERO,
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
    fn test_compute_wires_components() {
        let output = compute(&scenario()).unwrap();
        let result = &output.result;
        assert_eq!(result.costs.base_cost, dec!(52000));
        assert_eq!(result.financing.financed_amount, result.costs.gross_cost);
        assert_eq!(result.financing.payment_schedule.len(), 300);
        assert!(result.financing.payment_schedule[2].base_payment.is_zero());
        assert_eq!(
            result.financing.payment_schedule[3].base_payment,
            result.financing.base_monthly_payment
        );
        assert_eq!(
            result.financing.adjusted_principal,
            result.costs.gross_cost - result.incentives.battery_credit - result.incentives.state_credit
        );
        assert!(result.financing.adjusted_monthly_payment < result.financing.base_monthly_payment);
        assert_eq!(result.cash_flows.annual.len(), 26);
        assert_eq!(result.cash_flows.monthly.len(), 301);
        assert!(result.lease.is_none());
        assert_eq!(output.metadata.precision, "rust_decimal_128bit");
    }

    #[test]
    fn test_gross_cost_must_be_positive() {
        let mut input = scenario();
        input.battery_cost = dec!(60000);
        assert!(matches!(
            compute(&input),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_compare_skips_profiles_shorter_than_deferral() {
        let mut input = scenario();
        input.deferral_months = 100;
        let output = compare_loan_profiles(&input, LoanCatalog::standard()).unwrap();
        // 7-year programs (84 months) cannot absorb a 100-month deferral
        assert_eq!(output.result.len(), 27);
        assert!(output.result.iter().all(|r| r.profile.term_years > 7));
        assert_eq!(
            output
                .warnings
                .iter()
                .filter(|w| w.starts_with("Skipped"))
                .count(),
            5
        );
    }
}
