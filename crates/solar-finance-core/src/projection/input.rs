use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::catalog::LoanProfile;
use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

/// Jurisdiction for state-level incentives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    NY,
    NJ,
}

/// When the battery and state credits are granted, relative to the
/// `incentives_applied` flag. Neither sense is assumed; the caller chooses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatteryCreditGate {
    /// Credit granted only when incentives are not already counted elsewhere
    WhenNotApplied,
    /// Credit granted only when incentives are flagged as applied
    WhenApplied,
}

impl BatteryCreditGate {
    pub fn is_open(self, incentives_applied: bool) -> bool {
        match self {
            BatteryCreditGate::WhenNotApplied => !incentives_applied,
            BatteryCreditGate::WhenApplied => incentives_applied,
        }
    }
}

/// Which cost components the project discount scales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscountScope {
    /// Discount reduces the base cost only; the financed gross cost is unchanged
    BaseOnly,
    /// Discount reduces both, so financing, incentives and cash flows follow it
    BaseAndGross,
}

/// Engine switches with no default; every input states them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub battery_credit_gate: BatteryCreditGate,
    pub discount_scope: DiscountScope,
}

/// Optional lease offer shown next to the loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseTerms {
    /// Monthly lease payment in year one
    pub base_monthly_payment: Money,
    /// Yearly escalator as a decimal (0.028 = 2.8%)
    pub annual_escalator: Rate,
}

/// Upper bounds on customer inputs. Residential projects sit far below
/// them, and they keep every derived amount inside `Decimal` range.
pub const MAX_SYSTEM_SIZE_KW: Decimal = dec!(1000);
pub const MAX_COST_PER_WATT: Money = dec!(100);
pub const MAX_COMPONENT_COST: Money = dec!(10000000);
pub const MAX_MONTHLY_AMOUNT: Money = dec!(1000000);

fn default_true() -> bool {
    true
}

fn default_npv_rate() -> Rate {
    dec!(0.05)
}

/// Complete set of customer and project parameters for one projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInput {
    /// DC system size in kW
    pub system_size_kw: Decimal,
    /// Installed cost per watt
    pub cost_per_watt: Money,
    /// Battery add-on cost
    #[serde(default)]
    pub battery_cost: Money,
    /// Roofing work bundled with the project
    #[serde(default)]
    pub roof_cost: Money,
    /// Current monthly utility bill, taken as the monthly saving
    pub monthly_electric_bill: Money,
    pub state: State,
    /// Leased systems are not owner-eligible for the federal credit
    pub lease_eligible: bool,
    pub incentives_applied: bool,
    /// Subtract incentives from the upfront outlay of the cash-flow series
    #[serde(default = "default_true")]
    pub include_incentives_in_cashflow: bool,
    pub loan_profile: LoanProfile,
    /// Project discount in percent, [0, 100]
    #[serde(default)]
    pub project_discount_percent: Decimal,
    /// Months at the start of the loan with no payment due
    #[serde(default)]
    pub deferral_months: u32,
    #[serde(default = "default_npv_rate")]
    pub discount_rate_for_npv: Rate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_terms: Option<LeaseTerms>,
    /// Dates the payment schedule when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_payment_date: Option<NaiveDate>,
    pub config: EngineConfig,
}

impl ScenarioInput {
    /// `1 - project_discount_percent / 100`
    pub fn discount_factor(&self) -> Decimal {
        Decimal::ONE - self.project_discount_percent / dec!(100)
    }

    pub fn annual_savings(&self) -> SolarFinanceResult<Money> {
        self.monthly_electric_bill
            .checked_mul(dec!(12))
            .ok_or_else(|| SolarFinanceError::overflow("annual_savings"))
    }
}

/// Reject inputs the engine cannot price. Loan profile problems are
/// configuration errors; everything else is invalid input.
pub(crate) fn validate_scenario_input(input: &ScenarioInput) -> SolarFinanceResult<()> {
    input.loan_profile.validate()?;

    check_range(
        "system_size_kw",
        input.system_size_kw,
        Decimal::ZERO,
        MAX_SYSTEM_SIZE_KW,
        true,
    )?;
    check_range(
        "cost_per_watt",
        input.cost_per_watt,
        Decimal::ZERO,
        MAX_COST_PER_WATT,
        true,
    )?;
    check_range(
        "battery_cost",
        input.battery_cost,
        Decimal::ZERO,
        MAX_COMPONENT_COST,
        false,
    )?;
    check_range(
        "roof_cost",
        input.roof_cost,
        Decimal::ZERO,
        MAX_COMPONENT_COST,
        false,
    )?;
    check_range(
        "monthly_electric_bill",
        input.monthly_electric_bill,
        Decimal::ZERO,
        MAX_MONTHLY_AMOUNT,
        false,
    )?;
    if input.project_discount_percent < Decimal::ZERO || input.project_discount_percent > dec!(100)
    {
        return Err(SolarFinanceError::InvalidInput {
            field: "project_discount_percent".into(),
            reason: format!(
                "Project discount must be in [0, 100], got {}",
                input.project_discount_percent
            ),
        });
    }
    let term_months = input.loan_profile.term_months()?;
    if input.deferral_months >= term_months {
        return Err(SolarFinanceError::InvalidInput {
            field: "deferral_months".into(),
            reason: format!(
                "Deferral of {} months leaves no payments in a {term_months}-month term",
                input.deferral_months,
            ),
        });
    }
    if input.discount_rate_for_npv <= dec!(-1) {
        return Err(SolarFinanceError::InvalidInput {
            field: "discount_rate_for_npv".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    if let Some(lease) = &input.lease_terms {
        check_range(
            "lease_terms.base_monthly_payment",
            lease.base_monthly_payment,
            Decimal::ZERO,
            MAX_MONTHLY_AMOUNT,
            false,
        )?;
        if lease.annual_escalator <= dec!(-1) {
            return Err(SolarFinanceError::InvalidInput {
                field: "lease_terms.annual_escalator".into(),
                reason: "Escalator must be greater than -100%".into(),
            });
        }
    }
    Ok(())
}

/// `value` in `[min, max]`, or `(min, max]` when `exclusive_min`.
fn check_range(
    field: &str,
    value: Decimal,
    min: Decimal,
    max: Decimal,
    exclusive_min: bool,
) -> SolarFinanceResult<()> {
    let below = if exclusive_min { value <= min } else { value < min };
    if below || value > max {
        let lower = if exclusive_min { "(" } else { "[" };
        return Err(SolarFinanceError::InvalidInput {
            field: field.into(),
            reason: format!("Must be in {lower}{min}, {max}], got {value}"),
        });
    }
    Ok(())
}
