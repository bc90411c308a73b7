use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::time_value;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

/// One month of the loan's payment schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentScheduleEntry {
    /// 1-based month number
    pub month: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub base_payment: Money,
    pub adjusted_payment: Money,
}

/// Principal reductions shown on the incentive paydown table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaydownTier {
    NoIncentives,
    FederalCredit,
    AllIncentives,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaydownPayment {
    pub tier: PaydownTier,
    pub principal: Money,
    pub monthly_payment: Money,
}

/// Fixed-rate, fully amortising monthly payment, returned as a positive
/// magnitude: `P * r / (1 - (1 + r)^-n)` with `r = annual_rate / 12`.
pub fn monthly_payment(
    principal: Money,
    annual_rate: Rate,
    term_months: u32,
) -> SolarFinanceResult<Money> {
    if term_months == 0 {
        return Err(SolarFinanceError::InvalidInput {
            field: "term_months".into(),
            reason: "Loan term must be at least one month".into(),
        });
    }
    if principal < Decimal::ZERO {
        return Err(SolarFinanceError::InvalidInput {
            field: "principal".into(),
            reason: format!("Principal cannot be negative, got {principal}"),
        });
    }

    let payment = time_value::pmt(annual_rate / dec!(12), term_months, principal, Decimal::ZERO)?;
    Ok(payment.abs())
}

/// `term_months` payments of `payment`, the first `deferral_months` of
/// which are zero. Interest accrued during the deferral is not capitalised.
pub fn deferred_payments(payment: Money, term_months: u32, deferral_months: u32) -> Vec<Money> {
    (1..=term_months)
        .map(|month| {
            if month <= deferral_months {
                Decimal::ZERO
            } else {
                payment
            }
        })
        .collect()
}

/// Month-by-month schedule for the base and incentive-adjusted loans.
pub fn payment_schedule(
    base_payment: Money,
    adjusted_payment: Money,
    term_months: u32,
    deferral_months: u32,
    first_payment_date: Option<NaiveDate>,
) -> Vec<PaymentScheduleEntry> {
    let base = deferred_payments(base_payment, term_months, deferral_months);
    let adjusted = deferred_payments(adjusted_payment, term_months, deferral_months);

    base.into_iter()
        .zip(adjusted)
        .enumerate()
        .map(|(i, (base_payment, adjusted_payment))| PaymentScheduleEntry {
            month: i as u32 + 1,
            date: first_payment_date.and_then(|d| d.checked_add_months(Months::new(i as u32))),
            base_payment,
            adjusted_payment,
        })
        .collect()
}

/// Payment at each paydown tier. Principals that incentives would drive
/// below zero are floored at zero and reported in `warnings`.
pub fn paydown_payments(
    gross_cost: Money,
    federal_credit: Money,
    total_credits: Money,
    annual_rate: Rate,
    term_months: u32,
    warnings: &mut Vec<String>,
) -> SolarFinanceResult<Vec<PaydownPayment>> {
    let tiers = [
        (PaydownTier::NoIncentives, gross_cost),
        (PaydownTier::FederalCredit, gross_cost - federal_credit),
        (PaydownTier::AllIncentives, gross_cost - total_credits),
    ];

    tiers
        .into_iter()
        .map(|(tier, principal)| {
            let principal = floor_principal(principal, &format!("{tier:?} paydown"), warnings);
            Ok(PaydownPayment {
                tier,
                principal,
                monthly_payment: monthly_payment(principal, annual_rate, term_months)?,
            })
        })
        .collect()
}

pub(crate) fn floor_principal(principal: Money, label: &str, warnings: &mut Vec<String>) -> Money {
    if principal < Decimal::ZERO {
        warnings.push(format!(
            "{label}: incentives exceed the financed amount by {}; principal floored at 0",
            principal.abs().round_dp(2)
        ));
        Decimal::ZERO
    } else {
        principal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::MathematicalOps;

    #[test]
    fn test_reference_payment_25_years() {
        let principal = dec!(52000) / dec!(0.9101);
        let payment = monthly_payment(principal, dec!(0.0449), 300).unwrap();
        // Standard annuity formula, evaluated independently
        let r = dec!(0.0449) / dec!(12);
        let reference = principal * r / (Decimal::ONE - Decimal::ONE / (Decimal::ONE + r).powi(300));
        let relative = ((payment - reference) / reference).abs();
        assert!(relative < dec!(0.000001), "payment {payment} vs {reference}");
        assert!((payment - dec!(317.26)).abs() < dec!(0.01));
    }

    #[test]
    fn test_annuity_present_value_identity() {
        let principal = dec!(40000);
        let payment = monthly_payment(principal, dec!(0.0699), 120).unwrap();
        let mut flows = vec![Decimal::ZERO];
        flows.extend(std::iter::repeat(payment).take(120));
        let pv = time_value::npv(dec!(0.0699) / dec!(12), &flows).unwrap();
        assert!((pv - principal).abs() < dec!(0.0001), "pv {pv}");
    }

    #[test]
    fn test_zero_principal_zero_payment() {
        assert_eq!(monthly_payment(Decimal::ZERO, dec!(0.05), 120).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_invalid_term_and_principal() {
        assert!(matches!(
            monthly_payment(dec!(1000), dec!(0.05), 0),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
        assert!(matches!(
            monthly_payment(dec!(-1), dec!(0.05), 12),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_deferral_zeroes_leading_months() {
        let payments = deferred_payments(dec!(250), 12, 3);
        assert_eq!(payments.len(), 12);
        assert!(payments[..3].iter().all(|p| p.is_zero()));
        assert!(payments[3..].iter().all(|p| *p == dec!(250)));
    }

    #[test]
    fn test_schedule_dates_follow_calendar_months() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let schedule = payment_schedule(dec!(300), dec!(200), 24, 0, Some(start));
        assert_eq!(schedule.len(), 24);
        assert_eq!(schedule[0].month, 1);
        assert_eq!(schedule[0].date, Some(start));
        // Month-end clamps to the last day of February
        assert_eq!(schedule[1].date, NaiveDate::from_ymd_opt(2025, 2, 28));
        assert_eq!(schedule[23].date, NaiveDate::from_ymd_opt(2026, 12, 31));
        assert_eq!(schedule[5].adjusted_payment, dec!(200));
    }

    #[test]
    fn test_paydown_floors_negative_principal() {
        let mut warnings = Vec::new();
        let tiers = paydown_payments(
            dec!(10000),
            dec!(3000),
            dec!(12000),
            dec!(0.0599),
            120,
            &mut warnings,
        )
        .unwrap();
        assert_eq!(tiers.len(), 3);
        assert_eq!(tiers[0].tier, PaydownTier::NoIncentives);
        assert_eq!(tiers[1].principal, dec!(7000));
        assert_eq!(tiers[2].principal, Decimal::ZERO);
        assert_eq!(tiers[2].monthly_payment, Decimal::ZERO);
        assert!(tiers[0].monthly_payment > tiers[1].monthly_payment);
        assert_eq!(warnings.len(), 1);
    }
}
