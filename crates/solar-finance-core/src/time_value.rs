use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::SolarFinanceError;
use crate::types::{Money, Rate};
use crate::SolarFinanceResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Bracket searched by the bisection fallback of [`irr`].
pub const IRR_LOWER_BOUND: Rate = dec!(-0.9);
pub const IRR_UPPER_BOUND: Rate = dec!(10);

/// Net Present Value of a series of cash flows.
///
/// `NPV = sum(cf[t] / (1 + rate)^t)`; index 0 is undiscounted.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> SolarFinanceResult<Money> {
    if rate <= dec!(-1) {
        return Err(SolarFinanceError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount = discount
                .checked_mul(one_plus_r)
                .ok_or_else(|| SolarFinanceError::InvalidInput {
                    field: "rate".into(),
                    reason: format!("Discount factor overflows at period {t}"),
                })?;
        }
        if discount.is_zero() {
            return Err(SolarFinanceError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result = cf
            .checked_div(discount)
            .and_then(|pv| result.checked_add(pv))
            .ok_or_else(|| SolarFinanceError::overflow("npv"))?;
    }

    Ok(result)
}

/// Internal Rate of Return of periodic cash flows.
///
/// Newton-Raphson from `guess`; if that diverges, leaves the
/// `[IRR_LOWER_BOUND, IRR_UPPER_BOUND]` bracket or stalls, bisection over the
/// bracket takes over. Both are capped at 100 iterations.
pub fn irr(cash_flows: &[Money], guess: Rate) -> SolarFinanceResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(SolarFinanceError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    // NPV sign is invariant under positive scaling; normalising keeps the
    // discounted products inside Decimal range.
    let scale = cash_flows
        .iter()
        .map(|cf| cf.abs())
        .max()
        .unwrap_or(Decimal::ZERO);
    if scale.is_zero() {
        return Err(SolarFinanceError::NoConvergence {
            function: "IRR".into(),
            iterations: 0,
            last_delta: Decimal::ZERO,
        });
    }
    let flows: Vec<Decimal> = cash_flows.iter().map(|cf| cf / scale).collect();

    match newton(&flows, guess) {
        Some(rate) => Ok(rate),
        None => bisect(&flows),
    }
}

fn newton(flows: &[Decimal], guess: Rate) -> Option<Rate> {
    if guess <= IRR_LOWER_BOUND || guess >= IRR_UPPER_BOUND {
        return None;
    }

    let mut rate = guess;
    for _ in 0..MAX_IRR_ITERATIONS {
        let (value, slope) = npv_and_slope(flows, rate)?;
        if value.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }
        if slope.is_zero() {
            return None;
        }
        let next = rate - value.checked_div(slope)?;
        if next <= IRR_LOWER_BOUND || next >= IRR_UPPER_BOUND {
            return None;
        }
        rate = next;
    }
    None
}

fn bisect(flows: &[Decimal]) -> SolarFinanceResult<Rate> {
    let no_convergence = |iterations: u32, last_delta: Decimal| SolarFinanceError::NoConvergence {
        function: "IRR".into(),
        iterations,
        last_delta,
    };

    let mut lo = IRR_LOWER_BOUND;
    let mut hi = IRR_UPPER_BOUND;
    let mut f_lo = discounted_sum(flows, lo).ok_or_else(|| no_convergence(0, Decimal::ZERO))?;
    let f_hi = discounted_sum(flows, hi).ok_or_else(|| no_convergence(0, Decimal::ZERO))?;

    if f_lo.is_zero() {
        return Ok(lo);
    }
    if f_hi.is_zero() {
        return Ok(hi);
    }
    if f_lo.is_sign_negative() == f_hi.is_sign_negative() {
        return Err(no_convergence(0, f_lo.abs().min(f_hi.abs())));
    }

    let mut last_delta = f_lo;
    for i in 0..MAX_IRR_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let f_mid = discounted_sum(flows, mid).ok_or_else(|| no_convergence(i, last_delta))?;
        if f_mid.abs() < CONVERGENCE_THRESHOLD || (hi - lo) / dec!(2) < CONVERGENCE_THRESHOLD {
            return Ok(mid);
        }
        if f_mid.is_sign_negative() == f_lo.is_sign_negative() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        last_delta = f_mid;
    }

    Err(no_convergence(MAX_IRR_ITERATIONS, last_delta))
}

/// `sum(cf[t] * v^t)` with `v = 1 / (1 + rate)`; `None` on Decimal overflow.
fn discounted_sum(flows: &[Decimal], rate: Rate) -> Option<Decimal> {
    let v = Decimal::ONE.checked_div(Decimal::ONE + rate)?;
    let mut factor = Decimal::ONE;
    let mut sum = Decimal::ZERO;
    for (t, cf) in flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        sum = sum.checked_add(cf.checked_mul(factor)?)?;
    }
    Some(sum)
}

/// NPV and its derivative with respect to the rate.
fn npv_and_slope(flows: &[Decimal], rate: Rate) -> Option<(Decimal, Decimal)> {
    let v = Decimal::ONE.checked_div(Decimal::ONE + rate)?;
    let mut factor = Decimal::ONE;
    let mut value = Decimal::ZERO;
    let mut slope = Decimal::ZERO;
    for (t, cf) in flows.iter().enumerate() {
        if t > 0 {
            factor = factor.checked_mul(v)?;
        }
        value = value.checked_add(cf.checked_mul(factor)?)?;
        // d/dr [cf * v^t] = -t * cf * v^(t+1)
        let term = Decimal::from(t as u64)
            .checked_mul(*cf)?
            .checked_mul(factor)?
            .checked_mul(v)?;
        slope = slope.checked_sub(term)?;
    }
    Some((value, slope))
}

/// Payment (PMT), spreadsheet sign convention: a positive present value
/// yields a negative payment.
pub fn pmt(
    rate: Rate,
    nper: u32,
    present_value: Money,
    future_value: Money,
) -> SolarFinanceResult<Money> {
    if nper == 0 {
        return Err(SolarFinanceError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    let overflow = || SolarFinanceError::overflow("pmt");

    if rate.is_zero() {
        let total = present_value
            .checked_add(future_value)
            .ok_or_else(overflow)?;
        return Ok(-total / Decimal::from(nper));
    }

    if rate <= dec!(-1) {
        return Err(SolarFinanceError::InvalidInput {
            field: "rate".into(),
            reason: "Periodic rate must be greater than -100%".into(),
        });
    }

    let one_plus_r = Decimal::ONE + rate;
    let factor = one_plus_r
        .checked_powi(i64::from(nper))
        .ok_or_else(|| SolarFinanceError::InvalidInput {
            field: "nper".into(),
            reason: format!("Compounding factor overflows over {nper} periods"),
        })?;
    let annuity_factor = (factor - Decimal::ONE)
        .checked_div(rate)
        .ok_or_else(overflow)?;

    if annuity_factor.is_zero() {
        return Err(SolarFinanceError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    present_value
        .checked_mul(factor)
        .and_then(|v| v.checked_add(future_value))
        .and_then(|v| v.checked_div(annuity_factor))
        .map(|v| -v)
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate_is_plain_sum() {
        let cfs = vec![dec!(-1000), dec!(1000), dec!(1000)];
        assert_eq!(npv(dec!(0), &cfs).unwrap(), dec!(1000));
    }

    #[test]
    fn test_npv_rejects_rate_at_minus_one() {
        let cfs = vec![dec!(-1000), dec!(1000)];
        assert!(matches!(
            npv(dec!(-1), &cfs),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_irr_single_period_closed_form() {
        let cfs = vec![dec!(-1000), dec!(1200)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        assert!((result - dec!(0.20)).abs() < dec!(0.000000001), "got {result}");
    }

    #[test]
    fn test_irr_level_annuity() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // IRR ≈ 9.70%
        assert!((result - dec!(0.0970)).abs() < dec!(0.0001), "got {result}");
        assert!(npv(result, &cfs).unwrap().abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_negative_root() {
        // Savings never recover the outlay: IRR is negative.
        let cfs = vec![dec!(-1000), dec!(300), dec!(300), dec!(300)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        assert!(result < Decimal::ZERO);
        assert!(npv(result, &cfs).unwrap().abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_bisection_fallback_from_out_of_bracket_guess() {
        let cfs = vec![dec!(-1000), dec!(1200)];
        let result = irr(&cfs, dec!(50)).unwrap();
        assert!((result - dec!(0.20)).abs() < dec!(0.000001), "got {result}");
    }

    #[test]
    fn test_irr_no_sign_change_fails() {
        let cfs = vec![dec!(1000), dec!(100), dec!(100)];
        assert!(matches!(
            irr(&cfs, dec!(0.10)),
            Err(SolarFinanceError::NoConvergence { .. })
        ));
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(matches!(
            irr(&[dec!(-1000)], dec!(0.10)),
            Err(SolarFinanceError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_pmt_thirty_year_mortgage() {
        // 100,000 at 6% nominal over 360 months ≈ 599.55
        let result = pmt(dec!(0.06) / dec!(12), 360, dec!(100000), dec!(0)).unwrap();
        assert!((result + dec!(599.55)).abs() < dec!(0.01), "got {result}");
    }

    #[test]
    fn test_pmt_zero_rate() {
        let result = pmt(dec!(0), 10, dec!(1000), dec!(0)).unwrap();
        assert_eq!(result, dec!(-100));
    }

    #[test]
    fn test_pmt_zero_periods_rejected() {
        assert!(pmt(dec!(0.01), 0, dec!(1000), dec!(0)).is_err());
    }

    #[test]
    fn test_npv_near_minus_one_overflows_to_an_error() {
        let cfs = vec![dec!(-1000); 30];
        assert!(matches!(
            npv(dec!(-0.99), &cfs),
            Err(SolarFinanceError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_pmt_overflow_is_an_error() {
        assert!(pmt(dec!(0.01), 120, Decimal::MAX, dec!(0)).is_err());
    }
}
