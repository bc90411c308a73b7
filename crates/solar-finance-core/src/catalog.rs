use std::fmt;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SolarFinanceError;
use crate::types::Rate;
use crate::SolarFinanceResult;

/// Longest loan term a profile may carry.
pub const MAX_TERM_YEARS: u32 = 50;

/// A lender program: fixed term, nominal APR and dealer fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanProfile {
    /// Loan term in whole years
    pub term_years: u32,
    /// Nominal annual rate in percent (4.49 = 4.49%)
    pub apr_percent: Decimal,
    /// Dealer fee in percent of the financed amount
    pub dealer_fee_percent: Decimal,
}

impl LoanProfile {
    pub const fn new(term_years: u32, apr_percent: Decimal, dealer_fee_percent: Decimal) -> Self {
        Self {
            term_years,
            apr_percent,
            dealer_fee_percent,
        }
    }

    pub fn term_months(&self) -> SolarFinanceResult<u32> {
        self.term_years
            .checked_mul(12)
            .ok_or_else(|| SolarFinanceError::Configuration {
                field: "term_years".into(),
                reason: format!("Term of {} years overflows in months", self.term_years),
            })
    }

    pub fn annual_rate(&self) -> Rate {
        self.apr_percent / dec!(100)
    }

    /// Canonical nominal monthly rate, `apr / 12`.
    pub fn monthly_rate(&self) -> Rate {
        self.annual_rate() / dec!(12)
    }

    /// `1 - dealer_fee / 100`, the divisor of the dealer-fee gross-up.
    pub fn dealer_fee_factor(&self) -> SolarFinanceResult<Decimal> {
        dealer_fee_factor(self.dealer_fee_percent)
    }

    pub fn validate(&self) -> SolarFinanceResult<()> {
        if self.term_years == 0 {
            return Err(SolarFinanceError::Configuration {
                field: "term_years".into(),
                reason: "Loan term must be at least one year".into(),
            });
        }
        if self.term_years > MAX_TERM_YEARS {
            return Err(SolarFinanceError::Configuration {
                field: "term_years".into(),
                reason: format!(
                    "Loan term must be at most {MAX_TERM_YEARS} years, got {}",
                    self.term_years
                ),
            });
        }
        if self.apr_percent <= Decimal::ZERO {
            return Err(SolarFinanceError::Configuration {
                field: "apr_percent".into(),
                reason: format!("APR must be positive, got {}", self.apr_percent),
            });
        }
        self.dealer_fee_factor()?;
        Ok(())
    }
}

/// `1 - dealer_fee_percent / 100`. A fee of 100% or more would make the
/// gross-up divide by zero or flip sign.
pub fn dealer_fee_factor(dealer_fee_percent: Decimal) -> SolarFinanceResult<Decimal> {
    if dealer_fee_percent < Decimal::ZERO || dealer_fee_percent >= dec!(100) {
        return Err(SolarFinanceError::Configuration {
            field: "dealer_fee_percent".into(),
            reason: format!("Dealer fee must be in [0, 100), got {dealer_fee_percent}"),
        });
    }
    Ok(Decimal::ONE - dealer_fee_percent / dec!(100))
}

/// Display label for selection widgets. Never used as a lookup key.
impl fmt::Display for LoanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Years | APR: {:.2}% | Dealer Fee: {:.2}%",
            self.term_years, self.apr_percent, self.dealer_fee_percent
        )
    }
}

/// Position of a profile within its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanProfileId(pub usize);

impl fmt::Display for LoanProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const STANDARD_PROFILES: [LoanProfile; 32] = [
    LoanProfile::new(25, dec!(4.49), dec!(35.99)),
    LoanProfile::new(25, dec!(4.99), dec!(33.49)),
    LoanProfile::new(25, dec!(5.99), dec!(27.49)),
    LoanProfile::new(25, dec!(6.99), dec!(23.49)),
    LoanProfile::new(25, dec!(7.99), dec!(17.49)),
    LoanProfile::new(25, dec!(8.99), dec!(13.49)),
    LoanProfile::new(25, dec!(9.99), dec!(8.99)),
    LoanProfile::new(25, dec!(10.99), dec!(5.99)),
    LoanProfile::new(25, dec!(11.99), dec!(0.00)),
    LoanProfile::new(20, dec!(4.49), dec!(34.49)),
    LoanProfile::new(20, dec!(4.99), dec!(31.99)),
    LoanProfile::new(20, dec!(5.99), dec!(25.99)),
    LoanProfile::new(20, dec!(6.99), dec!(21.74)),
    LoanProfile::new(20, dec!(7.49), dec!(20.24)),
    LoanProfile::new(20, dec!(7.99), dec!(17.24)),
    LoanProfile::new(20, dec!(8.99), dec!(13.24)),
    LoanProfile::new(20, dec!(9.99), dec!(9.24)),
    LoanProfile::new(20, dec!(10.99), dec!(5.99)),
    LoanProfile::new(20, dec!(11.99), dec!(0.00)),
    LoanProfile::new(15, dec!(4.49), dec!(32.99)),
    LoanProfile::new(15, dec!(4.99), dec!(30.75)),
    LoanProfile::new(12, dec!(4.49), dec!(31.75)),
    LoanProfile::new(10, dec!(4.49), dec!(27.74)),
    LoanProfile::new(10, dec!(4.99), dec!(26.24)),
    LoanProfile::new(10, dec!(5.99), dec!(22.49)),
    LoanProfile::new(10, dec!(6.99), dec!(18.74)),
    LoanProfile::new(10, dec!(7.99), dec!(15.49)),
    LoanProfile::new(7, dec!(4.49), dec!(23.99)),
    LoanProfile::new(7, dec!(4.99), dec!(22.99)),
    LoanProfile::new(7, dec!(5.99), dec!(19.99)),
    LoanProfile::new(7, dec!(6.99), dec!(16.99)),
    LoanProfile::new(7, dec!(7.99), dec!(14.24)),
];

static STANDARD_CATALOG: Lazy<LoanCatalog> = Lazy::new(|| LoanCatalog {
    profiles: STANDARD_PROFILES.to_vec(),
});

/// Read-only set of loan programs, addressed by [`LoanProfileId`] or by the
/// `(term, apr, fee)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LoanProfile>", into = "Vec<LoanProfile>")]
pub struct LoanCatalog {
    profiles: Vec<LoanProfile>,
}

impl LoanCatalog {
    /// Build a validated catalog: non-empty, every profile valid, no duplicates.
    pub fn new(profiles: Vec<LoanProfile>) -> SolarFinanceResult<Self> {
        if profiles.is_empty() {
            return Err(SolarFinanceError::Configuration {
                field: "catalog".into(),
                reason: "Loan catalog must contain at least one profile".into(),
            });
        }
        for (i, profile) in profiles.iter().enumerate() {
            profile.validate().map_err(|e| match e {
                SolarFinanceError::Configuration { field, reason } => {
                    SolarFinanceError::Configuration {
                        field: format!("catalog[{i}].{field}"),
                        reason,
                    }
                }
                other => other,
            })?;
            if profiles[..i].contains(profile) {
                return Err(SolarFinanceError::Configuration {
                    field: format!("catalog[{i}]"),
                    reason: format!("Duplicate loan profile: {profile}"),
                });
            }
        }
        Ok(Self { profiles })
    }

    /// The built-in program list, constructed once per process.
    pub fn standard() -> &'static LoanCatalog {
        &STANDARD_CATALOG
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, id: LoanProfileId) -> Option<&LoanProfile> {
        self.profiles.get(id.0)
    }

    pub fn require(&self, id: LoanProfileId) -> SolarFinanceResult<&LoanProfile> {
        self.get(id).ok_or_else(|| SolarFinanceError::InvalidInput {
            field: "loan_profile_id".into(),
            reason: format!("No loan profile {id} (catalog has {})", self.len()),
        })
    }

    pub fn find(
        &self,
        term_years: u32,
        apr_percent: Decimal,
        dealer_fee_percent: Decimal,
    ) -> Option<(LoanProfileId, &LoanProfile)> {
        self.iter().find(|(_, p)| {
            p.term_years == term_years
                && p.apr_percent == apr_percent
                && p.dealer_fee_percent == dealer_fee_percent
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoanProfileId, &LoanProfile)> {
        self.profiles
            .iter()
            .enumerate()
            .map(|(i, p)| (LoanProfileId(i), p))
    }

    pub fn with_term(&self, term_years: u32) -> impl Iterator<Item = (LoanProfileId, &LoanProfile)> {
        self.iter().filter(move |(_, p)| p.term_years == term_years)
    }

    pub fn profiles(&self) -> &[LoanProfile] {
        &self.profiles
    }
}

impl TryFrom<Vec<LoanProfile>> for LoanCatalog {
    type Error = SolarFinanceError;

    fn try_from(profiles: Vec<LoanProfile>) -> Result<Self, Self::Error> {
        LoanCatalog::new(profiles)
    }
}

impl From<LoanCatalog> for Vec<LoanProfile> {
    fn from(catalog: LoanCatalog) -> Self {
        catalog.profiles
    }
}
