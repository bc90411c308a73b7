pub mod catalog;
pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "projection")]
pub mod projection;

pub use catalog::{LoanCatalog, LoanProfile, LoanProfileId};
pub use error::SolarFinanceError;
pub use types::*;

#[cfg(feature = "projection")]
pub use projection::{compare_loan_profiles, compute};

/// Standard result type for all solar-finance operations
pub type SolarFinanceResult<T> = Result<T, SolarFinanceError>;
