//! The projection engine: one pure computation from a [`ScenarioInput`] to a
//! [`ScenarioResult`]. No I/O and no shared mutable state; the only shared
//! data is the read-only loan catalog.

pub mod amortization;
pub mod cash_flow;
pub mod engine;
pub mod incentives;
pub mod input;
pub mod metrics;
pub mod offers;

pub use amortization::{monthly_payment, PaydownPayment, PaydownTier, PaymentScheduleEntry};
pub use cash_flow::{AnnualCashFlowRow, CashFlowProjection, MonthlyCashFlowRow};
pub use engine::{
    compare_loan_profiles, compute, FinancingSummary, LoanComparisonRow, ScenarioResult,
};
pub use incentives::{gross_cost, CostBreakdown, IncentiveBreakdown};
pub use input::{
    BatteryCreditGate, DiscountScope, EngineConfig, LeaseTerms, ScenarioInput, State,
};
pub use metrics::{payback_period, return_on_investment, PaybackPeriod, ProfitabilityMetrics};
pub use offers::{CashPurchase, LeaseOption, LeaseYear, UtilityComparison};
