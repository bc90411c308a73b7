use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarFinanceError {
    #[error("Configuration error: {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("No convergence: {function} found no root after {iterations} iterations (delta: {last_delta})")]
    NoConvergence {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SolarFinanceError {
    /// A derived amount left the range `Decimal` can represent.
    pub(crate) fn overflow(field: &str) -> Self {
        SolarFinanceError::InvalidInput {
            field: field.into(),
            reason: "Value exceeds the representable decimal range".into(),
        }
    }
}

impl From<serde_json::Error> for SolarFinanceError {
    fn from(e: serde_json::Error) -> Self {
        SolarFinanceError::Serialization(e.to_string())
    }
}
