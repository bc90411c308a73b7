use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Serialize;

use solar_finance_core::projection::{self, ScenarioInput};
use solar_finance_core::LoanCatalog;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_catalog(catalog_json: Option<String>) -> NapiResult<LoanCatalog> {
    match catalog_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error),
        None => Ok(LoanCatalog::standard().clone()),
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

#[napi]
pub fn compute_scenario(input_json: String) -> NapiResult<String> {
    let input: ScenarioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = projection::compute(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Serialize)]
struct Schedules {
    annual: Vec<projection::AnnualCashFlowRow>,
    monthly: Vec<projection::MonthlyCashFlowRow>,
    warnings: Vec<String>,
}

/// Annual and monthly cash-flow rows for the dashboard's download buttons.
#[napi]
pub fn cash_flow_schedules(input_json: String) -> NapiResult<String> {
    let input: ScenarioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = projection::compute(&input).map_err(to_napi_error)?;
    let schedules = Schedules {
        annual: output.result.annual_rows(),
        monthly: output.result.monthly_rows(),
        warnings: output.warnings,
    };
    serde_json::to_string(&schedules).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Loan catalog
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CatalogEntry {
    id: usize,
    label: String,
    profile: solar_finance_core::LoanProfile,
}

#[napi]
pub fn loan_catalog(catalog_json: Option<String>) -> NapiResult<String> {
    let catalog = parse_catalog(catalog_json)?;
    let entries: Vec<CatalogEntry> = catalog
        .iter()
        .map(|(id, profile)| CatalogEntry {
            id: id.0,
            label: profile.to_string(),
            profile: *profile,
        })
        .collect();
    serde_json::to_string(&entries).map_err(to_napi_error)
}

#[napi]
pub fn compare_loan_programs(
    input_json: String,
    catalog_json: Option<String>,
) -> NapiResult<String> {
    let input: ScenarioInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let catalog = parse_catalog(catalog_json)?;
    let output =
        projection::compare_loan_profiles(&input, &catalog).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
