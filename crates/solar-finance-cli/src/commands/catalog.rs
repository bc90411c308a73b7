use clap::Args;
use serde::Serialize;
use serde_json::Value;

use solar_finance_core::{LoanCatalog, LoanProfile, LoanProfileId};

/// Arguments for listing the loan catalog
#[derive(Args)]
pub struct CatalogArgs {
    /// Only list programs with this term in years
    #[arg(long)]
    pub term: Option<u32>,
}

#[derive(Serialize)]
struct CatalogEntry {
    id: LoanProfileId,
    label: String,
    #[serde(flatten)]
    profile: LoanProfile,
}

pub fn run_catalog(
    args: CatalogArgs,
    catalog: &LoanCatalog,
) -> Result<Value, Box<dyn std::error::Error>> {
    let entries: Vec<CatalogEntry> = catalog
        .iter()
        .filter(|(_, p)| args.term.map_or(true, |term| p.term_years == term))
        .map(|(id, profile)| CatalogEntry {
            id,
            label: profile.to_string(),
            profile: *profile,
        })
        .collect();

    if entries.is_empty() {
        return Err(format!(
            "No loan programs with a {}-year term",
            args.term.unwrap_or_default()
        )
        .into());
    }

    Ok(serde_json::json!({ "result": entries }))
}
