pub mod catalog;
pub mod projection;

use std::borrow::Cow;

use solar_finance_core::LoanCatalog;

use crate::input;

/// The standard catalog, or the one at `path` when given.
pub fn load_catalog(
    path: Option<&str>,
) -> Result<Cow<'static, LoanCatalog>, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let catalog: LoanCatalog = input::file::read_input(path)?;
            tracing::debug!(path, profiles = catalog.len(), "loaded custom loan catalog");
            Ok(Cow::Owned(catalog))
        }
        None => Ok(Cow::Borrowed(LoanCatalog::standard())),
    }
}
