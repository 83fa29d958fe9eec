//! Catalog file checks.

use std::path::Path;

use chat_checkout_bot::catalog::{Catalog, CatalogError};
use tracing::info;

/// Load a catalog the way the bot does at startup.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid catalog.
pub fn check(path: &Path) -> Result<(), CatalogError> {
    let catalog = Catalog::load(Some(path))?;
    if catalog.is_empty() {
        tracing::warn!(path = %path.display(), "Catalog has no products");
    }
    info!(path = %path.display(), products = catalog.len(), "Catalog OK");
    Ok(())
}
