//! Static product catalog.
//!
//! Maps the retailer ids that arrive in cart messages to a display name and
//! a price. Loaded once at start-up from `CATALOG_PATH` or the bundled file.

use std::collections::HashMap;
use std::path::Path;

use chat_checkout_core::{Money, ProductId};
use serde::Deserialize;
use thiserror::Error;

const BUNDLED_CATALOG: &str = include_str!("../catalog.json");

/// Errors raised while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Duplicate product id in catalog: {0}")]
    DuplicateProduct(ProductId),
    #[error("Product {0} has a non-positive price")]
    InvalidPrice(ProductId),
    #[error("Product {0} has an empty name")]
    EmptyName(ProductId),
}

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
}

#[derive(Deserialize)]
struct CatalogFile {
    products: Vec<CatalogProduct>,
}

/// Product lookup by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: HashMap<ProductId, CatalogProduct>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled file is invalid.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_json(BUNDLED_CATALOG)
    }

    /// Load a catalog file, or the bundled catalog when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::from_json(&std::fs::read_to_string(path)?),
            None => Self::bundled(),
        }
    }

    /// Parse and validate catalog JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, duplicate ids, blank names, or
    /// prices that are not positive.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_products(file.products)
    }

    /// Build a catalog from products.
    ///
    /// # Errors
    ///
    /// Same validation as [`Catalog::from_json`].
    pub fn from_products(
        products: impl IntoIterator<Item = CatalogProduct>,
    ) -> Result<Self, CatalogError> {
        let mut map = HashMap::new();
        for product in products {
            if product.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(product.id));
            }
            if !product.price.is_positive() {
                return Err(CatalogError::InvalidPrice(product.id));
            }
            if map.contains_key(&product.id) {
                return Err(CatalogError::DuplicateProduct(product.id));
            }
            map.insert(product.id.clone(), product);
        }
        Ok(Self { products: map })
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CatalogProduct> {
        self.products.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Products sorted by name.
    #[must_use]
    pub fn products(&self) -> Vec<&CatalogProduct> {
        let mut products: Vec<_> = self.products.values().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_loads() {
        let catalog = Catalog::bundled().unwrap();
        assert_eq!(catalog.len(), 8);
        let soap = catalog.get(&ProductId::new("41392567746606")).unwrap();
        assert_eq!(soap.name, "Kungiliyam Bath Soap");
        assert_eq!(soap.price, Money::from_units(80));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"products":[
            {"id":"1","name":"Soap","price":"80"},
            {"id":"1","name":"Serum","price":"270"}
        ]}"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::DuplicateProduct(_))
        ));
    }

    #[test]
    fn test_zero_price_rejected() {
        let json = r#"{"products":[{"id":"1","name":"Soap","price":"0"}]}"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_blank_name_rejected() {
        let json = r#"{"products":[{"id":"1","name":"  ","price":"10"}]}"#;
        assert!(matches!(
            Catalog::from_json(json),
            Err(CatalogError::EmptyName(_))
        ));
    }

    #[test]
    fn test_unknown_product() {
        let catalog = Catalog::bundled().unwrap();
        assert!(catalog.get(&ProductId::new("nope")).is_none());
    }
}
