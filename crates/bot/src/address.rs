//! Address resolution.
//!
//! Buyer addresses come from two places: the store's customer directory,
//! whose records use several spellings for the same fields, and a local
//! cache written whenever a buyer types an address in. Everything past this
//! module sees only the canonical [`Address`].

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chat_checkout_core::{AddressId, ConversationId, CustomerId, Email, PhoneNumber};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::error::CheckoutError;
use crate::session::Customer;

/// Canonical postal address.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    /// Directory id, when the address came from the directory.
    pub id: Option<AddressId>,
    pub line: String,
    pub city: String,
    /// State code or name as the buyer or directory gave it.
    pub state: String,
    pub pincode: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// `line, city, state - pincode`
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{}, {}, {} - {}",
            self.line, self.city, self.state, self.pincode
        )
    }
}

/// An address together with the contact it was saved with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedAddress {
    pub customer: Customer,
    pub address: Address,
}

/// A directory address record in whatever shape the directory returned.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawAddress(pub Map<String, Value>);

const ID_KEYS: &[&str] = &["id", "address_id"];
const LINE_KEYS: &[&str] = &["address1", "street", "line1", "address", "address_line"];
const LINE2_KEYS: &[&str] = &["address2", "line2"];
const CITY_KEYS: &[&str] = &["city", "locality", "town"];
const STATE_KEYS: &[&str] = &["province_code", "state_code", "province", "state", "region"];
const PINCODE_KEYS: &[&str] = &["zip", "postal_code", "pincode", "postcode"];
const COUNTRY_KEYS: &[&str] = &["country", "country_name", "country_code"];

impl RawAddress {
    /// First non-blank value among `keys`, numbers rendered as text.
    fn pick(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.0.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    fn is_flagged_default(&self) -> bool {
        matches!(self.0.get("default"), Some(Value::Bool(true)))
    }

    fn id(&self) -> Option<AddressId> {
        self.pick(ID_KEYS).map(AddressId::new)
    }

    /// Canonical form, or `None` when there is no street line.
    #[must_use]
    pub fn normalize(&self, default_country: &str) -> Option<Address> {
        let mut line = self.pick(LINE_KEYS)?;
        if let Some(line2) = self.pick(LINE2_KEYS) {
            line = format!("{line}, {line2}");
        }

        Some(Address {
            id: self.id(),
            line,
            city: self.pick(CITY_KEYS).unwrap_or_default(),
            state: self.pick(STATE_KEYS).unwrap_or_default(),
            pincode: self.pick(PINCODE_KEYS).unwrap_or_default(),
            country: self
                .pick(COUNTRY_KEYS)
                .unwrap_or_else(|| default_country.to_string()),
            is_default: false,
        })
    }
}

/// A customer as the directory knows them.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryCustomer {
    pub id: CustomerId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub default_address: Option<RawAddress>,
    pub addresses: Vec<RawAddress>,
}

impl DirectoryCustomer {
    /// Contact details in session form. Unparseable fields are dropped.
    #[must_use]
    pub fn contact(&self) -> Customer {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Customer {
            name: (!name.is_empty()).then_some(name),
            email: self.email.as_deref().and_then(|e| Email::parse(e).ok()),
            mobile: self.phone.as_deref().and_then(|p| PhoneNumber::parse(p).ok()),
        }
    }
}

/// The store's customer records.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Customer whose phone matches `phone` exactly as given.
    async fn find_customer(&self, phone: &str)
    -> Result<Option<DirectoryCustomer>, CheckoutError>;

    /// Every address on file for a customer.
    async fn customer_addresses(&self, id: &CustomerId)
    -> Result<Vec<RawAddress>, CheckoutError>;
}

/// Local address store, independent of the directory.
#[async_trait]
pub trait AddressCache: Send + Sync {
    async fn get(&self, id: &ConversationId) -> Result<Option<SavedAddress>, RepositoryError>;
    async fn put(&self, id: &ConversationId, saved: &SavedAddress)
    -> Result<(), RepositoryError>;
}

/// Process-local address cache.
#[derive(Debug, Default)]
pub struct InMemoryAddressCache {
    entries: RwLock<std::collections::HashMap<ConversationId, SavedAddress>>,
}

impl InMemoryAddressCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressCache for InMemoryAddressCache {
    async fn get(&self, id: &ConversationId) -> Result<Option<SavedAddress>, RepositoryError> {
        Ok(self.entries.read().await.get(id).cloned())
    }

    async fn put(
        &self,
        id: &ConversationId,
        saved: &SavedAddress,
    ) -> Result<(), RepositoryError> {
        self.entries.write().await.insert(id.clone(), saved.clone());
        Ok(())
    }
}

/// Finds and stores buyer addresses.
#[derive(Clone)]
pub struct AddressResolver {
    directory: Arc<dyn CustomerDirectory>,
    cache: Arc<dyn AddressCache>,
    dial_code: String,
    default_country: String,
}

impl AddressResolver {
    #[must_use]
    pub fn new(
        directory: Arc<dyn CustomerDirectory>,
        cache: Arc<dyn AddressCache>,
        dial_code: impl Into<String>,
        default_country: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            cache,
            dial_code: dial_code.into(),
            default_country: default_country.into(),
        }
    }

    /// Directory customer for this buyer, trying each phone format.
    async fn find_customer(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<DirectoryCustomer>, CheckoutError> {
        for variant in phone.lookup_variants(&self.dial_code) {
            if let Some(customer) = self.directory.find_customer(&variant).await? {
                return Ok(Some(customer));
            }
        }
        Ok(None)
    }

    async fn lookup_customer(
        &self,
        identity: &ConversationId,
    ) -> Result<Option<(DirectoryCustomer, Vec<Address>)>, CheckoutError> {
        let Some(phone) = identity.phone() else {
            return Ok(None);
        };
        let Some(mut customer) = self.find_customer(&phone).await? else {
            return Ok(None);
        };
        if customer.addresses.is_empty() {
            customer.addresses = self.directory.customer_addresses(&customer.id).await?;
        }
        let addresses = normalize_all(
            customer.default_address.as_ref(),
            &customer.addresses,
            &self.default_country,
        );
        Ok(Some((customer, addresses)))
    }

    /// All directory addresses for a buyer, default first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn lookup(&self, identity: &ConversationId) -> Result<Vec<Address>, CheckoutError> {
        Ok(self
            .lookup_customer(identity)
            .await?
            .map(|(_, addresses)| addresses)
            .unwrap_or_default())
    }

    /// The cached address, if any. Cache failures read as a miss.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn lookup_cached(&self, identity: &ConversationId) -> Option<SavedAddress> {
        match self.cache.get(identity).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "Address cache read failed");
                None
            }
        }
    }

    /// Cache an address. Returns `false` if the write failed.
    #[instrument(skip(self, saved), fields(identity = %identity))]
    pub async fn save(&self, identity: &ConversationId, saved: &SavedAddress) -> bool {
        match self.cache.put(identity, saved).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Address cache write failed");
                false
            }
        }
    }

    /// Cached address, else the directory's default address.
    ///
    /// Directory failures are logged and read as "nothing on file".
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn find_existing(&self, identity: &ConversationId) -> Option<SavedAddress> {
        if let Some(saved) = self.lookup_cached(identity).await {
            return Some(saved);
        }

        match self.lookup_customer(identity).await {
            Ok(Some((customer, addresses))) => {
                let address = addresses.into_iter().next()?;
                let mut contact = customer.contact();
                if contact.mobile.is_none() {
                    contact.mobile = identity.phone();
                }
                Some(SavedAddress {
                    customer: contact,
                    address,
                })
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Customer directory lookup failed");
                None
            }
        }
    }
}

/// Normalize, mark the single default, dedupe by id, default first.
fn normalize_all(
    default: Option<&RawAddress>,
    addresses: &[RawAddress],
    default_country: &str,
) -> Vec<Address> {
    let default_id = default
        .and_then(RawAddress::id)
        .or_else(|| addresses.iter().find(|a| a.is_flagged_default()).and_then(RawAddress::id));

    let mut seen = HashSet::new();
    let mut has_default = false;
    let mut normalized: Vec<Address> = default
        .into_iter()
        .chain(addresses)
        .filter_map(|raw| raw.normalize(default_country))
        .filter(|address| {
            let key = address.id.as_ref().map_or_else(
                || format!("{}|{}|{}", address.line, address.city, address.pincode),
                |id| id.as_str().to_owned(),
            );
            seen.insert(key)
        })
        .map(|mut address| {
            if !has_default && address.id.is_some() && address.id == default_id {
                address.is_default = true;
                has_default = true;
            }
            address
        })
        .collect();

    normalized.sort_by_key(|a| !a.is_default);
    normalized
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawAddress {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_shopify_shape() {
        let address = raw(json!({
            "id": 7_731_981,
            "address1": "No 1, Anna Street",
            "address2": "Ganapathy",
            "city": "Coimbatore",
            "province": "Tamil Nadu",
            "province_code": "TN",
            "zip": "641006",
            "country": "India"
        }))
        .normalize("India")
        .unwrap();

        assert_eq!(address.id, Some(AddressId::new("7731981")));
        assert_eq!(address.line, "No 1, Anna Street, Ganapathy");
        assert_eq!(address.state, "TN");
        assert_eq!(address.pincode, "641006");
    }

    #[test]
    fn test_normalize_alternate_spellings() {
        let address = raw(json!({
            "street": "12 MG Road",
            "locality": "Bengaluru",
            "region": "KA",
            "postal_code": 560_001
        }))
        .normalize("India")
        .unwrap();

        assert_eq!(address.line, "12 MG Road");
        assert_eq!(address.city, "Bengaluru");
        assert_eq!(address.state, "KA");
        assert_eq!(address.pincode, "560001");
        assert_eq!(address.country, "India");
    }

    #[test]
    fn test_normalize_requires_a_line() {
        assert!(raw(json!({"city": "Chennai"})).normalize("India").is_none());
        assert!(raw(json!({"address1": "  "})).normalize("India").is_none());
    }

    #[test]
    fn test_normalize_all_dedupes_and_marks_one_default() {
        let default = raw(json!({"id": 2, "address1": "Home", "default": true}));
        let list = vec![
            raw(json!({"id": 1, "address1": "Office"})),
            raw(json!({"id": 2, "address1": "Home", "default": true})),
            raw(json!({"id": 1, "street": "Office"})),
        ];

        let addresses = normalize_all(Some(&default), &list, "India");
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses[0].line, "Home");
        assert!(addresses[0].is_default);
        assert_eq!(addresses.iter().filter(|a| a.is_default).count(), 1);
    }

    #[test]
    fn test_normalize_all_uses_default_flag_without_default_record() {
        let list = vec![
            raw(json!({"id": 1, "address1": "Office"})),
            raw(json!({"id": 2, "address1": "Home", "default": true})),
        ];

        let addresses = normalize_all(None, &list, "India");
        assert_eq!(addresses[0].line, "Home");
        assert!(addresses[0].is_default);
        assert!(!addresses[1].is_default);
    }

    #[test]
    fn test_directory_contact() {
        let customer = DirectoryCustomer {
            id: CustomerId::new("1"),
            first_name: Some("Asha".to_string()),
            last_name: Some(" Kumar ".to_string()),
            email: Some("not an email".to_string()),
            phone: Some("+91 98765 43210".to_string()),
            default_address: None,
            addresses: Vec::new(),
        };

        let contact = customer.contact();
        assert_eq!(contact.name.as_deref(), Some("Asha Kumar"));
        assert!(contact.email.is_none());
        assert_eq!(contact.mobile.unwrap().as_str(), "919876543210");
    }

    #[test]
    fn test_one_line() {
        let address = Address {
            line: "No 1, Anna Street".to_string(),
            city: "Chennai".to_string(),
            state: "TN".to_string(),
            pincode: "600001".to_string(),
            ..Address::default()
        };
        assert_eq!(address.one_line(), "No 1, Anna Street, Chennai, TN - 600001");
    }
}
