//! Phone numbers and conversation identities.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input contains no digits.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input has too few or too many digits.
    #[error("phone number must have {min}-{max} digits, got {len}")]
    InvalidLength {
        /// Number of digits found.
        len: usize,
        /// Minimum accepted digits.
        min: usize,
        /// Maximum accepted digits.
        max: usize,
    },
}

/// A phone number reduced to its digits.
///
/// Buyers type numbers in every shape (`98765 43210`, `+91-9876543210`,
/// `09876543210`); parsing strips everything but digits and checks the
/// length.
///
/// ## Constraints
///
/// - 10-15 digits after stripping separators (E.164 allows at most 15)
///
/// ## Examples
///
/// ```
/// use chat_checkout_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+91 98765-43210").unwrap();
/// assert_eq!(phone.as_str(), "919876543210");
/// assert_eq!(phone.national_number(), "9876543210");
///
/// assert!(PhoneNumber::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Minimum number of digits.
    pub const MIN_DIGITS: usize = 10;
    /// Maximum number of digits (E.164).
    pub const MAX_DIGITS: usize = 15;

    /// Parse a phone number from free text.
    ///
    /// # Errors
    ///
    /// Returns an error if the input has no digits or the digit count is
    /// outside 10-15.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let digits: String = s.chars().filter(char::is_ascii_digit).collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength {
                len: digits.len(),
                min: Self::MIN_DIGITS,
                max: Self::MAX_DIGITS,
            });
        }

        Ok(Self(digits))
    }

    /// The digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last ten digits, i.e. the number without a country code.
    #[must_use]
    pub fn national_number(&self) -> &str {
        let start = self.0.len().saturating_sub(Self::MIN_DIGITS);
        self.0.get(start..).unwrap_or(&self.0)
    }

    /// E.164 form. Ten-digit numbers and numbers typed with a trunk `0`
    /// get `dial_code` in front of the national number.
    #[must_use]
    pub fn e164(&self, dial_code: &str) -> String {
        if self.0.len() == Self::MIN_DIGITS || self.0.starts_with('0') {
            format!("+{dial_code}{}", self.national_number())
        } else {
            format!("+{}", self.0)
        }
    }

    /// Formats a directory might have stored this number in, most specific first.
    #[must_use]
    pub fn lookup_variants(&self, dial_code: &str) -> Vec<String> {
        let national = self.national_number();
        let mut variants = vec![
            self.e164(dial_code),
            format!("{dial_code}{national}"),
            national.to_owned(),
            self.0.clone(),
        ];
        let mut seen = std::collections::HashSet::new();
        variants.retain(|v| seen.insert(v.clone()));
        variants
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Identity of a conversation: the sender's phone number as digits.
///
/// Messaging gateways already deliver the sender in a canonical form, so
/// this type only strips stray separators and never rejects input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Build an identity from the gateway's sender field.
    #[must_use]
    pub fn from_sender(sender: &str) -> Self {
        Self(sender.chars().filter(char::is_ascii_digit).collect())
    }

    /// The identity digits.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identity as a phone number, if it has a plausible length.
    #[must_use]
    pub fn phone(&self) -> Option<PhoneNumber> {
        PhoneNumber::parse(&self.0).ok()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
