//! Bot configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `WHATSAPP_TOKEN` - WhatsApp Cloud API access token
//! - `PHONE_NUMBER_ID` - WhatsApp Business phone number id
//! - `VERIFY_TOKEN` - Webhook verification token (must match the Meta app setting)
//! - `SHOP` - Shopify store (subdomain like `my-store`, or full domain)
//! - `SHOPIFY_ACCESS_TOKEN` - Shopify Admin API access token
//! - `RAZORPAY_KEY_ID` - Razorpay API key id
//! - `RAZORPAY_KEY_SECRET` - Razorpay API key secret
//!
//! ## Optional
//! - `BOT_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` / `BOT_PORT` - Listen port (default: 3000)
//! - `BRAND_NAME` - Shown in message headers and footers (default: Chat Checkout)
//! - `WHATSAPP_API_BASE` - Graph API base URL (default: <https://graph.facebook.com>)
//! - `WHATSAPP_API_VERSION` - Graph API version (default: v19.0)
//! - `WHATSAPP_APP_SECRET` - Enables `X-Hub-Signature-256` verification
//! - `CHECKOUT_FLOW_ID` - Enables the structured checkout form
//! - `CATALOG_THUMBNAIL_ID` - Product shown on the catalog message
//! - `CATALOG_FALLBACK_URL` - Catalog link sent when the catalog message fails
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2024-04)
//! - `RAZORPAY_API_BASE` - Razorpay API base URL (default: <https://api.razorpay.com/v1>)
//! - `RAZORPAY_WEBHOOK_SECRET` - Enables `X-Razorpay-Signature` verification
//! - `RAZORPAY_CALLBACK_URL` - Where the buyer lands after paying
//! - `HOME_STATE_CODE` / `HOME_STATE_NAME` - Home state for shipping (default: TN / Tamil Nadu)
//! - `HOME_SHIPPING_RATE` / `DOMESTIC_SHIPPING_RATE` - Shipping rates (default: 40 / 80)
//! - `DEFAULT_COUNTRY` - Country on addresses (default: India)
//! - `COUNTRY_DIAL_CODE` - Dial code for ten-digit numbers (default: 91)
//! - `DATABASE_URL` - Enables the `PostgreSQL` session store and address cache
//! - `CATALOG_PATH` - Product catalog JSON (default: bundled catalog)
//! - `HTTP_TIMEOUT_SECS` - Timeout for outbound API calls (default: 15)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//! - `LOG_FORMAT` - `json` for structured logs (default on Fly.io)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chat_checkout_core::{Money, ProductId};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::pricing::PricingPolicy;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com";
const DEFAULT_GRAPH_API_VERSION: &str = "v19.0";
const DEFAULT_SHOPIFY_API_VERSION: &str = "2024-04";
const DEFAULT_RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Bot application configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Brand shown to buyers
    pub brand_name: String,
    /// WhatsApp Cloud API configuration
    pub whatsapp: WhatsAppConfig,
    /// Shopify Admin API configuration
    pub shopify: ShopifyConfig,
    /// Razorpay configuration
    pub razorpay: RazorpayConfig,
    /// Shipping and locale settings
    pub pricing: PricingConfig,
    /// `PostgreSQL` connection string (optional, in-memory storage otherwise)
    pub database_url: Option<SecretString>,
    /// Catalog file (optional, bundled catalog otherwise)
    pub catalog_path: Option<PathBuf>,
    /// Timeout for outbound API calls
    pub http_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs
    pub json_logs: bool,
}

/// WhatsApp Cloud API configuration.
///
/// Implements `Debug` manually to redact the access token and secrets.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Graph API base URL
    pub api_base: String,
    /// Graph API version (e.g., v19.0)
    pub api_version: String,
    /// Access token
    pub access_token: SecretString,
    /// Business phone number id
    pub phone_number_id: String,
    /// Token echoed back during webhook verification
    pub verify_token: SecretString,
    /// App secret for payload signatures
    pub app_secret: Option<SecretString>,
    /// Checkout flow id; `None` disables the structured form
    pub checkout_flow_id: Option<String>,
    /// Product shown as the catalog thumbnail
    pub catalog_thumbnail_id: Option<ProductId>,
    /// Catalog link used when the catalog message cannot be sent
    pub catalog_fallback_url: Option<String>,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("verify_token", &"[REDACTED]")
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field("checkout_flow_id", &self.checkout_flow_id)
            .field("catalog_thumbnail_id", &self.catalog_thumbnail_id)
            .field("catalog_fallback_url", &self.catalog_fallback_url)
            .finish()
    }
}

impl WhatsAppConfig {
    /// Messages endpoint for the configured phone number.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.api_base.trim_end_matches('/'),
            self.api_version,
            self.phone_number_id
        )
    }

    fn from_env() -> Result<Self, ConfigError> {
        let app_secret = get_optional_env("WHATSAPP_APP_SECRET").map(|secret| {
            if let Err(e) = validate_secret_strength(&secret, "WHATSAPP_APP_SECRET") {
                tracing::warn!("WHATSAPP_APP_SECRET validation warning: {e}");
            }
            SecretString::from(secret)
        });

        Ok(Self {
            api_base: get_env_or_default("WHATSAPP_API_BASE", DEFAULT_GRAPH_API_BASE),
            api_version: get_env_or_default("WHATSAPP_API_VERSION", DEFAULT_GRAPH_API_VERSION),
            access_token: get_validated_secret("WHATSAPP_TOKEN")?,
            phone_number_id: get_required_env("PHONE_NUMBER_ID")?,
            verify_token: SecretString::from(get_required_env("VERIFY_TOKEN")?),
            app_secret,
            checkout_flow_id: get_optional_env("CHECKOUT_FLOW_ID"),
            catalog_thumbnail_id: get_optional_env("CATALOG_THUMBNAIL_ID").map(ProductId::new),
            catalog_fallback_url: get_optional_env("CATALOG_FALLBACK_URL"),
        })
    }
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Store subdomain, domain, or full base URL
    pub store: String,
    /// Admin API version (e.g., 2024-04)
    pub api_version: String,
    /// Admin API access token
    pub access_token: SecretString,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyConfig {
    /// Admin API base URL, e.g. `https://my-store.myshopify.com/admin/api/2024-04`.
    ///
    /// A bare subdomain gets `.myshopify.com` appended; a value with a scheme
    /// is used as the host verbatim.
    #[must_use]
    pub fn admin_base_url(&self) -> String {
        let store = self.store.trim().trim_end_matches('/');
        let host = if store.starts_with("http://") || store.starts_with("https://") {
            store.to_string()
        } else if store.contains('.') {
            format!("https://{store}")
        } else {
            format!("https://{store}.myshopify.com")
        };
        format!("{host}/admin/api/{}", self.api_version)
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: get_required_env("SHOP")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_SHOPIFY_API_VERSION),
            access_token: get_validated_secret("SHOPIFY_ACCESS_TOKEN")?,
        })
    }
}

/// Razorpay configuration.
///
/// Implements `Debug` manually to redact secrets.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// API base URL
    pub api_base: String,
    /// Key id (public half of the API credentials)
    pub key_id: String,
    /// Key secret
    pub key_secret: SecretString,
    /// Webhook secret for payload signatures
    pub webhook_secret: Option<SecretString>,
    /// Redirect after payment
    pub callback_url: Option<String>,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_optional_env("RAZORPAY_WEBHOOK_SECRET").map(|secret| {
            if let Err(e) = validate_secret_strength(&secret, "RAZORPAY_WEBHOOK_SECRET") {
                tracing::warn!("RAZORPAY_WEBHOOK_SECRET validation warning: {e}");
            }
            SecretString::from(secret)
        });

        Ok(Self {
            api_base: get_env_or_default("RAZORPAY_API_BASE", DEFAULT_RAZORPAY_API_BASE),
            key_id: get_required_env("RAZORPAY_KEY_ID")?,
            key_secret: get_validated_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret,
            callback_url: get_optional_env("RAZORPAY_CALLBACK_URL"),
        })
    }
}

/// Shipping policy and locale.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Shipping rates by destination
    pub policy: PricingPolicy,
    /// Country written on addresses that do not carry one
    pub default_country: String,
    /// Dial code prepended to ten-digit mobile numbers
    pub dial_code: String,
}

impl PricingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = PricingPolicy::default();
        let policy = PricingPolicy {
            home_state_code: get_env_or_default("HOME_STATE_CODE", &defaults.home_state_code),
            home_state_name: get_env_or_default("HOME_STATE_NAME", &defaults.home_state_name),
            home_rate: get_money_env("HOME_SHIPPING_RATE")?.unwrap_or(defaults.home_rate),
            domestic_rate: get_money_env("DOMESTIC_SHIPPING_RATE")?
                .unwrap_or(defaults.domestic_rate),
            currency: defaults.currency,
        };

        let dial_code = get_env_or_default("COUNTRY_DIAL_CODE", "91");
        if dial_code.is_empty() || !dial_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidEnvVar(
                "COUNTRY_DIAL_CODE".to_string(),
                "must be digits only".to_string(),
            ));
        }

        Ok(Self {
            policy,
            default_country: get_env_or_default("DEFAULT_COUNTRY", "India"),
            dial_code,
        })
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            policy: PricingPolicy::default(),
            default_country: "India".to_string(),
            dial_code: "91".to_string(),
        }
    }
}

impl BotConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("BOT_HOST", "0.0.0.0")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("BOT_HOST".to_string(), e.to_string()))?;
        let port = get_optional_env("PORT")
            .or_else(|| get_optional_env("BOT_PORT"))
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;
        let http_timeout = get_env_or_default("HTTP_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let whatsapp = WhatsAppConfig::from_env()?;
        let shopify = ShopifyConfig::from_env()?;
        let razorpay = RazorpayConfig::from_env()?;
        let pricing = PricingConfig::from_env()?;
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let json_logs = get_optional_env("LOG_FORMAT").map_or_else(
            || std::env::var("FLY_APP_NAME").is_ok(),
            |format| format.eq_ignore_ascii_case("json"),
        );

        Ok(Self {
            host,
            port,
            brand_name: get_env_or_default("BRAND_NAME", "Chat Checkout"),
            whatsapp,
            shopify,
            razorpay,
            pricing,
            database_url: get_optional_env("DATABASE_URL").map(SecretString::from),
            catalog_path: get_optional_env("CATALOG_PATH").map(PathBuf::from),
            http_timeout,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
            sentry_traces_sample_rate,
            json_logs,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the structured checkout form is available.
    #[must_use]
    pub const fn structured_form_enabled(&self) -> bool {
        self.whatsapp.checkout_flow_id.is_some()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an optional decimal amount.
fn get_money_env(key: &str) -> Result<Option<Money>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            value
                .trim()
                .parse::<Decimal>()
                .map(Money::new)
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
        .transpose()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the credential issued by the provider."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
