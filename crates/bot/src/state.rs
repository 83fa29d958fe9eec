//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;

use crate::address::{AddressCache, AddressResolver, InMemoryAddressCache};
use crate::catalog::{Catalog, CatalogError};
use crate::config::BotConfig;
use crate::conversation::{
    CheckoutCapabilities, CheckoutPorts, CheckoutService, CheckoutSettings, ConversationLocks,
    FormSettings,
};
use crate::db::{self, PgAddressCache, PgSessionStore};
use crate::finalizer::OrderFinalizer;
use crate::payment::PaymentInitiator;
use crate::razorpay::{RazorpayClient, RazorpayError};
use crate::session::{InMemorySessionStore, SessionRepository};
use crate::shopify::{ShopifyClient, ShopifyError};
use crate::whatsapp::{WhatsAppClient, WhatsAppError};

/// Failures while assembling the application at start-up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("whatsapp client: {0}")]
    WhatsApp(#[from] WhatsAppError),
    #[error("shopify client: {0}")]
    Shopify(#[from] ShopifyError),
    #[error("razorpay client: {0}")]
    Razorpay(#[from] RazorpayError),
}

/// Secrets the webhook handlers check requests against.
#[derive(Clone)]
pub struct WebhookSecrets {
    /// Echoed token for the messaging handshake.
    pub verify_token: SecretString,
    /// `X-Hub-Signature-256` key; unsigned requests are accepted when unset.
    pub whatsapp_app_secret: Option<SecretString>,
    /// `X-Razorpay-Signature` key; unsigned requests are accepted when unset.
    pub razorpay_webhook_secret: Option<SecretString>,
}

impl std::fmt::Debug for WebhookSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSecrets")
            .field("verify_token", &"[REDACTED]")
            .field(
                "whatsapp_app_secret",
                &self.whatsapp_app_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "razorpay_webhook_secret",
                &self.razorpay_webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl WebhookSecrets {
    #[must_use]
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            verify_token: config.whatsapp.verify_token.clone(),
            whatsapp_app_secret: config.whatsapp.app_secret.clone(),
            razorpay_webhook_secret: config.razorpay.webhook_secret.clone(),
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    secrets: WebhookSecrets,
    service: CheckoutService,
    finalizer: OrderFinalizer,
    pool: Option<sqlx::PgPool>,
}

impl AppState {
    /// Assemble state from already-built parts.
    #[must_use]
    pub fn from_parts(
        secrets: WebhookSecrets,
        service: CheckoutService,
        finalizer: OrderFinalizer,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                secrets,
                service,
                finalizer,
                pool: None,
            }),
        }
    }

    /// Build the clients, stores and services described by `config`.
    ///
    /// Sessions and saved addresses live in `PostgreSQL` when
    /// `DATABASE_URL` is set and in memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded, a client cannot be
    /// built, or the database is unreachable.
    pub async fn from_config(config: &BotConfig) -> Result<Self, StartupError> {
        let catalog = Catalog::load(config.catalog_path.as_deref())?;
        tracing::info!(products = catalog.len(), "Catalog loaded");

        let whatsapp = Arc::new(WhatsAppClient::new(&config.whatsapp, config.http_timeout)?);
        let shopify = Arc::new(ShopifyClient::new(&config.shopify, config.http_timeout)?);
        let razorpay = Arc::new(RazorpayClient::new(&config.razorpay, config.http_timeout)?);

        let (sessions, cache, pool): (Arc<dyn SessionRepository>, Arc<dyn AddressCache>, _) =
            if let Some(url) = &config.database_url {
                let pool = db::create_pool(url).await?;
                tracing::info!("Database pool created");
                (
                    Arc::new(PgSessionStore::new(pool.clone())),
                    Arc::new(PgAddressCache::new(pool.clone())),
                    Some(pool),
                )
            } else {
                tracing::warn!("DATABASE_URL not set, sessions are kept in memory");
                (
                    Arc::new(InMemorySessionStore::new()),
                    Arc::new(InMemoryAddressCache::new()),
                    None,
                )
            };

        let pricing = &config.pricing;
        let settings = CheckoutSettings {
            brand_name: config.brand_name.clone(),
            policy: pricing.policy.clone(),
            capabilities: CheckoutCapabilities {
                forms: config
                    .structured_form_enabled()
                    .then(FormSettings::default),
            },
            dial_code: pricing.dial_code.clone(),
            default_country: pricing.default_country.clone(),
            currency: pricing.policy.currency,
        };

        let locks = ConversationLocks::new();
        let ports = CheckoutPorts {
            sessions: Arc::clone(&sessions),
            messenger: whatsapp.clone(),
            addresses: AddressResolver::new(
                shopify.clone(),
                cache,
                pricing.dial_code.clone(),
                pricing.default_country.clone(),
            ),
            discounts: shopify.clone(),
            payments: PaymentInitiator::new(razorpay, pricing.dial_code.clone(), settings.currency),
            commerce: shopify.clone(),
        };

        let finalizer = OrderFinalizer::new(
            sessions,
            shopify,
            whatsapp,
            locks.clone(),
            pricing.dial_code.clone(),
            settings.currency,
        );
        let service = CheckoutService::new(ports, catalog, settings, locks);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                secrets: WebhookSecrets::from_config(config),
                service,
                finalizer,
                pool,
            }),
        })
    }

    #[must_use]
    pub fn secrets(&self) -> &WebhookSecrets {
        &self.inner.secrets
    }

    #[must_use]
    pub fn service(&self) -> &CheckoutService {
        &self.inner.service
    }

    #[must_use]
    pub fn finalizer(&self) -> &OrderFinalizer {
        &self.inner.finalizer
    }

    /// Database pool, when sessions are stored in `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&sqlx::PgPool> {
        self.inner.pool.as_ref()
    }
}
