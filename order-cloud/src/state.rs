//! Application state for order-cloud

use std::sync::Arc;

use crate::config::Config;
use crate::gateway::{GatewayConfig, HttpGateway, PaymentGateway};
use crate::identity::{IdentityProvider, LocalIdentityProvider};
use crate::notify::{HttpPushTransport, LogTransport, Notifier, PushTransport};
use crate::services::{BranchService, OrderService, PaymentService, ProfileService, RegistrationService};
use crate::store::DocumentStore;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Verifies bearer tokens for every authenticated route
    pub identity: Arc<dyn IdentityProvider>,
    pub registrations: RegistrationService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub branches: BranchService,
    pub profiles: ProfileService,
}

impl AppState {
    /// Wire up production collaborators from configuration
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store = DocumentStore::open(&config.database_path)?;
        tracing::info!(path = %config.database_path, "Document store opened");

        let identity = LocalIdentityProvider::new(store.clone(), config.jwt_secret.clone());
        if !config.hq_bootstrap_emails.is_empty() {
            identity.bootstrap_hq(&config.hq_bootstrap_emails).await?;
        }

        let gateway = HttpGateway::new(config.gateway.clone())?;

        let transport: Arc<dyn PushTransport> = match &config.push_endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Push notifications enabled");
                Arc::new(HttpPushTransport::new(
                    endpoint.clone(),
                    config.push_server_key.clone(),
                )?)
            }
            None => {
                tracing::warn!("PUSH_ENDPOINT not set, notifications will only be logged");
                Arc::new(LogTransport)
            }
        };

        Ok(Self::from_parts(
            store,
            Arc::new(identity),
            Arc::new(gateway),
            transport,
            config.gateway.clone(),
        ))
    }

    /// Assemble state from explicit collaborators
    pub fn from_parts(
        store: DocumentStore,
        identity: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn PaymentGateway>,
        transport: Arc<dyn PushTransport>,
        gateway_config: GatewayConfig,
    ) -> Self {
        let notifier = Notifier::new(transport);
        Self {
            registrations: RegistrationService::new(store.clone(), identity.clone(), notifier.clone()),
            orders: OrderService::new(store.clone(), notifier.clone()),
            payments: PaymentService::new(store.clone(), gateway, notifier, gateway_config),
            branches: BranchService::new(store.clone()),
            profiles: ProfileService::new(store),
            identity,
        }
    }
}
