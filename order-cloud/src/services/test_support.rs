//! Shared fixtures for service tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shared::models::{Address, Branch, BranchStatus, Order, Role, UserProfile};

use crate::auth::CurrentUser;
use crate::gateway::webhook::WebhookForm;
use crate::gateway::{GatewayConfig, GatewayError, PaymentGateway, VerifiedTransaction, signature};
use crate::identity::LocalIdentityProvider;
use crate::notify::{MemoryTransport, Notifier};
use crate::services::orders::OrderLineInput;
use crate::services::{BranchService, OrderService, PaymentService, ProfileService, RegistrationService};
use crate::store::{Collection, DocumentStore};

pub const WEBHOOK_SECRET: &str = "whsec";
pub const MID: &str = "MID-TEST";

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        mid: MID.into(),
        api_key: "api-key".into(),
        sign_key: "sign-key".into(),
        webhook_secret: WEBHOOK_SECRET.into(),
        base_url: "http://127.0.0.1:1".into(),
        timeout_secs: 1,
    }
}

pub fn signed_webhook(status: &str, tid: &str, order_id: &str, amount: &str) -> WebhookForm {
    let payload = signature::webhook_payload(status, tid, order_id, amount);
    WebhookForm {
        status: Some(status.into()),
        tid: Some(tid.into()),
        order_id: Some(order_id.into()),
        amount: Some(amount.into()),
        message: None,
        mid: Some(MID.into()),
        sign: signature::sign(WEBHOOK_SECRET, &payload).ok(),
    }
}

enum Reply {
    Found(VerifiedTransaction),
    Timeout,
}

/// Scripted gateway: answers from a tid → reply table
#[derive(Default)]
pub struct FakeGateway {
    replies: Mutex<HashMap<String, Reply>>,
}

impl FakeGateway {
    pub fn set(&self, txn: VerifiedTransaction) {
        self.replies.lock().unwrap().insert(txn.tid.clone(), Reply::Found(txn));
    }

    pub fn set_timeout(&self, tid: &str) {
        self.replies.lock().unwrap().insert(tid.to_string(), Reply::Timeout);
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn verify_by_transaction_id(&self, tid: &str) -> Result<VerifiedTransaction, GatewayError> {
        match self.replies.lock().unwrap().get(tid) {
            Some(Reply::Found(txn)) => Ok(txn.clone()),
            Some(Reply::Timeout) => Err(GatewayError::Timeout),
            None => Err(GatewayError::UnknownTransaction(tid.to_string())),
        }
    }
}

pub struct Harness {
    pub store: DocumentStore,
    pub identity: Arc<LocalIdentityProvider>,
    pub transport: Arc<MemoryTransport>,
    pub gateway: Arc<FakeGateway>,
    pub registrations: RegistrationService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub branches: BranchService,
    pub profiles: ProfileService,
}

impl Harness {
    pub fn new() -> Self {
        let store = DocumentStore::open_in_memory().unwrap();
        let identity = Arc::new(LocalIdentityProvider::new(store.clone(), "test-secret"));
        let transport = Arc::new(MemoryTransport::default());
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Notifier::new(transport.clone());

        Self {
            registrations: RegistrationService::new(store.clone(), identity.clone(), notifier.clone()),
            orders: OrderService::new(store.clone(), notifier.clone()),
            payments: PaymentService::new(store.clone(), gateway.clone(), notifier, gateway_config()),
            branches: BranchService::new(store.clone()),
            profiles: ProfileService::new(store.clone()),
            store,
            identity,
            transport,
            gateway,
        }
    }

    pub fn hq(&self) -> CurrentUser {
        CurrentUser {
            uid: "hq-1".into(),
            email: Some("hq@example.com".into()),
            role: Role::Hq,
            branch_id: None,
        }
    }

    pub fn branch_user(&self, uid: &str, branch_id: &str) -> CurrentUser {
        CurrentUser {
            uid: uid.into(),
            email: None,
            role: Role::Branch,
            branch_id: Some(branch_id.into()),
        }
    }

    pub fn seed_branch(&self, branch_id: &str, name: &str, active: bool) {
        let branch = Branch {
            branch_id: branch_id.into(),
            name: name.into(),
            active,
            status: if active { BranchStatus::Active } else { BranchStatus::Inactive },
            contact_name: None,
            phone: None,
            address: Address::default(),
            location: None,
            created_at: 1,
            updated_at: 1,
        };
        self.store.set(Collection::Branches, branch_id, &branch).unwrap();
    }

    pub fn seed_device_token(&self, uid: &str, token: &str) {
        let profile = UserProfile {
            uid: uid.into(),
            email: String::new(),
            name: String::new(),
            role: Role::Branch,
            branch_id: None,
            branch_name: None,
            device_tokens: vec![token.into()],
            updated_at: 1,
        };
        self.store.set(Collection::Users, uid, &profile).unwrap();
    }

    /// Create, fill and place a draft for `owner`
    pub async fn place_order(&self, owner: &CurrentUser, lines: &[(&str, i64, i64)]) -> Order {
        let draft = self.orders.create_draft(owner).await.unwrap();
        for (product_id, unit_price, qty) in lines {
            self.orders
                .add_item(owner, &draft.id, OrderLineInput {
                    product_id: product_id.to_string(),
                    unit_price: *unit_price,
                    qty: *qty,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        self.orders.place(owner, &draft.id).await.unwrap()
    }
}
