//! Shared fixtures for unit tests: in-memory storage and fake external services.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    config::{AppConfig, BillingSettings, FlushPolicy},
    dao::{
        league_store::{LeagueStore, memory::MemoryLeagueStore},
        models::{GameEntity, PlayerEntity, UserEntity},
    },
    dto::user::RegisterUserRequest,
    gateways::{
        CheckoutRequest, CheckoutSession, GatewayResult, Mailer, OutgoingEmail, PaymentGateway,
        WebhookError, WebhookEvent,
        stripe::{self, WEBHOOK_TOLERANCE_SECS},
    },
    services::user_service,
    state::{AppState, SharedState},
};

/// Secret the fake payment gateway verifies webhooks with.
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Configuration with near-instant flush retries.
pub fn test_config() -> AppConfig {
    AppConfig {
        flush: FlushPolicy {
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            jitter: false,
        },
        billing: BillingSettings {
            price_id: "price_test".into(),
            ..BillingSettings::default()
        },
        ..AppConfig::default()
    }
}

/// State backed by an installed in-memory store and default fakes.
pub async fn test_state() -> (SharedState, MemoryLeagueStore) {
    test_state_with(RecordingMailer::default(), FakePayments::default()).await
}

/// State backed by an installed in-memory store and the given fakes.
pub async fn test_state_with(
    mailer: RecordingMailer,
    payments: FakePayments,
) -> (SharedState, MemoryLeagueStore) {
    let state = AppState::new(test_config(), Arc::new(mailer), Arc::new(payments));
    let store = MemoryLeagueStore::new();
    state.install_store(Arc::new(store.clone())).await;
    (state, store)
}

/// Register `email` with a team named after it and return the stored user.
pub async fn registered_caller(state: &SharedState, email: &str) -> UserEntity {
    user_service::register(
        state,
        email.to_owned(),
        RegisterUserRequest {
            team_name: format!("{email} team"),
        },
    )
    .await
    .unwrap();
    user_service::resolve_caller(state, email).await.unwrap()
}

pub async fn seed_game(store: &dyn LeagueStore, caller: &UserEntity, minutes: u32) -> GameEntity {
    let game = GameEntity {
        id: Uuid::new_v4(),
        team_id: caller.team_id,
        opponent: "Hornets".into(),
        duration_minutes: minutes,
        created_at: SystemTime::now(),
    };
    store.save_game(game.clone()).await.unwrap();
    game
}

pub async fn seed_player(store: &dyn LeagueStore, caller: &UserEntity, name: &str) -> PlayerEntity {
    let player = PlayerEntity {
        id: Uuid::new_v4(),
        team_id: caller.team_id,
        name: name.into(),
        created_at: SystemTime::now(),
    };
    store.save_player(player.clone()).await.unwrap();
    player
}

/// Mailer keeping every email it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, GatewayResult<()>> {
        self.sent.lock().unwrap().push(email);
        Box::pin(async { Ok(()) })
    }
}

#[derive(Default)]
struct FakeLedger {
    sessions: HashMap<String, CheckoutSession>,
    subscriptions: HashMap<String, Vec<String>>,
    customers: HashMap<String, String>,
}

/// Payment processor double with real webhook signature checks.
#[derive(Clone, Default)]
pub struct FakePayments {
    ledger: Arc<Mutex<FakeLedger>>,
}

impl FakePayments {
    pub fn mark_paid(&self, session_id: &str) {
        if let Some(session) = self.ledger.lock().unwrap().sessions.get_mut(session_id) {
            session.payment_status = "paid".into();
        }
    }

    pub fn add_subscription(&self, email: &str, subscription_id: &str) {
        self.ledger
            .lock()
            .unwrap()
            .subscriptions
            .entry(email.to_owned())
            .or_default()
            .push(subscription_id.to_owned());
    }

    pub fn add_customer(&self, customer_id: &str, email: &str) {
        self.ledger
            .lock()
            .unwrap()
            .customers
            .insert(customer_id.to_owned(), email.to_owned());
    }
}

impl PaymentGateway for FakePayments {
    fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>> {
        let id = format!("cs_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            id: id.clone(),
            url: Some(format!("https://checkout.test/{id}?price={}", request.price_id)),
            payment_status: "unpaid".into(),
        };
        self.ledger
            .lock()
            .unwrap()
            .sessions
            .insert(id, session.clone());
        Box::pin(async move { Ok(session) })
    }

    fn retrieve_checkout(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>> {
        let session = self.ledger.lock().unwrap().sessions.get(&session_id).cloned();
        Box::pin(async move {
            Ok(session.unwrap_or(CheckoutSession {
                id: session_id,
                url: None,
                payment_status: "unpaid".into(),
            }))
        })
    }

    fn active_subscriptions(
        &self,
        email: String,
    ) -> BoxFuture<'static, GatewayResult<Vec<String>>> {
        let active = self
            .ledger
            .lock()
            .unwrap()
            .subscriptions
            .get(&email)
            .cloned()
            .unwrap_or_default();
        Box::pin(async move { Ok(active) })
    }

    fn cancel_subscription(&self, subscription_id: String) -> BoxFuture<'static, GatewayResult<()>> {
        for ids in self.ledger.lock().unwrap().subscriptions.values_mut() {
            ids.retain(|id| *id != subscription_id);
        }
        Box::pin(async { Ok(()) })
    }

    fn customer_email(
        &self,
        customer_id: String,
    ) -> BoxFuture<'static, GatewayResult<Option<String>>> {
        let email = self.ledger.lock().unwrap().customers.get(&customer_id).cloned();
        Box::pin(async move { Ok(email) })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        stripe::verify_signature(
            payload,
            signature,
            WEBHOOK_SECRET,
            stripe::unix_now(),
            WEBHOOK_TOLERANCE_SECS,
        )?;
        stripe::parse_event(payload)
    }
}
