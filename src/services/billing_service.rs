use tracing::{info, warn};

use crate::{
    dao::models::{SubscriptionStatus, UserEntity},
    dto::billing::{CheckoutResponse, PaymentStatusResponse, SubscriptionResponse, WebhookAck},
    error::ServiceError,
    gateways::{CheckoutRequest, GatewayError},
    services::user_service,
    state::SharedState,
};

const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Open a subscription checkout for the caller.
pub async fn create_checkout(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<CheckoutResponse, ServiceError> {
    let billing = &state.config().billing;
    if billing.price_id.is_empty() {
        return Err(GatewayError::NotConfigured {
            service: "payments",
            var: "billing.price_id",
        }
        .into());
    }

    let session = state
        .payments()
        .create_checkout(CheckoutRequest {
            email: caller.email.clone(),
            price_id: billing.price_id.clone(),
            success_url: billing.success_url.clone(),
            cancel_url: billing.cancel_url.clone(),
        })
        .await?;
    let url = session.url.ok_or_else(|| {
        ServiceError::InvalidState("checkout session has no payment page".into())
    })?;
    info!(user_id = %caller.id, session_id = %session.id, "checkout session created");

    Ok(CheckoutResponse {
        session_id: session.id,
        url,
    })
}

/// Read a checkout session; a paid session activates the caller's subscription.
pub async fn check_payment(
    state: &SharedState,
    caller: &UserEntity,
    session_id: String,
) -> Result<PaymentStatusResponse, ServiceError> {
    let session = state.payments().retrieve_checkout(session_id).await?;
    let user = if session.is_paid() {
        user_service::set_subscription(state, caller.clone(), SubscriptionStatus::Active).await?
    } else {
        caller.clone()
    };
    Ok(PaymentStatusResponse {
        payment_status: session.payment_status,
        subscription: user.subscription.into(),
    })
}

/// Downgrade the caller to inactive when the payment processor has no active subscription.
///
/// Activation only happens through a paid checkout.
pub async fn check_subscription(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<SubscriptionResponse, ServiceError> {
    let active = state
        .payments()
        .active_subscriptions(caller.email.clone())
        .await?;
    if !active.is_empty() {
        return Ok(SubscriptionResponse {
            subscription: caller.subscription.into(),
        });
    }
    let user =
        user_service::set_subscription(state, caller.clone(), SubscriptionStatus::Inactive)
            .await?;
    Ok(SubscriptionResponse {
        subscription: user.subscription.into(),
    })
}

/// Cancel the caller's first active subscription.
pub async fn cancel_subscription(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<SubscriptionResponse, ServiceError> {
    let active = state
        .payments()
        .active_subscriptions(caller.email.clone())
        .await?;
    let Some(subscription_id) = active.into_iter().next() else {
        return Err(ServiceError::NotFound("no active subscription".into()));
    };

    state
        .payments()
        .cancel_subscription(subscription_id.clone())
        .await?;
    info!(user_id = %caller.id, subscription_id = %subscription_id, "subscription canceled");

    let user =
        user_service::set_subscription(state, caller.clone(), SubscriptionStatus::Inactive)
            .await?;
    Ok(SubscriptionResponse {
        subscription: user.subscription.into(),
    })
}

/// Authenticate a payment webhook and apply subscription deletions.
pub async fn handle_webhook(
    state: &SharedState,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<WebhookAck, ServiceError> {
    let signature = signature
        .ok_or_else(|| ServiceError::InvalidInput("missing `Stripe-Signature` header".into()))?;
    let event = state
        .payments()
        .verify_webhook(payload, signature)
        .map_err(|err| {
            warn!(error = %err, "rejected payment webhook");
            ServiceError::InvalidInput(format!("webhook rejected: {err}"))
        })?;

    if event.event_type != EVENT_SUBSCRIPTION_DELETED {
        info!(event_type = %event.event_type, "ignored payment webhook");
        return Ok(WebhookAck { received: true });
    }

    let Some(customer_id) = event.customer_id else {
        warn!("subscription deletion without a customer");
        return Ok(WebhookAck { received: true });
    };
    let email = state
        .payments()
        .customer_email(customer_id.clone())
        .await?
        .and_then(|email| user_service::normalize_email(&email));
    let Some(email) = email else {
        warn!(customer_id = %customer_id, "customer has no email; nothing to cancel");
        return Ok(WebhookAck { received: true });
    };

    let store = state.require_store().await?;
    match store.find_user_by_email(email).await? {
        Some(user) => {
            user_service::set_subscription(state, user, SubscriptionStatus::Canceled).await?;
        }
        None => warn!(customer_id = %customer_id, "no user matches the canceled customer"),
    }
    Ok(WebhookAck { received: true })
}

#[cfg(test)]
mod tests {
    use crate::{
        dao::league_store::{LeagueStore, memory::MemoryLeagueStore},
        dto::user::SubscriptionStatusDto,
        test_support::{
            FakePayments, RecordingMailer, WEBHOOK_SECRET, registered_caller, test_state_with,
        },
    };

    use super::*;

    async fn harness() -> (SharedState, MemoryLeagueStore, FakePayments) {
        let payments = FakePayments::default();
        let (state, store) = test_state_with(RecordingMailer::default(), payments.clone()).await;
        (state, store, payments)
    }

    #[tokio::test]
    async fn paid_checkout_activates_the_subscription() {
        let (state, store, payments) = harness().await;
        let caller = registered_caller(&state, "coach@example.com").await;

        let checkout = create_checkout(&state, &caller).await.unwrap();
        let unpaid = check_payment(&state, &caller, checkout.session_id.clone())
            .await
            .unwrap();
        assert_eq!(unpaid.subscription, SubscriptionStatusDto::Inactive);

        payments.mark_paid(&checkout.session_id);
        let paid = check_payment(&state, &caller, checkout.session_id)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, "paid");
        assert_eq!(paid.subscription, SubscriptionStatusDto::Active);
        let stored = store.find_user(caller.id).await.unwrap().unwrap();
        assert_eq!(stored.subscription, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn subscription_check_only_downgrades() {
        let (state, store, payments) = harness().await;
        let caller = registered_caller(&state, "coach@example.com").await;

        payments.add_subscription(&caller.email, "sub_1");
        let response = check_subscription(&state, &caller).await.unwrap();
        assert_eq!(response.subscription, SubscriptionStatusDto::Inactive);

        let caller = user_service::set_subscription(&state, caller, SubscriptionStatus::Active)
            .await
            .unwrap();
        let response = check_subscription(&state, &caller).await.unwrap();
        assert_eq!(response.subscription, SubscriptionStatusDto::Active);

        let canceled = cancel_subscription(&state, &caller).await.unwrap();
        assert_eq!(canceled.subscription, SubscriptionStatusDto::Inactive);
        assert!(matches!(
            cancel_subscription(&state, &caller).await,
            Err(ServiceError::NotFound(_))
        ));

        let caller = user_service::set_subscription(&state, caller, SubscriptionStatus::Active)
            .await
            .unwrap();
        let response = check_subscription(&state, &caller).await.unwrap();
        assert_eq!(response.subscription, SubscriptionStatusDto::Inactive);
        let stored = store.find_user(caller.id).await.unwrap().unwrap();
        assert_eq!(stored.subscription, SubscriptionStatus::Inactive);
    }

    #[tokio::test]
    async fn signed_deletion_webhook_cancels_the_user() {
        let (state, store, payments) = harness().await;
        let caller = registered_caller(&state, "coach@example.com").await;
        payments.add_customer("cus_42", "Coach@Example.com");
        let payload = br#"{"type":"customer.subscription.deleted","data":{"object":{"customer":"cus_42"}}}"#;
        let header = crate::gateways::stripe::sign(payload, WEBHOOK_SECRET, now());

        let ack = handle_webhook(&state, payload, Some(&header)).await.unwrap();

        assert!(ack.received);
        let stored = store.find_user(caller.id).await.unwrap().unwrap();
        assert_eq!(stored.subscription, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn tampered_webhooks_are_rejected() {
        let (state, _store, _payments) = harness().await;
        let payload = br#"{"type":"customer.subscription.deleted"}"#;
        let header = crate::gateways::stripe::sign(payload, WEBHOOK_SECRET, now());
        let tampered = br#"{"type":"customer.subscription.created"}"#;

        assert!(matches!(
            handle_webhook(&state, tampered, Some(&header)).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            handle_webhook(&state, payload, None).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn other_events_are_acknowledged() {
        let (state, _store, _payments) = harness().await;
        let payload = br#"{"type":"invoice.paid","data":{"object":{"customer":"cus_1"}}}"#;
        let header = crate::gateways::stripe::sign(payload, WEBHOOK_SECRET, now());

        assert!(handle_webhook(&state, payload, Some(&header)).await.unwrap().received);
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}
