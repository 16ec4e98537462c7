use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dao::models::UserEntity,
    dto::billing::{
        CheckoutResponse, PaymentStatusQuery, PaymentStatusResponse, SubscriptionResponse,
        WebhookAck,
    },
    error::AppError,
    services::billing_service,
    state::SharedState,
};

const SIGNATURE_HEADER: &str = "stripe-signature";

/// Subscription endpoints of registered users.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/billing/checkout", post(create_checkout))
        .route("/billing/payment", get(check_payment))
        .route(
            "/billing/subscription",
            get(check_subscription).delete(cancel_subscription),
        )
}

/// Payment processor callbacks, authenticated by signature instead of identity.
pub fn webhook_router() -> Router<SharedState> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}

/// Open a subscription checkout.
#[utoipa::path(
    post,
    path = "/billing/checkout",
    tag = "billing",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Checkout session", body = CheckoutResponse),
        (status = 502, description = "Payment API failure")
    )
)]
pub async fn create_checkout(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<CheckoutResponse>, AppError> {
    Ok(Json(billing_service::create_checkout(&state, &caller).await?))
}

/// Check a checkout session and activate the subscription once paid.
#[utoipa::path(
    get,
    path = "/billing/payment",
    tag = "billing",
    params(
        ("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy"),
        PaymentStatusQuery
    ),
    responses(
        (status = 200, description = "Payment status", body = PaymentStatusResponse),
        (status = 502, description = "Payment API failure")
    )
)]
pub async fn check_payment(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
    Query(query): Query<PaymentStatusQuery>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    Ok(Json(
        billing_service::check_payment(&state, &caller, query.session_id).await?,
    ))
}

/// Sync the subscription status with the payment processor.
#[utoipa::path(
    get,
    path = "/billing/subscription",
    tag = "billing",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Subscription status", body = SubscriptionResponse),
        (status = 502, description = "Payment API failure")
    )
)]
pub async fn check_subscription(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    Ok(Json(
        billing_service::check_subscription(&state, &caller).await?,
    ))
}

/// Cancel the active subscription.
#[utoipa::path(
    delete,
    path = "/billing/subscription",
    tag = "billing",
    params(("X-User-Email" = String, Header, description = "Caller identity set by the auth proxy")),
    responses(
        (status = 200, description = "Subscription canceled", body = SubscriptionResponse),
        (status = 404, description = "No active subscription"),
        (status = 502, description = "Payment API failure")
    )
)]
pub async fn cancel_subscription(
    State(state): State<SharedState>,
    Extension(caller): Extension<UserEntity>,
) -> Result<Json<SubscriptionResponse>, AppError> {
    Ok(Json(
        billing_service::cancel_subscription(&state, &caller).await?,
    ))
}

/// Receive a signed payment processor event.
#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "billing",
    params(("Stripe-Signature" = String, Header, description = "Signature of the payload")),
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event acknowledged", body = WebhookAck),
        (status = 400, description = "Missing or invalid signature")
    )
)]
pub async fn stripe_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    Ok(Json(
        billing_service::handle_webhook(&state, &body, signature).await?,
    ))
}
