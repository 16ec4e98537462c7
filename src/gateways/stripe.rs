//! Stripe REST client and webhook signature verification.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use futures::future::BoxFuture;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::debug;

use super::{
    CheckoutRequest, CheckoutSession, GatewayError, GatewayResult, PaymentGateway, WebhookError,
    WebhookEvent,
};

const SERVICE: &str = "payments";
const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";
/// Maximum age of a signed webhook, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

/// Connection settings for the Stripe API.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Secret API key.
    pub secret_key: Option<String>,
    /// Secret used to sign webhook payloads.
    pub webhook_secret: Option<String>,
}

impl StripeConfig {
    /// Read `STRIPE_SECRET_KEY`, `STRIPE_WEBHOOK_SECRET` and the optional `STRIPE_API_BASE`.
    pub fn from_env() -> Self {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|value| !value.is_empty());
        Self {
            base_url: non_empty("STRIPE_API_BASE").unwrap_or_else(|| DEFAULT_BASE_URL.to_owned()),
            secret_key: non_empty("STRIPE_SECRET_KEY"),
            webhook_secret: non_empty("STRIPE_WEBHOOK_SECRET"),
        }
    }
}

/// [`PaymentGateway`] backed by the Stripe REST API.
#[derive(Clone)]
pub struct StripeGateway {
    client: Client,
    base_url: Arc<str>,
    secret_key: Option<Arc<str>>,
    webhook_secret: Option<Arc<str>>,
}

#[derive(Debug, Deserialize)]
struct List<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Session {
    id: String,
    #[serde(default)]
    url: Option<String>,
    payment_status: String,
}

impl From<Session> for CheckoutSession {
    fn from(value: Session) -> Self {
        Self {
            id: value.id,
            url: value.url,
            payment_status: value.payment_status,
        }
    }
}

impl StripeGateway {
    /// Build a gateway from its configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            secret_key: config.secret_key.map(Arc::from),
            webhook_secret: config.webhook_secret.map(Arc::from),
        }
    }

    fn request(&self, method: Method, path: &str) -> GatewayResult<RequestBuilder> {
        let key = self.secret_key.as_deref().ok_or(GatewayError::NotConfigured {
            service: SERVICE,
            var: "STRIPE_SECRET_KEY",
        })?;
        Ok(self
            .client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(key))
    }

    async fn call<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        let response = builder
            .send()
            .await
            .map_err(|source| GatewayError::Transport {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                service: SERVICE,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| GatewayError::Decode {
                service: SERVICE,
                source,
            })
    }

    async fn create_checkout(&self, request: CheckoutRequest) -> GatewayResult<CheckoutSession> {
        let customer: Customer = self
            .call(
                self.request(Method::POST, "customers")?
                    .form(&[("email", request.email.as_str())]),
            )
            .await?;

        let session: Session = self
            .call(self.request(Method::POST, "checkout/sessions")?.form(&[
                ("customer", customer.id.as_str()),
                ("mode", "subscription"),
                ("line_items[0][price]", request.price_id.as_str()),
                ("line_items[0][quantity]", "1"),
                ("success_url", request.success_url.as_str()),
                ("cancel_url", request.cancel_url.as_str()),
            ]))
            .await?;

        debug!(session_id = %session.id, customer_id = %customer.id, "checkout session created");
        Ok(session.into())
    }

    async fn retrieve_checkout(&self, session_id: String) -> GatewayResult<CheckoutSession> {
        let session: Session = self
            .call(self.request(Method::GET, &format!("checkout/sessions/{session_id}"))?)
            .await?;
        Ok(session.into())
    }

    async fn active_subscriptions(&self, email: String) -> GatewayResult<Vec<String>> {
        let customers: List<Customer> = self
            .call(
                self.request(Method::GET, "customers")?
                    .query(&[("email", email.as_str()), ("limit", "1")]),
            )
            .await?;

        let Some(customer) = customers.data.into_iter().next() else {
            return Ok(Vec::new());
        };

        let subscriptions: List<Subscription> = self
            .call(
                self.request(Method::GET, "subscriptions")?
                    .query(&[("customer", customer.id.as_str()), ("status", "active")]),
            )
            .await?;

        Ok(subscriptions.data.into_iter().map(|sub| sub.id).collect())
    }

    async fn cancel_subscription(&self, subscription_id: String) -> GatewayResult<()> {
        let _: Subscription = self
            .call(self.request(Method::DELETE, &format!("subscriptions/{subscription_id}"))?)
            .await?;
        Ok(())
    }

    async fn customer_email(&self, customer_id: String) -> GatewayResult<Option<String>> {
        let customer: Customer = self
            .call(self.request(Method::GET, &format!("customers/{customer_id}"))?)
            .await?;
        Ok(customer.email)
    }
}

impl PaymentGateway for StripeGateway {
    fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.create_checkout(request).await })
    }

    fn retrieve_checkout(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.retrieve_checkout(session_id).await })
    }

    fn active_subscriptions(
        &self,
        email: String,
    ) -> BoxFuture<'static, GatewayResult<Vec<String>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.active_subscriptions(email).await })
    }

    fn cancel_subscription(&self, subscription_id: String) -> BoxFuture<'static, GatewayResult<()>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.cancel_subscription(subscription_id).await })
    }

    fn customer_email(
        &self,
        customer_id: String,
    ) -> BoxFuture<'static, GatewayResult<Option<String>>> {
        let gateway = self.clone();
        Box::pin(async move { gateway.customer_email(customer_id).await })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(WebhookError::NotConfigured)?;
        verify_signature(payload, signature, secret, unix_now(), WEBHOOK_TOLERANCE_SECS)?;
        parse_event(payload)
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=<hex>...]`) against `payload`.
///
/// The signed content is `"{t}.{payload}"`, authenticated with HMAC-SHA256 under `secret`.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let signed_prefix = format!("{timestamp}.");
    let matches = signatures.iter().any(|signature| {
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(signed_prefix.as_bytes());
        mac.update(payload);
        mac.verify_slice(signature).is_ok()
    });
    if !matches {
        return Err(WebhookError::Mismatch);
    }

    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(WebhookError::Stale);
    }

    Ok(())
}

/// Decode the subset of a Stripe event the backend reacts to.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    #[derive(Deserialize)]
    struct RawEvent {
        #[serde(rename = "type")]
        event_type: String,
        #[serde(default)]
        data: Option<RawData>,
    }

    #[derive(Deserialize)]
    struct RawData {
        object: RawObject,
    }

    #[derive(Deserialize)]
    struct RawObject {
        #[serde(default)]
        customer: Option<String>,
    }

    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|_| WebhookError::InvalidPayload)?;
    Ok(WebhookEvent {
        event_type: raw.event_type,
        customer_id: raw.data.and_then(|data| data.object.customer),
    })
}

/// Build a signature header the way Stripe does.
#[cfg(test)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_700_000_000;
    const PAYLOAD: &[u8] =
        br#"{"type":"customer.subscription.deleted","data":{"object":{"customer":"cus_42"}}}"#;

    #[test]
    fn valid_signature_is_accepted() {
        let header = sign(PAYLOAD, SECRET, NOW);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, NOW + 10, WEBHOOK_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn any_matching_v1_entry_is_enough() {
        let valid = sign(PAYLOAD, SECRET, NOW);
        let valid_sig = valid.split_once("v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={valid_sig},v0=ignored", "00".repeat(32));
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, NOW, WEBHOOK_TOLERANCE_SECS),
            Ok(())
        );
    }

    #[test]
    fn tampered_body_is_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW);
        let tampered = br#"{"type":"customer.subscription.deleted","data":{"object":{"customer":"cus_43"}}}"#;
        assert_eq!(
            verify_signature(tampered, &header, SECRET, NOW, WEBHOOK_TOLERANCE_SECS),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign(PAYLOAD, "whsec_other", NOW);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, NOW, WEBHOOK_TOLERANCE_SECS),
            Err(WebhookError::Mismatch)
        );
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let header = sign(PAYLOAD, SECRET, NOW);
        assert_eq!(
            verify_signature(PAYLOAD, &header, SECRET, NOW + 301, WEBHOOK_TOLERANCE_SECS),
            Err(WebhookError::Stale)
        );
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let no_signature = format!("t={NOW}");
        for header in ["", "t=abc,v1=00", "v1=00", no_signature.as_str()] {
            assert_eq!(
                verify_signature(PAYLOAD, header, SECRET, NOW, WEBHOOK_TOLERANCE_SECS),
                Err(WebhookError::MalformedHeader),
                "header {header:?}"
            );
        }
    }

    #[test]
    fn event_customer_is_extracted() {
        let event = parse_event(PAYLOAD).unwrap();
        assert_eq!(event.event_type, "customer.subscription.deleted");
        assert_eq!(event.customer_id.as_deref(), Some("cus_42"));

        let bare = parse_event(br#"{"type":"ping"}"#).unwrap();
        assert_eq!(bare.customer_id, None);
        assert_eq!(parse_event(b"nope"), Err(WebhookError::InvalidPayload));
    }

    #[test]
    fn gateway_without_webhook_secret_refuses_events() {
        let gateway = StripeGateway::new(StripeConfig {
            base_url: DEFAULT_BASE_URL.into(),
            secret_key: None,
            webhook_secret: None,
        });
        assert_eq!(
            gateway.verify_webhook(PAYLOAD, &sign(PAYLOAD, SECRET, NOW)),
            Err(WebhookError::NotConfigured)
        );
    }
}
