//! Clients of the external services the backend delegates to: transactional email and payments.

pub mod brevo;
pub mod stripe;

use futures::future::BoxFuture;
use thiserror::Error;

/// Result alias for gateway calls.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure of a call to an external API.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials for the service were not provided.
    #[error("{service} is not configured (missing `{var}`)")]
    NotConfigured {
        /// Service name.
        service: &'static str,
        /// Environment variable that should hold the credential.
        var: &'static str,
    },
    /// The request could not be sent.
    #[error("request to {service} failed")]
    Transport {
        /// Service name.
        service: &'static str,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },
    /// The service answered with a non-success status.
    #[error("{service} rejected the request with status {status}: {body}")]
    Rejected {
        /// Service name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The response did not have the expected shape.
    #[error("unexpected response from {service}")]
    Decode {
        /// Service name.
        service: &'static str,
        /// Underlying decoding error.
        #[source]
        source: reqwest::Error,
    },
}

impl GatewayError {
    /// Name of the service that failed.
    pub fn service(&self) -> &'static str {
        match self {
            GatewayError::NotConfigured { service, .. }
            | GatewayError::Transport { service, .. }
            | GatewayError::Rejected { service, .. }
            | GatewayError::Decode { service, .. } => *service,
        }
    }
}

/// Identity used as the sender of outgoing emails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Sender address.
    pub email: String,
    /// Sender display name.
    pub name: String,
}

/// File attached to an outgoing email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to recipients.
    pub name: String,
    /// Base64 encoded content.
    pub content_base64: String,
}

/// Email handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Sender identity.
    pub sender: Sender,
    /// Recipient addresses.
    pub recipients: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_content: String,
    /// Optional single attachment.
    pub attachment: Option<Attachment>,
}

/// Transactional email delivery.
pub trait Mailer: Send + Sync {
    /// Deliver `email` to every recipient.
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, GatewayResult<()>>;
}

/// Parameters of a subscription checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Email of the paying user.
    pub email: String,
    /// Subscribed price.
    pub price_id: String,
    /// Redirect after payment.
    pub success_url: String,
    /// Redirect after cancellation.
    pub cancel_url: String,
}

/// Checkout session as reported by the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Session identifier.
    pub id: String,
    /// Hosted payment page, when still open.
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,
}

impl CheckoutSession {
    /// Whether the session has been paid.
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }
}

/// Webhook notification after signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Event type, e.g. `customer.subscription.deleted`.
    pub event_type: String,
    /// Customer the event refers to, if any.
    pub customer_id: Option<String>,
}

/// Reasons a webhook payload is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// No signing secret is configured.
    #[error("webhook signing secret is not configured")]
    NotConfigured,
    /// The signature header is missing or malformed.
    #[error("malformed signature header")]
    MalformedHeader,
    /// The timestamp is outside the accepted window.
    #[error("signature timestamp outside the tolerance window")]
    Stale,
    /// No signature matched the payload.
    #[error("signature mismatch")]
    Mismatch,
    /// The payload is not a valid event.
    #[error("invalid event payload")]
    InvalidPayload,
}

/// Subscription billing through a payment processor.
pub trait PaymentGateway: Send + Sync {
    /// Create a customer and a subscription checkout session for them.
    fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>>;

    /// Fetch a checkout session.
    fn retrieve_checkout(
        &self,
        session_id: String,
    ) -> BoxFuture<'static, GatewayResult<CheckoutSession>>;

    /// Identifiers of the active subscriptions of the customer registered with `email`.
    fn active_subscriptions(&self, email: String)
    -> BoxFuture<'static, GatewayResult<Vec<String>>>;

    /// Cancel a subscription immediately.
    fn cancel_subscription(&self, subscription_id: String) -> BoxFuture<'static, GatewayResult<()>>;

    /// Email of a customer, if the processor knows one.
    fn customer_email(&self, customer_id: String)
    -> BoxFuture<'static, GatewayResult<Option<String>>>;

    /// Authenticate and decode a webhook payload.
    fn verify_webhook(&self, payload: &[u8], signature: &str)
    -> Result<WebhookEvent, WebhookError>;
}
