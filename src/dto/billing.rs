use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dto::user::SubscriptionStatusDto;

/// Checkout session the client is redirected to.
#[derive(Debug, Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

/// Checkout session returned to the success page.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaymentStatusQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    /// Raw payment status reported by the processor.
    pub payment_status: String,
    pub subscription: SubscriptionStatusDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub subscription: SubscriptionStatusDto,
}

/// Acknowledgement returned to the payment processor.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}
