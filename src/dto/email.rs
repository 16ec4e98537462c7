use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::EmailLogEntity,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_recipients},
    },
};

/// File attached to a parent email, already base64 encoded.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AttachmentInput {
    #[validate(length(min = 1, max = 255), custom(function = validate_not_blank))]
    pub name: String,
    /// Base64 encoded content.
    #[validate(length(min = 1))]
    pub content_base64: String,
}

/// Email sent to a list of parents.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SendEmailRequest {
    #[validate(custom(function = validate_recipients))]
    pub recipients: Vec<String>,
    #[validate(length(min = 1, max = 200), custom(function = validate_not_blank))]
    pub subject: String,
    #[validate(length(min = 1, max = 20_000), custom(function = validate_not_blank))]
    pub message: String,
    #[serde(default)]
    #[validate(nested)]
    pub attachment: Option<AttachmentInput>,
}

/// Logged email.
#[derive(Debug, Serialize, ToSchema)]
pub struct EmailLogSummary {
    pub id: Uuid,
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub message: String,
    pub attachment_name: Option<String>,
    pub created_at: String,
}

impl From<EmailLogEntity> for EmailLogSummary {
    fn from(value: EmailLogEntity) -> Self {
        Self {
            id: value.id,
            sender: value.sender,
            recipients: value.recipients,
            subject: value.subject,
            message: value.message,
            attachment_name: value.attachment_name,
            created_at: format_system_time(value.created_at),
        }
    }
}
