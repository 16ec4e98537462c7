//! Brevo transactional email client.

use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use super::{GatewayError, GatewayResult, Mailer, OutgoingEmail};

const SERVICE: &str = "email";
const DEFAULT_BASE_URL: &str = "https://api.brevo.com/v3";

/// Connection settings for the Brevo API.
#[derive(Debug, Clone)]
pub struct BrevoConfig {
    /// API root, without trailing slash.
    pub base_url: String,
    /// Key sent in the `api-key` header.
    pub api_key: Option<String>,
}

impl BrevoConfig {
    /// Read `BREVO_API_KEY` and the optional `BREVO_BASE_URL`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("BREVO_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned()),
            api_key: std::env::var("BREVO_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
        }
    }
}

/// [`Mailer`] posting to Brevo's SMTP endpoint.
#[derive(Clone)]
pub struct BrevoMailer {
    client: Client,
    base_url: Arc<str>,
    api_key: Option<Arc<str>>,
}

impl BrevoMailer {
    /// Build a mailer from its configuration.
    pub fn new(config: BrevoConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            api_key: config.api_key.map(Arc::from),
        }
    }

    async fn deliver(&self, email: OutgoingEmail) -> GatewayResult<()> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::NotConfigured {
            service: SERVICE,
            var: "BREVO_API_KEY",
        })?;

        let body = BrevoEmail::from(&email);
        let response = self
            .client
            .post(format!("{}/smtp/email", self.base_url))
            .header("api-key", api_key)
            .json(&body)
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

        info!(
            recipients = email.recipients.len(),
            with_attachment = email.attachment.is_some(),
            "email handed to Brevo"
        );
        Ok(())
    }
}

impl Mailer for BrevoMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, GatewayResult<()>> {
        let mailer = self.clone();
        Box::pin(async move { mailer.deliver(email).await })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BrevoEmail<'a> {
    sender: BrevoContact<'a>,
    to: Vec<BrevoContact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachment: Option<Vec<BrevoAttachment<'a>>>,
}

#[derive(Debug, Serialize)]
struct BrevoContact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct BrevoAttachment<'a> {
    name: &'a str,
    content: &'a str,
}

impl<'a> From<&'a OutgoingEmail> for BrevoEmail<'a> {
    fn from(email: &'a OutgoingEmail) -> Self {
        Self {
            sender: BrevoContact {
                email: &email.sender.email,
                name: Some(&email.sender.name),
            },
            to: email
                .recipients
                .iter()
                .map(|address| BrevoContact {
                    email: address,
                    name: None,
                })
                .collect(),
            subject: &email.subject,
            html_content: &email.html_content,
            attachment: email.attachment.as_ref().map(|file| {
                vec![BrevoAttachment {
                    name: &file.name,
                    content: &file.content_base64,
                }]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::gateways::{Attachment, Sender};

    fn email(attachment: Option<Attachment>) -> OutgoingEmail {
        OutgoingEmail {
            sender: Sender {
                email: "coach@example.com".into(),
                name: "Coach".into(),
            },
            recipients: vec!["a@example.com".into(), "b@example.com".into()],
            subject: "Practice moved".into(),
            html_content: "<p>Thursday 6pm</p>".into(),
            attachment,
        }
    }

    #[test]
    fn payload_matches_brevo_shape() {
        let email = email(None);
        let value = serde_json::to_value(BrevoEmail::from(&email)).unwrap();
        assert_eq!(
            value,
            json!({
                "sender": {"email": "coach@example.com", "name": "Coach"},
                "to": [{"email": "a@example.com"}, {"email": "b@example.com"}],
                "subject": "Practice moved",
                "htmlContent": "<p>Thursday 6pm</p>",
            })
        );
    }

    #[test]
    fn attachment_is_sent_inline() {
        let email = email(Some(Attachment {
            name: "schedule.pdf".into(),
            content_base64: "JVBERi0=".into(),
        }));
        let value = serde_json::to_value(BrevoEmail::from(&email)).unwrap();
        assert_eq!(
            value["attachment"],
            json!([{"name": "schedule.pdf", "content": "JVBERi0="}])
        );
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_any_request() {
        let mailer = BrevoMailer::new(BrevoConfig {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
        });
        let err = mailer.send(email(None)).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::NotConfigured {
                var: "BREVO_API_KEY",
                ..
            }
        ));
    }
}
