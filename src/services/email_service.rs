use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EmailLogEntity, SubscriptionStatus, UserEntity},
    dto::email::{EmailLogSummary, SendEmailRequest},
    error::ServiceError,
    gateways::{Attachment, OutgoingEmail, Sender},
    state::SharedState,
};

fn ensure_subscribed(caller: &UserEntity) -> Result<(), ServiceError> {
    match caller.subscription {
        SubscriptionStatus::Active => Ok(()),
        SubscriptionStatus::Inactive | SubscriptionStatus::Canceled => {
            Err(ServiceError::PaymentRequired(
                "parent emails require an active subscription".into(),
            ))
        }
    }
}

/// Send an email to parents through the mail API and log it.
pub async fn send_email(
    state: &SharedState,
    caller: &UserEntity,
    request: SendEmailRequest,
) -> Result<EmailLogSummary, ServiceError> {
    ensure_subscribed(caller)?;
    let store = state.require_store().await?;

    let settings = &state.config().mail;
    let attachment_name = request.attachment.as_ref().map(|file| file.name.clone());
    let email = OutgoingEmail {
        sender: Sender {
            email: settings.sender_email.clone(),
            name: settings.sender_name.clone(),
        },
        recipients: request.recipients.clone(),
        subject: request.subject.clone(),
        html_content: request.message.clone(),
        attachment: request.attachment.map(|file| Attachment {
            name: file.name,
            content_base64: file.content_base64,
        }),
    };
    state.mailer().send(email).await?;

    let log = EmailLogEntity {
        id: Uuid::new_v4(),
        team_id: caller.team_id,
        sender: settings.sender_email.clone(),
        recipients: request.recipients,
        subject: request.subject,
        message: request.message,
        attachment_name,
        created_at: SystemTime::now(),
    };
    store.save_email_log(log.clone()).await?;
    info!(
        email_id = %log.id,
        team_id = %log.team_id,
        recipients = log.recipients.len(),
        "parent email sent"
    );
    Ok(log.into())
}

/// Emails sent on behalf of the caller's team, oldest first.
pub async fn list_email_logs(
    state: &SharedState,
    caller: &UserEntity,
) -> Result<Vec<EmailLogSummary>, ServiceError> {
    ensure_subscribed(caller)?;
    let store = state.require_store().await?;
    Ok(store
        .list_email_logs(caller.team_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

#[cfg(test)]
mod tests {
    use crate::{
        dto::email::AttachmentInput,
        services::user_service,
        test_support::{
            FakePayments, RecordingMailer, registered_caller, test_state, test_state_with,
        },
    };

    use super::*;

    fn request() -> SendEmailRequest {
        SendEmailRequest {
            recipients: vec!["mom@example.com".into(), "dad@example.com".into()],
            subject: "Practice moved".into(),
            message: "<p>Thursday at 6pm.</p>".into(),
            attachment: Some(AttachmentInput {
                name: "schedule.pdf".into(),
                content_base64: "JVBERi0=".into(),
            }),
        }
    }

    #[tokio::test]
    async fn inactive_subscriptions_are_refused() {
        let (state, _store) = test_state().await;
        let caller = registered_caller(&state, "coach@example.com").await;

        assert!(matches!(
            send_email(&state, &caller, request()).await,
            Err(ServiceError::PaymentRequired(_))
        ));
        assert!(matches!(
            list_email_logs(&state, &caller).await,
            Err(ServiceError::PaymentRequired(_))
        ));
    }

    #[tokio::test]
    async fn sent_emails_are_delivered_and_logged() {
        let mailer = RecordingMailer::default();
        let (state, _store) = test_state_with(mailer.clone(), FakePayments::default()).await;
        let caller = registered_caller(&state, "coach@example.com").await;
        let caller = user_service::set_subscription(&state, caller, SubscriptionStatus::Active)
            .await
            .unwrap();

        let summary = send_email(&state, &caller, request()).await.unwrap();

        assert_eq!(summary.attachment_name.as_deref(), Some("schedule.pdf"));
        let delivered = mailer.sent();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipients.len(), 2);
        assert_eq!(delivered[0].sender.name, state.config().mail.sender_name);
        assert_eq!(list_email_logs(&state, &caller).await.unwrap().len(), 1);
    }
}
