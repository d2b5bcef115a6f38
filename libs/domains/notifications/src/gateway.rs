//! Outbound publishing of email requests and UI notifications.

use async_trait::async_trait;
use messaging::nats::NatsPublisher;
use tracing::debug;

use crate::error::GatewayError;
use crate::models::{EmailRequest, WrappedNotificationMessage};

/// Publish operations used by the handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Publish a request for the email service
    async fn publish_email_request(&self, request: &EmailRequest) -> Result<(), GatewayError>;

    /// Publish a notification for the UI
    async fn publish_notification(
        &self,
        message: &WrappedNotificationMessage,
    ) -> Result<(), GatewayError>;
}

/// [`MessagingGateway`] backed by core NATS subjects.
pub struct NatsGateway {
    publisher: NatsPublisher,
    email_subject: String,
    notification_prefix: String,
}

impl NatsGateway {
    pub fn new(
        publisher: NatsPublisher,
        email_subject: impl Into<String>,
        notification_prefix: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            email_subject: email_subject.into(),
            notification_prefix: notification_prefix.into(),
        }
    }

    /// Subject a user's notifications are published to.
    pub fn notification_subject(&self, user: &str) -> Result<String, GatewayError> {
        notification_subject(&self.notification_prefix, user)
    }
}

/// Usernames become a single subject token, so separators and wildcards are replaced.
/// An empty username has no valid token.
fn notification_subject(prefix: &str, user: &str) -> Result<String, GatewayError> {
    if user.trim().is_empty() {
        return Err(GatewayError::InvalidSubject(format!("{}.", prefix)));
    }

    let token: String = user
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    Ok(format!("{}.{}", prefix, token))
}

#[async_trait]
impl MessagingGateway for NatsGateway {
    async fn publish_email_request(&self, request: &EmailRequest) -> Result<(), GatewayError> {
        self.publisher
            .publish_json(&self.email_subject, request)
            .await
            .map_err(|source| GatewayError::Publish {
                subject: self.email_subject.clone(),
                source,
            })?;

        debug!(
            subject = %self.email_subject,
            template = %request.template,
            "Email request published"
        );
        Ok(())
    }

    async fn publish_notification(
        &self,
        message: &WrappedNotificationMessage,
    ) -> Result<(), GatewayError> {
        let subject = self.notification_subject(&message.message.user)?;

        self.publisher
            .publish_json(&subject, message)
            .await
            .map_err(|source| GatewayError::Publish {
                subject: subject.clone(),
                source,
            })?;

        debug!(subject = %subject, total = message.total, "Notification published");
        Ok(())
    }
}
