//! Domain models for recorded notifications.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::timestamps::format_timestamp;

/// A notification as persisted by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Assigned by the store on insert
    pub id: Option<Uuid>,
    pub notification_type: String,
    pub user: String,
    pub subject: String,
    pub seen: bool,
    pub deleted: bool,
    pub time_created: DateTime<FixedOffset>,
    /// Verbatim inbound message body
    pub message: String,
    pub routing_key: String,
}

/// Inbound request published by the backwards compatible notification API.
///
/// Load-bearing payload keys: `email_address` (required when `email` is set),
/// `startdate` and `enddate` (optional, string or number). Missing and `null`
/// fields both take their default value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyRequest {
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub request_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub email_template: String,
    #[serde(deserialize_with = "null_as_default")]
    pub payload: Map<String, Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The `message` sub-object of an outgoing notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessageBody {
    pub id: Uuid,
    /// Epoch milliseconds
    pub timestamp: String,
    pub text: String,
}

/// Enriched notification sent to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingNotificationMessage {
    pub deleted: bool,
    pub email: bool,
    pub email_template: String,
    pub message: OutgoingMessageBody,
    pub payload: LegacyRequest,
    pub seen: bool,
    pub subject: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub user: String,
}

impl OutgoingNotificationMessage {
    /// Build the outgoing message for a stored notification.
    ///
    /// Returns `None` if the notification has not been assigned an ID yet. The
    /// request is embedded as the payload unchanged, so any normalization must
    /// happen before calling this.
    pub fn from_notification(notification: &Notification, request: LegacyRequest) -> Option<Self> {
        let id = notification.id?;

        let text = if request.message.is_empty() {
            request.subject.clone()
        } else {
            request.message.clone()
        };

        Some(Self {
            deleted: notification.deleted,
            email: request.email,
            email_template: request.email_template.clone(),
            message: OutgoingMessageBody {
                id,
                timestamp: format_timestamp(&notification.time_created),
                text,
            },
            payload: request,
            seen: notification.seen,
            subject: notification.subject.clone(),
            notification_type: notification.notification_type.replace('_', " "),
            user: notification.user.clone(),
        })
    }
}

/// Outgoing notification together with the user's unread count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WrappedNotificationMessage {
    pub message: OutgoingNotificationMessage,
    pub total: u64,
}

/// Request for the email service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRequest {
    /// Template name
    pub template: String,
    /// Recipient address
    pub to: String,
    pub subject: String,
    /// Template values
    pub values: Map<String, Value>,
}
