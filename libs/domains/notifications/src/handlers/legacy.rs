use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use messaging::Delivery;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::ValidateEmail;

use super::MessageHandler;
use crate::error::{Classify, HandlerError, HandlerResult};
use crate::gateway::MessagingGateway;
use crate::models::{
    EmailRequest, LegacyRequest, Notification, OutgoingNotificationMessage,
    WrappedNotificationMessage,
};
use crate::store::Store;
use crate::timestamps::{fix_timestamp_field, parse_timestamp};

/// Payload keys holding timestamps that the UI expects as epoch milliseconds.
const TIMESTAMP_KEYS: [&str; 2] = ["startdate", "enddate"];

/// Handler for notifications published by the backwards compatible HTTP API.
///
/// Each delivery is recorded in its own store transaction. The email request and
/// the UI notification are published before the commit, so a failure late in
/// the sequence can cause them to be sent again when the delivery is retried.
pub struct LegacyHandler<S, G> {
    store: Arc<S>,
    gateway: Arc<G>,
}

impl<S, G> LegacyHandler<S, G>
where
    S: Store,
    G: MessagingGateway,
{
    pub fn new(store: Arc<S>, gateway: Arc<G>) -> Self {
        Self { store, gateway }
    }

    /// Everything that happens inside the transaction.
    async fn record(
        &self,
        tx: &S::Tx,
        update_type: &str,
        delivery: &dyn Delivery,
        request: LegacyRequest,
        time_created: DateTime<FixedOffset>,
    ) -> HandlerResult<()> {
        let mut notification = Notification {
            id: None,
            notification_type: update_type.to_string(),
            user: request.user.clone(),
            subject: request.subject.clone(),
            seen: false,
            deleted: false,
            time_created,
            message: String::from_utf8_lossy(delivery.body()).into_owned(),
            routing_key: delivery.routing_key().to_string(),
        };
        self.save_notification(tx, &mut notification).await?;

        if request.email {
            self.send_email_request(&request).await?;
        }

        self.send_notification_message(tx, &notification, request)
            .await
    }

    async fn save_notification(
        &self,
        tx: &S::Tx,
        notification: &mut Notification,
    ) -> HandlerResult<()> {
        const CONTEXT: &str = "unable to save notification";

        let notification_type_id = self
            .store
            .notification_type_id(tx, &notification.notification_type)
            .await
            .unrecoverable(CONTEXT)?;

        let user_id = self
            .store
            .user_id(tx, &notification.user)
            .await
            .unrecoverable(CONTEXT)?;

        let id = self
            .store
            .insert_notification(tx, notification_type_id, user_id, notification)
            .await
            .unrecoverable(CONTEXT)?;

        notification.id = Some(id);
        debug!(notification_id = %id, "Notification saved");
        Ok(())
    }

    async fn send_email_request(&self, request: &LegacyRequest) -> HandlerResult<()> {
        const CONTEXT: &str = "unable to send the email request";

        let address = match request.payload.get("email_address") {
            Some(Value::String(address)) => address.clone(),
            _ => {
                return Err(HandlerError::unrecoverable(
                    "no email address provided or invalid data type in request",
                )
                .context(CONTEXT))
            }
        };

        if !address.validate_email() {
            return Err(
                HandlerError::unrecoverable(format!("invalid email address: {}", address))
                    .context(CONTEXT),
            );
        }

        if request.email_template.is_empty() {
            return Err(HandlerError::unrecoverable("no email template provided").context(CONTEXT));
        }

        let email = EmailRequest {
            template: request.email_template.clone(),
            to: address,
            subject: request.subject.clone(),
            values: request.payload.clone(),
        };

        self.gateway
            .publish_email_request(&email)
            .await
            .recoverable(CONTEXT)?;

        info!(template = %email.template, "Email request sent");
        Ok(())
    }

    async fn send_notification_message(
        &self,
        tx: &S::Tx,
        notification: &Notification,
        request: LegacyRequest,
    ) -> HandlerResult<()> {
        const CONTEXT: &str = "unable to send notification message";

        let outgoing =
            build_outgoing_message(notification, request).map_err(|e| e.context(CONTEXT))?;

        let outgoing_json = serde_json::to_value(&outgoing)
            .unrecoverable("unable to serialize the outgoing notification")?;

        self.store
            .save_outgoing_json(tx, outgoing.message.id, &outgoing_json)
            .await
            .map_err(|e| {
                HandlerError::from(e).context("unable to save outgoing notification JSON")
            })?;

        let total = self
            .store
            .count_unread(tx, &notification.user)
            .await
            .map_err(|e| HandlerError::from(e).context("unable to count unread notifications"))?;

        let wrapped = WrappedNotificationMessage {
            message: outgoing,
            total,
        };

        self.gateway
            .publish_notification(&wrapped)
            .await
            .map_err(|e| {
                let err = if e.is_retryable() {
                    HandlerError::recoverable(e.to_string())
                } else {
                    HandlerError::unrecoverable(e.to_string())
                };
                err.context(CONTEXT)
            })
    }
}

/// Normalize the request for the UI and build the outgoing message.
fn build_outgoing_message(
    notification: &Notification,
    mut request: LegacyRequest,
) -> HandlerResult<OutgoingNotificationMessage> {
    for key in TIMESTAMP_KEYS {
        fix_timestamp_field(&mut request.payload, key).map_err(|e| {
            HandlerError::unrecoverable(e.to_string())
                .context(format!("unable to fix the timestamp in key '{}'", key))
        })?;
    }

    request.request_type = request.request_type.replace('_', " ");

    OutgoingNotificationMessage::from_notification(notification, request)
        .ok_or_else(|| HandlerError::unrecoverable("notification has not been assigned an ID"))
}

#[async_trait]
impl<S, G> MessageHandler for LegacyHandler<S, G>
where
    S: Store,
    G: MessagingGateway,
{
    #[instrument(skip(self, delivery), fields(routing_key = %delivery.routing_key()))]
    async fn handle_message(
        &self,
        update_type: &str,
        delivery: &dyn Delivery,
    ) -> HandlerResult<()> {
        let request: LegacyRequest =
            serde_json::from_slice(delivery.body()).unrecoverable("unable to parse message body")?;

        if request.user.trim().is_empty() {
            return Err(HandlerError::unrecoverable("no user provided in request"));
        }

        let time_created =
            parse_timestamp(&request.timestamp).unrecoverable("unable to parse timestamp")?;

        let tx = self
            .store
            .begin()
            .await
            .recoverable("unable to begin a database transaction")?;

        match self
            .record(&tx, update_type, delivery, request, time_created)
            .await
        {
            Ok(()) => self
                .store
                .commit(tx)
                .await
                .recoverable("unable to commit the database transaction"),
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback(tx).await {
                    warn!(error = %rollback_err, "Failed to roll back the database transaction");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{
        fake_notification_id, FailPoint, InMemoryStore, MockDelivery, RecordingGateway,
        FAKE_ROUTING_KEY,
    };
    use serde_json::json;

    fn legacy_request() -> Value {
        json!({
            "type": "analysis",
            "user": "sarahr",
            "subject": "some job status changed",
            "message": "This is a test message",
            "timestamp": "2020-07-07T17:59:59-07:00",
            "payload": {
                "action": "job_status_change",
                "analysisname": "some job",
                "analysisdescription": "some job description",
                "analysisstatus": "Completed",
                "analysisstartdate": "2020-07-07T17:59:59-07:00",
                "analysisresultsfolder": "/iplant/home/foo/analyses",
                "description": "some job description",
                "email_address": "sarahr@cyverse.org",
                "name": "some job",
                "resultfolderid": "/iplant/home/foo/analyses",
                "startdate": "2020-07-07T17:59:59-07:00",
                "status": "Completed",
                "user": "sarahr"
            },
            "email_template": "analysis_status_change",
            "email": true
        })
    }

    fn is_epoch_millis(value: &str) -> bool {
        !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        gateway: Arc<RecordingGateway>,
        handler: LegacyHandler<InMemoryStore, RecordingGateway>,
    }

    fn fixture(store: InMemoryStore, gateway: RecordingGateway) -> Fixture {
        let store = Arc::new(store);
        let gateway = Arc::new(gateway);
        let handler = LegacyHandler::new(store.clone(), gateway.clone());
        Fixture {
            store,
            gateway,
            handler,
        }
    }

    async fn handle(fixture: &Fixture, body: &Value) -> HandlerResult<()> {
        let delivery = MockDelivery::new(FAKE_ROUTING_KEY, serde_json::to_vec(body).unwrap());
        fixture.handler.handle_message("analysis", &delivery).await
    }

    #[tokio::test]
    async fn test_notification() {
        let f = fixture(InMemoryStore::new(42), RecordingGateway::default());

        handle(&f, &legacy_request()).await.unwrap();

        {
            let calls = f.store.calls();
            assert_eq!(calls.begin, 1);
            assert_eq!(calls.commit, 1);
            assert_eq!(calls.rollback, 0);

            let saved = &calls.notifications[0];
            assert_eq!(saved.notification_type, "analysis");
            assert_eq!(saved.user, "sarahr");
            assert_eq!(saved.routing_key, FAKE_ROUTING_KEY);
            assert!(!saved.seen);
            assert!(!saved.deleted);

            let (id, outgoing) = &calls.outgoing[0];
            assert_eq!(*id, fake_notification_id());
            assert_eq!(
                outgoing["message"]["id"],
                json!("46ae63be-7030-4cdd-8eb9-66aa49fcf38b")
            );
            assert!(is_epoch_millis(outgoing["message"]["timestamp"].as_str().unwrap()));
        }

        let emails = f.gateway.emails();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].subject, "some job status changed");
        assert_eq!(emails[0].to, "sarahr@cyverse.org");
        assert_eq!(emails[0].template, "analysis_status_change");
        assert_eq!(emails[0].values["analysisname"], json!("some job"));

        let published = f.gateway.notifications();
        assert_eq!(published.len(), 1);
        let wrapped = &published[0];
        assert_eq!(wrapped.total, 42);
        assert_eq!(wrapped.message.message.id, fake_notification_id());
        assert!(is_epoch_millis(&wrapped.message.message.timestamp));
        assert_eq!(wrapped.message.message.text, "This is a test message");

        let startdate = wrapped.message.payload.payload["startdate"].as_str().unwrap();
        assert!(is_epoch_millis(startdate));
        assert!(!wrapped.message.payload.payload.contains_key("enddate"));
    }

    #[tokio::test]
    async fn test_stored_message_is_verbatim_body() {
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());
        let body = serde_json::to_vec(&legacy_request()).unwrap();
        let delivery = MockDelivery::new(FAKE_ROUTING_KEY, body.clone());

        f.handler.handle_message("analysis", &delivery).await.unwrap();

        let calls = f.store.calls();
        assert_eq!(calls.notifications[0].message.as_bytes(), body.as_slice());
    }

    #[tokio::test]
    async fn test_notification_without_email() {
        let mut request = legacy_request();
        request["email"] = json!(false);
        let f = fixture(InMemoryStore::new(42), RecordingGateway::default());

        handle(&f, &request).await.unwrap();

        assert_eq!(f.store.calls().commit, 1);
        assert_eq!(f.store.calls().notifications.len(), 1);
        assert!(f.gateway.emails().is_empty());
        assert_eq!(f.gateway.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_notification_without_message() {
        let mut request = legacy_request();
        request["message"] = json!("");
        let f = fixture(InMemoryStore::new(42), RecordingGateway::default());

        handle(&f, &request).await.unwrap();

        assert_eq!(f.gateway.emails().len(), 1);
        let published = f.gateway.notifications();
        assert_eq!(published[0].message.message.text, "some job status changed");
    }

    #[tokio::test]
    async fn test_underscores_replaced_in_types() {
        let mut request = legacy_request();
        request["type"] = json!("tool_request");
        let f = fixture(InMemoryStore::new(1), RecordingGateway::default());
        let delivery = MockDelivery::new(
            "events.notification.update.tool_request",
            serde_json::to_vec(&request).unwrap(),
        );

        f.handler
            .handle_message("tool_request", &delivery)
            .await
            .unwrap();

        assert_eq!(f.store.calls().notification_types, vec!["tool_request"]);
        let published = f.gateway.notifications();
        assert_eq!(published[0].message.notification_type, "tool request");
        assert_eq!(published[0].message.payload.request_type, "tool request");
    }

    #[tokio::test]
    async fn test_numeric_enddate_normalized() {
        let mut request = legacy_request();
        request["payload"]["enddate"] = json!(1594336370706.917);
        let f = fixture(InMemoryStore::new(1), RecordingGateway::default());

        handle(&f, &request).await.unwrap();

        let published = f.gateway.notifications();
        assert_eq!(
            published[0].message.payload.payload["enddate"],
            json!("1594336370706")
        );
    }

    #[tokio::test]
    async fn test_null_fields_take_defaults() {
        let mut request = legacy_request();
        request["message"] = Value::Null;
        request["payload"] = Value::Null;
        request["email"] = json!(false);
        request["email_template"] = Value::Null;
        let f = fixture(InMemoryStore::new(3), RecordingGateway::default());

        handle(&f, &request).await.unwrap();

        assert_eq!(f.store.calls().commit, 1);
        let published = f.gateway.notifications();
        assert_eq!(published[0].message.message.text, "some job status changed");
        assert!(published[0].message.payload.payload.is_empty());
        assert_eq!(published[0].total, 3);
    }

    #[tokio::test]
    async fn test_missing_user_is_unrecoverable_without_writes() {
        for user in [Value::Null, json!(""), json!("   ")] {
            let mut request = legacy_request();
            request["user"] = user;
            let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

            let err = handle(&f, &request).await.unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Unrecoverable);
            assert_eq!(err.message(), "no user provided in request");
            assert_eq!(f.store.calls().begin, 0);
            assert!(f.gateway.emails().is_empty());
            assert!(f.gateway.notifications().is_empty());
        }
    }

    #[tokio::test]
    async fn test_invalid_notification_subject_is_unrecoverable() {
        let gateway = RecordingGateway {
            reject_subject: true,
            ..Default::default()
        };
        let f = fixture(InMemoryStore::new(0), gateway);

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert!(err.message().starts_with("unable to send notification message: invalid subject"));
        assert_eq!(f.store.calls().rollback, 1);
    }

    #[tokio::test]
    async fn test_save_outgoing_failure_is_presumed_recoverable() {
        let f = fixture(
            InMemoryStore::new(0).failing_at(FailPoint::SaveOutgoing),
            RecordingGateway::default(),
        );

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PresumedRecoverable);
        assert!(err
            .message()
            .starts_with("unable to save outgoing notification JSON"));
        assert_eq!(f.store.calls().rollback, 1);
        assert_eq!(f.store.calls().commit, 0);
        assert!(f.gateway.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_json_is_unrecoverable_without_writes() {
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());
        let delivery = MockDelivery::new(FAKE_ROUTING_KEY, "{not json");

        let err = f
            .handler
            .handle_message("analysis", &delivery)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert!(err.message().starts_with("unable to parse message body"));
        assert_eq!(f.store.calls().begin, 0);
        assert!(f.store.calls().notifications.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_timestamp_is_unrecoverable() {
        let mut request = legacy_request();
        request["timestamp"] = json!("07/07/2020");
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert_eq!(f.store.calls().begin, 0);
    }

    #[tokio::test]
    async fn test_begin_failure_is_recoverable() {
        let f = fixture(
            InMemoryStore::new(0).failing_at(FailPoint::Begin),
            RecordingGateway::default(),
        );

        let err = handle(&f, &legacy_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Recoverable);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_unrecoverable_and_rolled_back() {
        for point in [FailPoint::UserId, FailPoint::Insert] {
            let f = fixture(
                InMemoryStore::new(0).failing_at(point),
                RecordingGateway::default(),
            );

            let err = handle(&f, &legacy_request()).await.unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Unrecoverable);
            assert!(err.message().starts_with("unable to save notification"));
            assert_eq!(f.store.calls().rollback, 1);
            assert_eq!(f.store.calls().commit, 0);
            assert!(f.gateway.emails().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_email_address_is_unrecoverable() {
        let mut request = legacy_request();
        request["payload"]
            .as_object_mut()
            .unwrap()
            .remove("email_address");
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert_eq!(
            err.message(),
            "unable to send the email request: no email address provided or invalid data type in request"
        );
        assert_eq!(f.store.calls().rollback, 1);
        assert!(f.gateway.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_non_string_email_address_is_unrecoverable() {
        let mut request = legacy_request();
        request["payload"]["email_address"] = json!(["sarahr@cyverse.org"]);
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
    }

    #[tokio::test]
    async fn test_invalid_email_address_is_unrecoverable() {
        let mut request = legacy_request();
        request["payload"]["email_address"] = json!("not an address");
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert!(err.message().contains("invalid email address"));
    }

    #[tokio::test]
    async fn test_missing_template_is_unrecoverable() {
        let mut request = legacy_request();
        request["email_template"] = json!("");
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert!(err.message().ends_with("no email template provided"));
    }

    #[tokio::test]
    async fn test_email_publish_failure_is_recoverable() {
        let gateway = RecordingGateway {
            fail_email: true,
            ..Default::default()
        };
        let f = fixture(InMemoryStore::new(0), gateway);

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Recoverable);
        assert_eq!(f.store.calls().rollback, 1);
    }

    #[tokio::test]
    async fn test_invalid_startdate_is_unrecoverable() {
        let mut request = legacy_request();
        request["payload"]["startdate"] = json!("last tuesday");
        let f = fixture(InMemoryStore::new(0), RecordingGateway::default());

        let err = handle(&f, &request).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unrecoverable);
        assert!(err
            .message()
            .starts_with("unable to send notification message: unable to fix the timestamp in key 'startdate'"));
        assert!(f.store.calls().outgoing.is_empty());
    }

    #[tokio::test]
    async fn test_unexpected_row_count_is_presumed_recoverable() {
        let f = fixture(
            InMemoryStore::new(0).with_rows_affected(0),
            RecordingGateway::default(),
        );

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PresumedRecoverable);
        assert!(err.message().contains("unexpected number of rows affected: 0"));
        assert!(f.gateway.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_count_failure_is_presumed_recoverable() {
        let f = fixture(
            InMemoryStore::new(0).failing_at(FailPoint::CountUnread),
            RecordingGateway::default(),
        );

        let err = handle(&f, &legacy_request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PresumedRecoverable);
        assert!(err.should_requeue());
    }

    #[tokio::test]
    async fn test_notification_publish_failure_is_recoverable() {
        let gateway = RecordingGateway {
            fail_notification: true,
            ..Default::default()
        };
        let f = fixture(InMemoryStore::new(0), gateway);

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Recoverable);
        assert_eq!(f.store.calls().commit, 0);
        assert_eq!(f.store.calls().rollback, 1);
    }

    #[tokio::test]
    async fn test_commit_failure_is_recoverable() {
        let f = fixture(
            InMemoryStore::new(0).failing_at(FailPoint::Commit),
            RecordingGateway::default(),
        );

        let err = handle(&f, &legacy_request()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Recoverable);
        assert!(err
            .message()
            .starts_with("unable to commit the database transaction"));
    }
}
