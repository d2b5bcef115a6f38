//! In-memory doubles shared by the unit tests.

use async_trait::async_trait;
use messaging::{Delivery, MessagingError, MessagingResult};
use serde_json::Value;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{GatewayError, StoreError, StoreResult};
use crate::gateway::MessagingGateway;
use crate::models::{EmailRequest, Notification, WrappedNotificationMessage};
use crate::store::Store;

pub const FAKE_NOTIFICATION_ID: &str = "46ae63be-7030-4cdd-8eb9-66aa49fcf38b";
pub const FAKE_ROUTING_KEY: &str = "events.notification.update.foo";

pub fn fake_notification_id() -> Uuid {
    Uuid::parse_str(FAKE_NOTIFICATION_ID).unwrap()
}

/// How a [`MockDelivery`] was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Ack,
    Nack { requeue: bool },
}

pub struct MockDelivery {
    routing_key: String,
    body: Vec<u8>,
    settlements: Mutex<Vec<Settlement>>,
    fail_settle: bool,
}

impl MockDelivery {
    pub fn new(routing_key: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            routing_key: routing_key.to_string(),
            body: body.into(),
            settlements: Mutex::new(Vec::new()),
            fail_settle: false,
        }
    }

    pub fn failing_settle(mut self) -> Self {
        self.fail_settle = true;
        self
    }

    pub fn settlements(&self) -> Vec<Settlement> {
        self.settlements.lock().unwrap().clone()
    }

    fn record(&self, settlement: Settlement) -> MessagingResult<()> {
        self.settlements.lock().unwrap().push(settlement);
        if self.fail_settle {
            Err(MessagingError::ack("channel closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Delivery for MockDelivery {
    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    fn body(&self) -> &[u8] {
        &self.body
    }

    async fn ack(&self) -> MessagingResult<()> {
        self.record(Settlement::Ack)
    }

    async fn nack(&self, requeue: bool) -> MessagingResult<()> {
        self.record(Settlement::Nack { requeue })
    }
}

/// Store operation that should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Begin,
    UserId,
    Insert,
    SaveOutgoing,
    CountUnread,
    Commit,
}

#[derive(Default)]
pub struct StoreCalls {
    pub begin: usize,
    pub commit: usize,
    pub rollback: usize,
    pub notification_types: Vec<String>,
    pub users: Vec<String>,
    pub notifications: Vec<Notification>,
    pub outgoing: Vec<(Uuid, Value)>,
}

pub struct InMemoryStore {
    unread: u64,
    fail_at: Option<FailPoint>,
    rows_affected: u64,
    calls: Mutex<StoreCalls>,
}

impl InMemoryStore {
    pub fn new(unread: u64) -> Self {
        Self {
            unread,
            fail_at: None,
            rows_affected: 1,
            calls: Mutex::new(StoreCalls::default()),
        }
    }

    pub fn failing_at(mut self, point: FailPoint) -> Self {
        self.fail_at = Some(point);
        self
    }

    pub fn with_rows_affected(mut self, rows: u64) -> Self {
        self.rows_affected = rows;
        self
    }

    pub fn calls(&self) -> std::sync::MutexGuard<'_, StoreCalls> {
        self.calls.lock().unwrap()
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        if self.fail_at == Some(point) {
            Err(StoreError::Database(format!("{:?} failed", point)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = ();

    async fn begin(&self) -> StoreResult<()> {
        self.check(FailPoint::Begin)?;
        self.calls().begin += 1;
        Ok(())
    }

    async fn commit(&self, _tx: ()) -> StoreResult<()> {
        self.check(FailPoint::Commit)?;
        self.calls().commit += 1;
        Ok(())
    }

    async fn rollback(&self, _tx: ()) -> StoreResult<()> {
        self.calls().rollback += 1;
        Ok(())
    }

    async fn notification_type_id(&self, _tx: &(), name: &str) -> StoreResult<Uuid> {
        self.calls().notification_types.push(name.to_string());
        Ok(Uuid::new_v4())
    }

    async fn user_id(&self, _tx: &(), username: &str) -> StoreResult<Uuid> {
        self.check(FailPoint::UserId)?;
        self.calls().users.push(username.to_string());
        Ok(Uuid::new_v4())
    }

    async fn insert_notification(
        &self,
        _tx: &(),
        _notification_type_id: Uuid,
        _user_id: Uuid,
        notification: &Notification,
    ) -> StoreResult<Uuid> {
        self.check(FailPoint::Insert)?;
        self.calls().notifications.push(notification.clone());
        Ok(fake_notification_id())
    }

    async fn save_outgoing_json(&self, _tx: &(), id: Uuid, outgoing: &Value) -> StoreResult<()> {
        self.check(FailPoint::SaveOutgoing)?;
        if self.rows_affected != 1 {
            return Err(StoreError::UnexpectedRowCount(self.rows_affected));
        }
        self.calls().outgoing.push((id, outgoing.clone()));
        Ok(())
    }

    async fn count_unread(&self, _tx: &(), _username: &str) -> StoreResult<u64> {
        self.check(FailPoint::CountUnread)?;
        Ok(self.unread)
    }
}

#[derive(Default)]
pub struct RecordingGateway {
    pub fail_email: bool,
    pub fail_notification: bool,
    pub reject_subject: bool,
    pub emails: Mutex<Vec<EmailRequest>>,
    pub notifications: Mutex<Vec<WrappedNotificationMessage>>,
}

impl RecordingGateway {
    pub fn emails(&self) -> Vec<EmailRequest> {
        self.emails.lock().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<WrappedNotificationMessage> {
        self.notifications.lock().unwrap().clone()
    }
}

fn publish_failure(subject: &str) -> GatewayError {
    GatewayError::Publish {
        subject: subject.to_string(),
        source: MessagingError::publish("connection closed"),
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn publish_email_request(&self, request: &EmailRequest) -> Result<(), GatewayError> {
        if self.fail_email {
            return Err(publish_failure("email.requests"));
        }
        self.emails.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn publish_notification(
        &self,
        message: &WrappedNotificationMessage,
    ) -> Result<(), GatewayError> {
        if self.fail_notification {
            return Err(publish_failure("notification"));
        }
        if self.reject_subject {
            return Err(GatewayError::InvalidSubject("notification.".to_string()));
        }
        self.notifications.lock().unwrap().push(message.clone());
        Ok(())
    }
}
