use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::Notification;

/// Transactional persistence for notifications.
///
/// Every operation runs inside a unit of work obtained from [`Store::begin`].
/// Independent units of work may be used concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    /// Unit of work handle
    type Tx: Send + Sync;

    /// Begin a unit of work
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Commit a unit of work
    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    /// Roll back a unit of work
    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;

    /// Resolve a notification type by name, registering it if absent
    async fn notification_type_id(&self, tx: &Self::Tx, name: &str) -> StoreResult<Uuid>;

    /// Resolve a user by username, adding the user if absent
    async fn user_id(&self, tx: &Self::Tx, username: &str) -> StoreResult<Uuid>;

    /// Insert a notification, returning its assigned ID
    async fn insert_notification(
        &self,
        tx: &Self::Tx,
        notification_type_id: Uuid,
        user_id: Uuid,
        notification: &Notification,
    ) -> StoreResult<Uuid>;

    /// Store the outgoing JSON on a notification. Exactly one row must be updated.
    async fn save_outgoing_json(&self, tx: &Self::Tx, id: Uuid, outgoing: &Value)
        -> StoreResult<()>;

    /// Count notifications for the user that are neither seen nor deleted
    async fn count_unread(&self, tx: &Self::Tx, username: &str) -> StoreResult<u64>;
}
