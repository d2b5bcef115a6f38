use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait,
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{notification_types, notifications, users};
use crate::error::{StoreError, StoreResult};
use crate::models::Notification;
use crate::store::Store;

/// [`Store`] backed by Postgres through Sea-ORM.
#[derive(Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = DatabaseTransaction;

    async fn begin(&self) -> StoreResult<DatabaseTransaction> {
        Ok(self.db.begin().await?)
    }

    async fn commit(&self, tx: DatabaseTransaction) -> StoreResult<()> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: DatabaseTransaction) -> StoreResult<()> {
        Ok(tx.rollback().await?)
    }

    async fn notification_type_id(
        &self,
        tx: &DatabaseTransaction,
        name: &str,
    ) -> StoreResult<Uuid> {
        notification_types::Entity::insert(notification_types::ActiveModel {
            id: Set(Uuid::now_v7()),
            name: Set(name.to_string()),
        })
        .on_conflict(
            OnConflict::column(notification_types::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(tx)
        .await?;

        let id: Option<Uuid> = notification_types::Entity::find()
            .select_only()
            .column(notification_types::Column::Id)
            .filter(notification_types::Column::Name.eq(name))
            .into_tuple()
            .one(tx)
            .await?;

        id.ok_or_else(|| {
            StoreError::Database(format!("notification type '{}' was not registered", name))
        })
    }

    async fn user_id(&self, tx: &DatabaseTransaction, username: &str) -> StoreResult<Uuid> {
        if let Some(user) = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(tx)
            .await?
        {
            return Ok(user.id);
        }

        users::Entity::insert(users::ActiveModel {
            id: Set(Uuid::now_v7()),
            username: Set(username.to_string()),
        })
        .on_conflict(OnConflict::column(users::Column::Username).do_nothing().to_owned())
        .exec_without_returning(tx)
        .await?;

        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(tx)
            .await?
            .ok_or_else(|| StoreError::Database(format!("user '{}' was not added", username)))?;

        debug!(user_id = %user.id, username = %username, "Added user");
        Ok(user.id)
    }

    async fn insert_notification(
        &self,
        tx: &DatabaseTransaction,
        notification_type_id: Uuid,
        user_id: Uuid,
        notification: &Notification,
    ) -> StoreResult<Uuid> {
        let model =
            notifications::ActiveModel::for_notification(notification, notification_type_id, user_id)
                .insert(tx)
                .await?;

        Ok(model.id)
    }

    async fn save_outgoing_json(
        &self,
        tx: &DatabaseTransaction,
        id: Uuid,
        outgoing: &Value,
    ) -> StoreResult<()> {
        let result = notifications::Entity::update_many()
            .col_expr(
                notifications::Column::OutgoingJson,
                Expr::value(outgoing.clone()),
            )
            .filter(notifications::Column::Id.eq(id))
            .exec(tx)
            .await?;

        if result.rows_affected != 1 {
            return Err(StoreError::UnexpectedRowCount(result.rows_affected));
        }

        Ok(())
    }

    async fn count_unread(&self, tx: &DatabaseTransaction, username: &str) -> StoreResult<u64> {
        let total = notifications::Entity::find()
            .inner_join(users::Entity)
            .filter(users::Column::Username.eq(username))
            .filter(notifications::Column::Deleted.eq(false))
            .filter(notifications::Column::Seen.eq(false))
            .count(tx)
            .await?;

        Ok(total)
    }
}
