use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::Set;

use crate::models::Notification;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub notification_type_id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub subject: String,
    pub seen: bool,
    pub deleted: bool,
    pub time_created: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text")]
    pub incoming_json: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub outgoing_json: Option<Json>,
    pub routing_key: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::notification_types::Entity",
        from = "Column::NotificationTypeId",
        to = "super::notification_types::Column::Id"
    )]
    NotificationType,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,
}

impl Related<super::notification_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::NotificationType.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    /// New row for a notification that has not been stored yet.
    pub fn for_notification(
        notification: &Notification,
        notification_type_id: Uuid,
        user_id: Uuid,
    ) -> Self {
        ActiveModel {
            id: Set(Uuid::now_v7()),
            notification_type_id: Set(notification_type_id),
            user_id: Set(user_id),
            subject: Set(notification.subject.clone()),
            seen: Set(notification.seen),
            deleted: Set(notification.deleted),
            time_created: Set(notification.time_created),
            incoming_json: Set(notification.message.clone()),
            outgoing_json: Set(None),
            routing_key: Set(Some(notification.routing_key.clone())),
        }
    }
}
