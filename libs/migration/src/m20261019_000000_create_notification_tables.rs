use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(NotificationTypes::Table)
                    .if_not_exists()
                    .col(pk_uuid(NotificationTypes::Id))
                    .col(string(NotificationTypes::Name).unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_uuid(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(pk_uuid(Notifications::Id))
                    .col(uuid(Notifications::NotificationTypeId))
                    .col(uuid(Notifications::UserId))
                    .col(text(Notifications::Subject))
                    .col(boolean(Notifications::Seen).default(false))
                    .col(boolean(Notifications::Deleted).default(false))
                    .col(
                        timestamp_with_time_zone(Notifications::TimeCreated)
                            .default(Expr::current_timestamp()),
                    )
                    // Verbatim inbound body, kept as text so it is never re-encoded
                    .col(text(Notifications::IncomingJson))
                    .col(json_binary_null(Notifications::OutgoingJson))
                    .col(string_null(Notifications::RoutingKey))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_notification_type_id")
                            .from(Notifications::Table, Notifications::NotificationTypeId)
                            .to(NotificationTypes::Table, NotificationTypes::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unread counts filter on user, seen and deleted
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_unread")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::Seen)
                    .col(Notifications::Deleted)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_time_created")
                    .table(Notifications::Table)
                    .col(Notifications::TimeCreated)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(NotificationTypes::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum NotificationTypes {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    NotificationTypeId,
    UserId,
    Subject,
    Seen,
    Deleted,
    TimeCreated,
    IncomingJson,
    OutgoingJson,
    RoutingKey,
}
