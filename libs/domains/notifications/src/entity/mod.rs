//! Sea-ORM entities for the notifications schema.

pub mod notification_types;
pub mod notifications;
pub mod users;
