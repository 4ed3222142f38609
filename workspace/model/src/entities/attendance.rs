use super::{event_day, user};
use sea_orm::entity::prelude::*;

/// A participant marked present on a day.
///
/// The composite primary key makes a second insert for the same
/// (user, day) pair fail at the storage layer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub day_number: i32,
    pub marked_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::UserId"
    )]
    User,
    #[sea_orm(
        belongs_to = "event_day::Entity",
        from = "Column::DayNumber",
        to = "event_day::Column::DayNumber"
    )]
    EventDay,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<event_day::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EventDay.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
