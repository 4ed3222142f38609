use sea_orm::entity::prelude::*;

/// One day of the event together with the code attendees submit to check in.
///
/// At most one row has `is_active = true`; the schema backs this with a
/// partial unique index and the store only activates a day inside a
/// transaction that first deactivates every other day.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "event_days")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub day_number: i32,
    #[sea_orm(unique)]
    pub code: String,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Case-insensitive comparison of a submitted code with the day's code.
    /// Surrounding whitespace of the submission is ignored.
    pub fn code_matches(&self, submitted: &str) -> bool {
        submitted.trim().to_lowercase() == self.code.trim().to_lowercase()
    }
}
