use sea_orm::entity::prelude::*;

/// A registered participant of the event.
///
/// The primary key is the participant's chat account id, so a person can
/// register only once. Rows are never updated after registration.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub group_name: String,
    pub registered_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    // A user collects one attendance row per visited day.
    #[sea_orm(has_many = "super::attendance::Entity")]
    Attendance,
}

impl Related<super::attendance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Attendance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// "Last First Middle", skipping the middle name when absent.
pub fn format_full_name(last_name: &str, first_name: &str, middle_name: Option<&str>) -> String {
    match middle_name {
        Some(middle) => format!("{last_name} {first_name} {middle}"),
        None => format!("{last_name} {first_name}"),
    }
}

impl Model {
    pub fn full_name(&self) -> String {
        format_full_name(&self.last_name, &self.first_name, self.middle_name.as_deref())
    }
}
