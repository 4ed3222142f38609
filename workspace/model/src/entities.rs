//! SeaORM entities for the attendance tracker: participants, event days
//! and the attendance rows linking them.

pub mod attendance;
pub mod event_day;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::attendance::Entity as Attendance;
    pub use super::event_day::Entity as EventDay;
    pub use super::user::Entity as User;
}
