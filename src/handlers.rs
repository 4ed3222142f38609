pub mod attendance;
pub mod health;
