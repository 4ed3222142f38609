//! Attendance domain: the durable [`store::Store`] and the
//! [`attendance::AttendanceEngine`] that enforces the check-in rules.

pub mod attendance;
pub mod error;
pub mod report;
pub mod store;

#[cfg(test)]
mod testing;

pub use attendance::{
    AttendanceEngine, CheckInOutcome, CloseOutcome, CodePrompt, DayOpened, EngineConfig,
    RegistrationOutcome,
};
pub use error::{EngineError, Result};
pub use report::{DayStatistics, DaySummary, FullReport, UserAttendance, UserStatistics};
pub use store::{NewUser, Store};
