//! Read-only projections over the store used for statistics and reports.

use std::collections::BTreeSet;

use model::entities::user;
use serde::Serialize;

/// A participant with the set of days they attended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserAttendance {
    pub user_id: i64,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub group_name: String,
    pub attended_days: BTreeSet<i32>,
    pub total_days: usize,
}

impl UserAttendance {
    pub fn new(user: user::Model, attended_days: BTreeSet<i32>) -> Self {
        Self {
            user_id: user.user_id,
            last_name: user.last_name,
            first_name: user.first_name,
            middle_name: user.middle_name,
            group_name: user.group_name,
            total_days: attended_days.len(),
            attended_days,
        }
    }

    pub fn full_name(&self) -> String {
        user::format_full_name(&self.last_name, &self.first_name, self.middle_name.as_deref())
    }

    pub fn attended(&self, day_number: i32) -> bool {
        self.attended_days.contains(&day_number)
    }
}

/// A day with its attendee count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub day_number: i32,
    pub code: String,
    pub is_active: bool,
    pub attendees: u64,
}

/// Per-day counts plus the number of registered participants.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayStatistics {
    pub days: Vec<DaySummary>,
    pub registered_users: usize,
}

/// A single participant's attendance overview.
#[derive(Debug, Clone, PartialEq)]
pub struct UserStatistics {
    pub user: user::Model,
    pub attended_days: Vec<i32>,
    pub day_count: i32,
}

impl UserStatistics {
    pub fn total(&self) -> usize {
        self.attended_days.len()
    }
}

/// Everything an organizer needs at the end of the event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullReport {
    pub days: Vec<DaySummary>,
    pub participants: Vec<UserAttendance>,
    pub day_count: i32,
}
