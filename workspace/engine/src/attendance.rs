//! Attendance rules on top of the [`Store`]: day activation, code checks,
//! idempotent check-in and the reporting projections.

use model::entities::user;
use sea_orm::DbErr;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use crate::error::{EngineError, Result};
use crate::report::{DayStatistics, FullReport, UserAttendance, UserStatistics};
use crate::store::{NewUser, Store};

/// Event-specific limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of days in the event; valid day numbers are `1..=day_count`.
    pub day_count: i32,
    /// Minimum length of a day code, in characters.
    pub min_code_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_count: 5,
            min_code_len: 3,
        }
    }
}

/// Result of a check-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInOutcome {
    NotRegistered,
    NoActiveDay,
    /// The pair was already recorded. A success, not an error.
    AlreadyMarked { day: i32, total_days: usize },
    /// The code did not match; the caller may retry.
    WrongCode,
    Marked { day: i32, total_days: usize },
}

/// What the chat adapter should do before asking for a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePrompt {
    NotRegistered,
    NoActiveDay,
    AlreadyMarked(i32),
    Ready(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(user::Model),
    AlreadyRegistered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayOpened {
    pub day_number: i32,
    pub code: String,
    pub previously_active: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    Closed(i32),
    NothingToClose,
}

#[derive(Debug, Clone)]
pub struct AttendanceEngine {
    store: Store,
    config: EngineConfig,
}

impl AttendanceEngine {
    pub fn new(store: Store, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Registers a participant once. A second registration for the same id
    /// is reported as [`RegistrationOutcome::AlreadyRegistered`] and leaves
    /// the stored row untouched.
    #[instrument(skip(self, new_user), fields(user_id = new_user.user_id))]
    pub async fn register(&self, new_user: NewUser) -> Result<RegistrationOutcome> {
        new_user.validate()?;

        if !self.store.upsert_user(&new_user).await? {
            return Ok(RegistrationOutcome::AlreadyRegistered);
        }

        let user = self.store.get_user(new_user.user_id).await?.ok_or_else(|| {
            EngineError::Database(DbErr::RecordNotFound(format!(
                "user {} vanished after registration",
                new_user.user_id
            )))
        })?;
        Ok(RegistrationOutcome::Registered(user))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<user::Model>> {
        self.store.get_user(user_id).await
    }

    /// Marks `user_id` present on the active day if `code` matches.
    ///
    /// Repeated and concurrent calls with the right code produce exactly one
    /// attendance row: the first writer gets `Marked`, everybody else
    /// `AlreadyMarked`. The total is always re-read from the store.
    #[instrument(skip(self, code))]
    pub async fn check_in(&self, user_id: i64, code: &str) -> Result<CheckInOutcome> {
        if self.store.get_user(user_id).await?.is_none() {
            debug!("Check-in by unregistered user {}", user_id);
            return Ok(CheckInOutcome::NotRegistered);
        }

        let Some(day) = self.store.get_active_day().await? else {
            debug!("Check-in by user {} with no active day", user_id);
            return Ok(CheckInOutcome::NoActiveDay);
        };

        if self.store.has_attendance(user_id, day.day_number).await? {
            let total_days = self.total_days(user_id).await?;
            return Ok(CheckInOutcome::AlreadyMarked {
                day: day.day_number,
                total_days,
            });
        }

        if !day.code_matches(code) {
            info!("Wrong code from user {} for day {}", user_id, day.day_number);
            return Ok(CheckInOutcome::WrongCode);
        }

        // A concurrent submission may have inserted the row since the check
        // above; the store reports that as `false`.
        let inserted = self.store.record_attendance(user_id, day.day_number).await?;
        let total_days = self.total_days(user_id).await?;

        if inserted {
            Ok(CheckInOutcome::Marked {
                day: day.day_number,
                total_days,
            })
        } else {
            Ok(CheckInOutcome::AlreadyMarked {
                day: day.day_number,
                total_days,
            })
        }
    }

    /// Pre-check for the code entry dialog; does not modify anything.
    pub async fn code_prompt(&self, user_id: i64) -> Result<CodePrompt> {
        if self.store.get_user(user_id).await?.is_none() {
            return Ok(CodePrompt::NotRegistered);
        }
        let Some(day) = self.store.get_active_day().await? else {
            return Ok(CodePrompt::NoActiveDay);
        };
        if self.store.has_attendance(user_id, day.day_number).await? {
            return Ok(CodePrompt::AlreadyMarked(day.day_number));
        }
        Ok(CodePrompt::Ready(day.day_number))
    }

    /// Makes `day_number` the only active day, assigning it `code`.
    #[instrument(skip(self, code))]
    pub async fn open_day(&self, day_number: i32, code: &str) -> Result<DayOpened> {
        if day_number < 1 || day_number > self.config.day_count {
            return Err(EngineError::DayOutOfRange {
                day: day_number,
                max: self.config.day_count,
            });
        }

        let code = code.trim();
        if code.chars().count() < self.config.min_code_len {
            return Err(EngineError::CodeTooShort {
                min: self.config.min_code_len,
            });
        }

        let previously_active = self
            .store
            .get_active_day()
            .await?
            .map(|day| day.day_number);

        if !self.store.open_day(day_number, code).await? {
            warn!("Code for day {} collides with another day", day_number);
            return Err(EngineError::CodeInUse);
        }

        info!(
            "Opened day {} (previously active: {:?})",
            day_number, previously_active
        );
        Ok(DayOpened {
            day_number,
            code: code.to_string(),
            previously_active,
        })
    }

    #[instrument(skip(self))]
    pub async fn close_active_day(&self) -> Result<CloseOutcome> {
        let Some(day) = self.store.get_active_day().await? else {
            debug!("No active day to close");
            return Ok(CloseOutcome::NothingToClose);
        };

        self.store.close_all_days().await?;
        info!("Closed day {}", day.day_number);
        Ok(CloseOutcome::Closed(day.day_number))
    }

    /// Number of the active day, if any. Never exposes the code.
    pub async fn status(&self) -> Result<Option<i32>> {
        Ok(self
            .store
            .get_active_day()
            .await?
            .map(|day| day.day_number))
    }

    pub async fn day_statistics(&self) -> Result<DayStatistics> {
        let days = self.store.day_report().await?;
        let registered_users = self.store.count_users().await? as usize;
        Ok(DayStatistics {
            days,
            registered_users,
        })
    }

    pub async fn user_statistics(&self, user_id: i64) -> Result<Option<UserStatistics>> {
        let Some(user) = self.store.get_user(user_id).await? else {
            return Ok(None);
        };
        let attended_days = self.store.list_attended_days(user_id).await?;
        Ok(Some(UserStatistics {
            user,
            attended_days,
            day_count: self.config.day_count,
        }))
    }

    pub async fn participants(&self) -> Result<Vec<UserAttendance>> {
        self.store.attendance_report().await
    }

    pub async fn full_report(&self) -> Result<FullReport> {
        let days = self.store.day_report().await?;
        let participants = self.store.attendance_report().await?;
        Ok(FullReport {
            days,
            participants,
            day_count: self.config.day_count,
        })
    }

    /// Ids of every registered participant, for broadcasts.
    pub async fn recipients(&self) -> Result<Vec<i64>> {
        self.store.list_user_ids().await
    }

    async fn total_days(&self, user_id: i64) -> Result<usize> {
        Ok(self.store.list_attended_days(user_id).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_user, setup_engine};
    use futures::future::join_all;

    async fn registered_engine(user_id: i64) -> AttendanceEngine {
        let engine = setup_engine().await;
        let outcome = engine
            .register(new_user(user_id, "Ivanov", "Ivan"))
            .await
            .unwrap();
        assert!(matches!(outcome, RegistrationOutcome::Registered(_)));
        engine
    }

    #[tokio::test]
    async fn test_check_in_scenario() {
        let engine = registered_engine(42).await;
        engine.open_day(1, "ABC123").await.unwrap();

        assert_eq!(
            engine.check_in(42, "abc123").await.unwrap(),
            CheckInOutcome::Marked { day: 1, total_days: 1 }
        );
        assert_eq!(
            engine.check_in(42, "ABC123").await.unwrap(),
            CheckInOutcome::AlreadyMarked { day: 1, total_days: 1 }
        );
        assert_eq!(
            engine.close_active_day().await.unwrap(),
            CloseOutcome::Closed(1)
        );
        assert_eq!(
            engine.check_in(42, "ABC123").await.unwrap(),
            CheckInOutcome::NoActiveDay
        );
    }

    #[tokio::test]
    async fn test_check_in_before_any_day_is_opened() {
        let engine = registered_engine(1).await;
        assert_eq!(
            engine.check_in(1, "whatever").await.unwrap(),
            CheckInOutcome::NoActiveDay
        );
    }

    #[tokio::test]
    async fn test_check_in_requires_registration() {
        let engine = setup_engine().await;
        engine.open_day(1, "ABC123").await.unwrap();
        assert_eq!(
            engine.check_in(999, "ABC123").await.unwrap(),
            CheckInOutcome::NotRegistered
        );
        assert!(engine.store().list_attended_days(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_code_does_not_consume_the_attempt() {
        let engine = registered_engine(5).await;
        engine.open_day(2, "Secret").await.unwrap();

        assert_eq!(
            engine.check_in(5, "wrong").await.unwrap(),
            CheckInOutcome::WrongCode
        );
        assert!(!engine.store().has_attendance(5, 2).await.unwrap());

        assert_eq!(
            engine.check_in(5, " SECRET ").await.unwrap(),
            CheckInOutcome::Marked { day: 2, total_days: 1 }
        );
    }

    #[tokio::test]
    async fn test_total_days_accumulates_across_days() {
        let engine = registered_engine(5).await;
        engine.open_day(1, "one-1").await.unwrap();
        engine.check_in(5, "one-1").await.unwrap();
        engine.open_day(3, "three-3").await.unwrap();

        assert_eq!(
            engine.check_in(5, "THREE-3").await.unwrap(),
            CheckInOutcome::Marked { day: 3, total_days: 2 }
        );
    }

    #[tokio::test]
    async fn test_concurrent_check_ins_mark_exactly_once() {
        let engine = registered_engine(42).await;
        engine.open_day(1, "ABC123").await.unwrap();

        let attempts = (0..8).map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.check_in(42, "abc123").await })
        });
        let outcomes: Vec<CheckInOutcome> = join_all(attempts)
            .await
            .into_iter()
            .map(|joined| joined.expect("task panicked").expect("check-in failed"))
            .collect();

        let marked = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CheckInOutcome::Marked { .. }))
            .count();
        assert_eq!(marked, 1);
        assert!(outcomes.iter().all(|outcome| matches!(
            outcome,
            CheckInOutcome::Marked { day: 1, total_days: 1 }
                | CheckInOutcome::AlreadyMarked { day: 1, total_days: 1 }
        )));
        assert_eq!(engine.store().list_attended_days(42).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_already_recorded_pair_reports_already_marked() {
        let engine = registered_engine(8).await;
        engine.open_day(4, "FOUR").await.unwrap();
        // Simulates the other entry point winning the race.
        assert!(engine.store().record_attendance(8, 4).await.unwrap());

        assert_eq!(
            engine.check_in(8, "four").await.unwrap(),
            CheckInOutcome::AlreadyMarked { day: 4, total_days: 1 }
        );
    }

    #[tokio::test]
    async fn test_open_day_switches_active_day() {
        let engine = setup_engine().await;

        let first = engine.open_day(1, "C1C1").await.unwrap();
        assert_eq!(first.previously_active, None);
        let second = engine.open_day(2, "C2C2").await.unwrap();
        assert_eq!(second.previously_active, Some(1));

        assert_eq!(engine.status().await.unwrap(), Some(2));
        let days = engine.store().list_days().await.unwrap();
        assert_eq!(days.iter().filter(|day| day.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_open_day_validation() {
        let engine = setup_engine().await;

        assert!(matches!(
            engine.open_day(0, "ABC").await,
            Err(EngineError::DayOutOfRange { day: 0, max: 5 })
        ));
        assert!(matches!(
            engine.open_day(6, "ABC").await,
            Err(EngineError::DayOutOfRange { day: 6, max: 5 })
        ));
        assert!(matches!(
            engine.open_day(1, " ab ").await,
            Err(EngineError::CodeTooShort { min: 3 })
        ));
        assert_eq!(engine.status().await.unwrap(), None);

        let opened = engine.open_day(5, "  xyz  ").await.unwrap();
        assert_eq!(opened.code, "xyz");
    }

    #[tokio::test]
    async fn test_open_day_with_code_of_another_day() {
        let engine = setup_engine().await;
        engine.open_day(1, "SAME").await.unwrap();

        assert!(matches!(
            engine.open_day(2, "SAME").await,
            Err(EngineError::CodeInUse)
        ));
        assert_eq!(engine.status().await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_close_without_active_day() {
        let engine = setup_engine().await;
        assert_eq!(
            engine.close_active_day().await.unwrap(),
            CloseOutcome::NothingToClose
        );
    }

    #[tokio::test]
    async fn test_re_registration_keeps_existing_record() {
        let engine = registered_engine(42).await;

        let outcome = engine
            .register(NewUser::new(42, "Other", "Name", Some("X"), "G-999"))
            .await
            .unwrap();
        assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered);

        let user = engine.get_user(42).await.unwrap().unwrap();
        assert_eq!(user.last_name, "Ivanov");
        assert_eq!(user.group_name, "G-101");
        assert_eq!(user.middle_name, None);
    }

    #[tokio::test]
    async fn test_register_validates_fields() {
        let engine = setup_engine().await;

        let result = engine
            .register(NewUser::new(1, "I", "Ivan", None, "G-1"))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));

        let result = engine
            .register(NewUser::new(1, "Ivanov", "Ivan", None, " "))
            .await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(engine.get_user(1).await.unwrap().is_none());

        // Lengths are counted in characters, not bytes.
        let result = engine
            .register(NewUser::new(1, "Ли", "Ян", None, "ИУ"))
            .await
            .unwrap();
        assert!(matches!(result, RegistrationOutcome::Registered(_)));
    }

    #[tokio::test]
    async fn test_code_prompt() {
        let engine = setup_engine().await;
        assert_eq!(engine.code_prompt(3).await.unwrap(), CodePrompt::NotRegistered);

        engine.register(new_user(3, "Ivanov", "Ivan")).await.unwrap();
        assert_eq!(engine.code_prompt(3).await.unwrap(), CodePrompt::NoActiveDay);

        engine.open_day(2, "TWO").await.unwrap();
        assert_eq!(engine.code_prompt(3).await.unwrap(), CodePrompt::Ready(2));

        engine.check_in(3, "two").await.unwrap();
        assert_eq!(
            engine.code_prompt(3).await.unwrap(),
            CodePrompt::AlreadyMarked(2)
        );
    }

    #[tokio::test]
    async fn test_statistics() {
        let engine = setup_engine().await;
        engine.register(new_user(1, "Borisov", "Boris")).await.unwrap();
        engine.register(new_user(2, "Antonov", "Anton")).await.unwrap();

        engine.open_day(1, "DAY1").await.unwrap();
        engine.check_in(1, "day1").await.unwrap();
        engine.check_in(2, "day1").await.unwrap();
        engine.open_day(2, "DAY2").await.unwrap();
        engine.check_in(1, "day2").await.unwrap();

        let stats = engine.day_statistics().await.unwrap();
        assert_eq!(stats.registered_users, 2);
        assert_eq!(
            stats.days.iter().map(|day| day.attendees).collect::<Vec<_>>(),
            vec![2, 1]
        );

        let personal = engine.user_statistics(1).await.unwrap().unwrap();
        assert_eq!(personal.attended_days, vec![1, 2]);
        assert_eq!(personal.total(), 2);
        assert_eq!(personal.day_count, 5);
        assert!(engine.user_statistics(77).await.unwrap().is_none());

        let report = engine.full_report().await.unwrap();
        assert_eq!(report.participants.len(), 2);
        assert_eq!(report.participants[0].last_name, "Antonov");
        assert!(report.participants[0].attended(1));
        assert!(!report.participants[0].attended(2));
        assert_eq!(report.days.len(), 2);

        assert_eq!(engine.recipients().await.unwrap(), vec![1, 2]);
    }
}
