//! Durable storage for participants, event days and attendance.
//!
//! Every exclusivity rule lives in the schema: the users primary key, the
//! unique day code, the single-active-day index and the composite
//! attendance key. Operations here never check-then-write; they attempt the
//! write and translate a constraint rejection into a `false` result, which
//! keeps them correct when the chat bot and the HTTP API race each other.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use model::entities::{attendance, event_day, user};
use sea_orm::{
    sea_query::{Expr, Func, OnConflict},
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::error::{is_active_day_violation, is_unique_violation, Result};
use crate::report::{DaySummary, UserAttendance};

/// Registration data for a new participant.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct NewUser {
    pub user_id: i64,
    #[validate(length(min = 2))]
    pub last_name: String,
    #[validate(length(min = 2))]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[validate(length(min = 2))]
    pub group_name: String,
}

impl NewUser {
    /// Builds the registration data, trimming every field. A blank middle
    /// name is stored as absent.
    pub fn new(
        user_id: i64,
        last_name: &str,
        first_name: &str,
        middle_name: Option<&str>,
        group_name: &str,
    ) -> Self {
        Self {
            user_id,
            last_name: last_name.trim().to_string(),
            first_name: first_name.trim().to_string(),
            middle_name: middle_name
                .map(str::trim)
                .filter(|middle| !middle.is_empty())
                .map(str::to_string),
            group_name: group_name.trim().to_string(),
        }
    }
}

/// Tries before giving up on a day opening that keeps losing races.
const OPEN_DAY_ATTEMPTS: u32 = 3;

#[derive(Debug, FromQueryResult)]
struct DayAttendeeCount {
    day_number: i32,
    attendees: i64,
}

/// SeaORM-backed store. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
}

impl Store {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Inserts a participant. Returns `false` when the id is already
    /// registered; an existing row is never overwritten.
    #[instrument(skip(self, new_user), fields(user_id = new_user.user_id))]
    pub async fn upsert_user(&self, new_user: &NewUser) -> Result<bool> {
        trace!("Inserting user");
        let model = user::ActiveModel {
            user_id: Set(new_user.user_id),
            last_name: Set(new_user.last_name.clone()),
            first_name: Set(new_user.first_name.clone()),
            middle_name: Set(new_user.middle_name.clone()),
            group_name: Set(new_user.group_name.clone()),
            registered_at: Set(Utc::now()),
        };

        match user::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => {
                info!("User {} registered", new_user.user_id);
                Ok(true)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("User {} is already registered", new_user.user_id);
                Ok(false)
            }
            Err(err) => {
                error!("Failed to insert user {}: {}", new_user.user_id, err);
                Err(err.into())
            }
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(user_id).one(&self.db).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<user::Model>> {
        Ok(user::Entity::find()
            .order_by_asc(user::Column::LastName)
            .order_by_asc(user::Column::FirstName)
            .all(&self.db)
            .await?)
    }

    pub async fn list_user_ids(&self) -> Result<Vec<i64>> {
        Ok(user::Entity::find()
            .select_only()
            .column(user::Column::UserId)
            .order_by_asc(user::Column::UserId)
            .into_tuple::<i64>()
            .all(&self.db)
            .await?)
    }

    pub async fn count_users(&self) -> Result<u64> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    /// Deactivates every day and activates `day_number` with `code`, creating
    /// the day if needed, in a single transaction.
    ///
    /// Returns `false` if the code is already taken by another day; in that
    /// case nothing changes, including the previously active day. A
    /// transaction that loses a race with a concurrent opening is retried, so
    /// the last opening wins.
    #[instrument(skip(self, code))]
    pub async fn open_day(&self, day_number: i32, code: &str) -> Result<bool> {
        let mut attempt = 1;
        loop {
            match self.try_open_day(day_number, code).await {
                Ok(()) => {
                    info!("Day {} is now active", day_number);
                    return Ok(true);
                }
                Err(err) if is_active_day_violation(&err) && attempt < OPEN_DAY_ATTEMPTS => {
                    debug!(
                        "Concurrent day opening won the race, retrying day {} (attempt {})",
                        day_number, attempt
                    );
                    attempt += 1;
                }
                Err(err) if is_unique_violation(&err) && !is_active_day_violation(&err) => {
                    warn!("Could not open day {}: code already in use", day_number);
                    return Ok(false);
                }
                Err(err) => {
                    error!("Failed to open day {}: {}", day_number, err);
                    return Err(err.into());
                }
            }
        }
    }

    async fn try_open_day(&self, day_number: i32, code: &str) -> std::result::Result<(), DbErr> {
        let txn = self.db.begin().await?;

        let result: std::result::Result<(), DbErr> = async {
            let deactivated = event_day::Entity::update_many()
                .col_expr(event_day::Column::IsActive, Expr::value(false))
                .filter(event_day::Column::IsActive.eq(true))
                .exec(&txn)
                .await?;
            trace!("Deactivated {} day(s)", deactivated.rows_affected);

            let day = event_day::ActiveModel {
                day_number: Set(day_number),
                code: Set(code.to_string()),
                is_active: Set(true),
                created_at: Set(Utc::now()),
            };
            event_day::Entity::insert(day)
                .on_conflict(
                    OnConflict::column(event_day::Column::DayNumber)
                        .update_columns([event_day::Column::Code, event_day::Column::IsActive])
                        .to_owned(),
                )
                .exec_without_returning(&txn)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => txn.commit().await,
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }

    /// Clears the active flag everywhere. Returns the number of days that
    /// were active (0 or 1).
    #[instrument(skip(self))]
    pub async fn close_all_days(&self) -> Result<u64> {
        let result = event_day::Entity::update_many()
            .col_expr(event_day::Column::IsActive, Expr::value(false))
            .filter(event_day::Column::IsActive.eq(true))
            .exec(&self.db)
            .await?;
        debug!("Closed {} day(s)", result.rows_affected);
        Ok(result.rows_affected)
    }

    pub async fn get_active_day(&self) -> Result<Option<event_day::Model>> {
        Ok(event_day::Entity::find()
            .filter(event_day::Column::IsActive.eq(true))
            .one(&self.db)
            .await?)
    }

    pub async fn get_day(&self, day_number: i32) -> Result<Option<event_day::Model>> {
        Ok(event_day::Entity::find_by_id(day_number).one(&self.db).await?)
    }

    pub async fn list_days(&self) -> Result<Vec<event_day::Model>> {
        Ok(event_day::Entity::find()
            .order_by_asc(event_day::Column::DayNumber)
            .all(&self.db)
            .await?)
    }

    /// Inserts an attendance row. Returns `false` when the pair is already
    /// recorded, as reported by the composite key.
    #[instrument(skip(self))]
    pub async fn record_attendance(&self, user_id: i64, day_number: i32) -> Result<bool> {
        let record = attendance::ActiveModel {
            user_id: Set(user_id),
            day_number: Set(day_number),
            marked_at: Set(Utc::now()),
        };

        match attendance::Entity::insert(record)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => {
                info!("User {} marked on day {}", user_id, day_number);
                Ok(true)
            }
            Err(err) if is_unique_violation(&err) => {
                debug!("User {} was already marked on day {}", user_id, day_number);
                Ok(false)
            }
            Err(err) => {
                error!(
                    "Failed to record attendance of user {} on day {}: {}",
                    user_id, day_number, err
                );
                Err(err.into())
            }
        }
    }

    pub async fn has_attendance(&self, user_id: i64, day_number: i32) -> Result<bool> {
        Ok(attendance::Entity::find_by_id((user_id, day_number))
            .one(&self.db)
            .await?
            .is_some())
    }

    pub async fn list_attended_days(&self, user_id: i64) -> Result<Vec<i32>> {
        Ok(attendance::Entity::find()
            .select_only()
            .column(attendance::Column::DayNumber)
            .filter(attendance::Column::UserId.eq(user_id))
            .order_by_asc(attendance::Column::DayNumber)
            .into_tuple::<i32>()
            .all(&self.db)
            .await?)
    }

    /// Every participant with their attended days, ordered by last name and
    /// then first name. Participants without attendance are included.
    #[instrument(skip(self))]
    pub async fn attendance_report(&self) -> Result<Vec<UserAttendance>> {
        // Both reads share one transaction so the report is a single snapshot.
        let txn = self.db.begin().await?;
        let users = user::Entity::find()
            .order_by_asc(user::Column::LastName)
            .order_by_asc(user::Column::FirstName)
            .all(&txn)
            .await?;
        let rows = attendance::Entity::find().all(&txn).await?;
        txn.commit().await?;

        let mut days_by_user: BTreeMap<i64, BTreeSet<i32>> = BTreeMap::new();
        for row in rows {
            days_by_user
                .entry(row.user_id)
                .or_default()
                .insert(row.day_number);
        }

        let report = users
            .into_iter()
            .map(|user| {
                let days = days_by_user.remove(&user.user_id).unwrap_or_default();
                UserAttendance::new(user, days)
            })
            .collect::<Vec<_>>();
        debug!("Attendance report covers {} user(s)", report.len());
        Ok(report)
    }

    /// Every day with its attendee count, ordered by day number.
    #[instrument(skip(self))]
    pub async fn day_report(&self) -> Result<Vec<DaySummary>> {
        let txn = self.db.begin().await?;
        let days = event_day::Entity::find()
            .order_by_asc(event_day::Column::DayNumber)
            .all(&txn)
            .await?;
        let counts: Vec<DayAttendeeCount> = attendance::Entity::find()
            .select_only()
            .column(attendance::Column::DayNumber)
            .column_as(
                Expr::expr(Func::count(Expr::col(attendance::Column::UserId))),
                "attendees",
            )
            .group_by(attendance::Column::DayNumber)
            .into_model::<DayAttendeeCount>()
            .all(&txn)
            .await?;
        txn.commit().await?;

        let counts: BTreeMap<i32, i64> = counts
            .into_iter()
            .map(|row| (row.day_number, row.attendees))
            .collect();

        Ok(days
            .into_iter()
            .map(|day| DaySummary {
                attendees: counts.get(&day.day_number).copied().unwrap_or(0).max(0) as u64,
                day_number: day.day_number,
                code: day.code,
                is_active: day.is_active,
            })
            .collect())
    }
}
