use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tracing::debug;

/// Error types for the attendance engine.
///
/// Business-rule rejections (wrong code, no active day, ...) are not errors;
/// they are reported through the outcome enums of [`crate::attendance`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Input failed field validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Day number outside of the configured range
    #[error("Day {day} is outside of the valid range 1..={max}")]
    DayOutOfRange { day: i32, max: i32 },

    /// Day code shorter than the configured minimum
    #[error("Code must contain at least {min} characters")]
    CodeTooShort { min: usize },

    /// Another day already uses the code
    #[error("Code is already assigned to another day")]
    CodeInUse,
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect::<Vec<_>>();
        let err = EngineError::Validation(format!("invalid fields: {}", fields.join(", ")));
        debug!(?err, "Validation failed");
        err
    }
}

/// True when the storage layer rejected a write because of a unique or
/// primary key constraint.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let message = err.to_string().to_lowercase();
    message.contains("unique constraint") || message.contains("duplicate key")
}

/// True when the write lost a race for the single-active-day index, as
/// opposed to colliding on a day code. SQLite names the column, Postgres the
/// index.
pub(crate) fn is_active_day_violation(err: &DbErr) -> bool {
    if !is_unique_violation(err) {
        return false;
    }
    let message = err.to_string();
    message.contains("ux_event_days_single_active") || message.contains("event_days.is_active")
}

/// Type alias for Result with EngineError
pub type Result<T> = std::result::Result<T, EngineError>;
