use engine::AttendanceEngine;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use validator::{Validate, ValidationError};

use crate::identity::InitDataVerifier;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Attendance rules on top of the store
    pub engine: AttendanceEngine,
    /// Verifies mini-app identity assertions
    pub verifier: InitDataVerifier,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Check-in request sent by the mini-app
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CheckInRequest {
    /// Day code typed by the participant
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub code: String,
    /// Signed identity assertion from the chat platform
    #[serde(default, rename = "initData", alias = "identityAssertion")]
    pub init_data: String,
}

/// Check-in result. Errors carry `error`, successes carry `message`.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CheckInResponse {
    /// Whether the participant is (now or already) marked present
    pub success: bool,
    /// Set when the participant had been marked before this request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_marked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Active day number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
    /// Number of days the participant attended so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_days: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckInResponse {
    pub fn marked(day: i32, total_days: usize) -> Self {
        Self {
            success: true,
            message: Some(format!("Вы отмечены на День {day}!")),
            day: Some(day),
            total_days: Some(total_days),
            ..Self::default()
        }
    }

    pub fn already_marked(day: i32, total_days: usize) -> Self {
        Self {
            success: true,
            already_marked: Some(true),
            message: Some(format!("Вы уже отмечены на День {day}")),
            day: Some(day),
            total_days: Some(total_days),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Whether a day is currently open for check-in
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<i32>,
}

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::attendance::get_status,
        crate::handlers::attendance::check_in
    ),
    components(schemas(
        CheckInRequest,
        CheckInResponse,
        StatusResponse,
        ErrorResponse,
        HealthResponse
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "attendance", description = "Day status and mini-app check-in")
    ),
    info(
        title = "Rollcall API",
        version = "0.1.0",
        description = "Attendance tracking for multi-day events"
    )
)]
pub struct ApiDoc;
