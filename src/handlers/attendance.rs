use axum::{
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use engine::CheckInOutcome;
use tracing::{debug, error, info, instrument, trace, warn};
use validator::Validate;

use crate::schemas::{AppState, CheckInRequest, CheckInResponse, StatusResponse};

type CheckInReply = (StatusCode, Json<CheckInResponse>);

fn reject(status: StatusCode, message: &str) -> CheckInReply {
    (status, Json(CheckInResponse::error(message)))
}

/// Report whether a day is open for check-in
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "attendance",
    responses(
        (status = 200, description = "Current day status", body = StatusResponse),
        (status = 500, description = "Internal server error")
    )
)]
#[instrument(skip(state))]
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, StatusCode> {
    trace!("Entering get_status function");
    match state.engine.status().await {
        Ok(day) => {
            debug!("Active day: {:?}", day);
            Ok(Json(StatusResponse {
                active: day.is_some(),
                day,
            }))
        }
        Err(e) => {
            error!("Failed to read active day: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Mark the asserted participant present on the active day
#[utoipa::path(
    post,
    path = "/api/check-in",
    tag = "attendance",
    request_body = CheckInRequest,
    responses(
        (status = 200, description = "Marked, or already marked", body = CheckInResponse),
        (status = 400, description = "Missing code, not registered, no active day or wrong code", body = CheckInResponse),
        (status = 401, description = "Identity assertion failed verification", body = CheckInResponse),
        (status = 500, description = "Internal server error", body = CheckInResponse)
    )
)]
#[instrument(skip(state, payload))]
pub async fn check_in(
    State(state): State<AppState>,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> CheckInReply {
    trace!("Entering check_in function");

    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            debug!("Rejected check-in body: {}", rejection);
            return reject(StatusCode::BAD_REQUEST, "Неверный формат данных");
        }
    };

    if request.validate().is_err() {
        debug!("Check-in without a code");
        return reject(StatusCode::BAD_REQUEST, "Код не указан");
    }

    let verified = match state.verifier.verify(&request.init_data) {
        Ok(verified) => verified,
        Err(e) => {
            warn!("Rejected identity assertion: {}", e);
            return reject(StatusCode::UNAUTHORIZED, "Ошибка авторизации");
        }
    };
    let user_id = verified.user.id;
    debug!("Check-in attempt by user {}", user_id);

    match state.engine.check_in(user_id, &request.code).await {
        Ok(CheckInOutcome::Marked { day, total_days }) => {
            info!("User {} checked in on day {} via mini-app", user_id, day);
            (StatusCode::OK, Json(CheckInResponse::marked(day, total_days)))
        }
        Ok(CheckInOutcome::AlreadyMarked { day, total_days }) => (
            StatusCode::OK,
            Json(CheckInResponse::already_marked(day, total_days)),
        ),
        Ok(CheckInOutcome::NotRegistered) => reject(
            StatusCode::BAD_REQUEST,
            "Вы не зарегистрированы. Отправьте боту /start",
        ),
        Ok(CheckInOutcome::NoActiveDay) => {
            reject(StatusCode::BAD_REQUEST, "Сейчас нет активного дня")
        }
        Ok(CheckInOutcome::WrongCode) => reject(StatusCode::BAD_REQUEST, "Неверный код"),
        Err(e) => {
            error!("Check-in for user {} failed: {}", user_id, e);
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Внутренняя ошибка сервера")
        }
    }
}
