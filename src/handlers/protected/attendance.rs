use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{Attendance, CreateAttendanceRequest, UpdateAttendanceRequest};
use crate::database::RecordFilter;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/attendance?studentId&subjectId&semester
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<RecordFilter>, QueryRejection>,
) -> ApiResult<Vec<Attendance>> {
    let Query(filter) = query?;
    let records = state.queries.list_attendance(&user.identity(), &filter).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/attendance
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateAttendanceRequest>, JsonRejection>,
) -> ApiResult<Attendance> {
    let Json(request) = payload?;
    let record = state.coordinator.add_attendance(&user.identity(), request).await?;
    Ok(ApiResponse::created(record))
}

/// PUT /api/attendance/:id - percentage is always recomputed
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateAttendanceRequest>, JsonRejection>,
) -> ApiResult<Attendance> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let record = state.coordinator.update_attendance(&user.identity(), id, request).await?;
    Ok(ApiResponse::success(record))
}
