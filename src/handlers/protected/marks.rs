use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension, Json,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::{CreateMarkRequest, Mark, UpdateMarkRequest};
use crate::database::RecordFilter;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/marks?studentId&subjectId&semester - newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<RecordFilter>, QueryRejection>,
) -> ApiResult<Vec<Mark>> {
    let Query(filter) = query?;
    let marks = state.queries.list_marks(&user.identity(), &filter).await?;
    Ok(ApiResponse::success(marks))
}

/// POST /api/marks - create a mark row and mirror it on the student
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateMarkRequest>, JsonRejection>,
) -> ApiResult<Mark> {
    let Json(request) = payload?;
    let mark = state.coordinator.add_mark(&user.identity(), request).await?;
    Ok(ApiResponse::created(mark))
}

/// PUT /api/marks/:id - merge the given fields and recompute total/grade
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateMarkRequest>, JsonRejection>,
) -> ApiResult<Mark> {
    let Path(id) = id?;
    let Json(request) = payload?;
    let mark = state.coordinator.update_mark(&user.identity(), id, request).await?;
    Ok(ApiResponse::success(mark))
}
