use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Extension,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::database::models::Student;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{RankedStudent, StudentSummary};

/// GET /api/students/:id/summary - dashboard view; students only see their own
pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<StudentSummary> {
    let Path(id) = id?;
    let summary = state.queries.student_summary(&user.identity(), id).await?;
    Ok(ApiResponse::success(summary))
}

/// POST /api/students/:id/reconcile - rebuild the aggregate from the record tables
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Student> {
    let Path(id) = id?;
    let student = state.coordinator.rebuild_aggregate(&user.identity(), id).await?;
    Ok(ApiResponse::success(student))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudentsQuery {
    pub limit: Option<usize>,
}

/// GET /api/students/top?limit=N - cgpa leaderboard, staff only
pub async fn top(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    query: Result<Query<TopStudentsQuery>, QueryRejection>,
) -> ApiResult<Vec<RankedStudent>> {
    let Query(query) = query?;
    let ranked = state.queries.top_students(&user.identity(), query.limit).await?;
    Ok(ApiResponse::success(ranked))
}
