// handlers/protected/auth/whoami.rs - GET /api/auth/whoami handler
use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::Identity;

/// GET /api/auth/whoami - identity carried by the bearer token
///
/// ```json
/// { "success": true, "data": { "id": "uuid", "role": "teacher" } }
/// ```
pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<Identity> {
    Ok(ApiResponse::success(user.identity()))
}
