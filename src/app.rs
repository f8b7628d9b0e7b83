use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, SecurityConfig};
use crate::database::GradebookStore;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, require_staff};
use crate::services::{GradebookQueries, WriteCoordinator};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn GradebookStore>,
    pub coordinator: Arc<WriteCoordinator>,
    pub queries: Arc<GradebookQueries>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<dyn GradebookStore>, config: &AppConfig) -> Self {
        Self {
            coordinator: Arc::new(WriteCoordinator::from_config(store.clone(), config)),
            queries: Arc::new(GradebookQueries::new(store.clone())),
            jwt_secret: Arc::from(config.security.jwt_secret.as_str()),
            store,
        }
    }
}

pub fn router(state: AppState, config: &AppConfig) -> Router {
    let app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected API
        .merge(api_routes(state.clone()))
        .with_state(state)
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
                .layer(cors_layer(&config.security)),
        );

    if config.api.enable_request_logging {
        app.layer(TraceLayer::new_for_http())
    } else {
        app
    }
}

fn api_routes(state: AppState) -> Router<AppState> {
    use protected::{attendance, auth, marks, students};

    // Layers added later run first, so the JWT check precedes the staff gate
    let staff = || middleware::from_fn(require_staff);

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route(
            "/api/marks",
            get(marks::list).merge(post(marks::create).route_layer(staff())),
        )
        .route("/api/marks/:id", put(marks::update).route_layer(staff()))
        .route(
            "/api/attendance",
            get(attendance::list).merge(post(attendance::create).route_layer(staff())),
        )
        .route("/api/attendance/:id", put(attendance::update).route_layer(staff()))
        .route("/api/students/top", get(students::top).route_layer(staff()))
        .route("/api/students/:id/summary", get(students::summary))
        .route("/api/students/:id/reconcile", post(students::reconcile).route_layer(staff()))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

/// No origins are allowed when CORS is disabled
fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
