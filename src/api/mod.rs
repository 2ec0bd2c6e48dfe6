mod handlers;
mod middleware;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::ai::{CompletionOptions, CompletionProvider, TaskBreakdown};
use crate::db::Database;

pub use handlers::{BreakdownResponse, BreakdownTaskInput};
pub use middleware::{auth_middleware, CurrentUser, SecurityConfig, USER_ID_HEADER};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub breakdown: TaskBreakdown,
}

impl AppState {
    pub fn new(db: Database, provider: Arc<dyn CompletionProvider>) -> Self {
        Self::with_options(db, provider, CompletionOptions::default())
    }

    pub fn with_options(
        db: Database,
        provider: Arc<dyn CompletionProvider>,
        options: CompletionOptions,
    ) -> Self {
        let breakdown = TaskBreakdown::new(Arc::new(db.clone()), provider).with_options(options);
        Self { db, breakdown }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for TaskBreakdown {
    fn from_ref(state: &AppState) -> Self {
        state.breakdown.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    create_router_with_config(state, SecurityConfig::disabled())
}

pub fn create_router_with_config(state: AppState, security: SecurityConfig) -> Router {
    let protected = Router::new()
        // Tasks
        .route("/tasks", get(handlers::list_tasks).post(handlers::create_task))
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        .route("/tasks/{id}/subtasks", get(handlers::list_subtasks))
        // Breakdown
        .route("/tasks/{id}/breakdown", post(handlers::breakdown_task))
        .route_layer(from_fn_with_state(security.clone(), auth_middleware));

    let api = Router::new()
        .merge(protected)
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(security.cors_layer())
        .with_state(state)
}
