use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use be_authz::JwtConfig;
use be_remote_db::DatabaseManager;
use tracing::debug;

pub mod error;
pub mod handlers;
pub mod password;

pub use error::AuthError;

pub struct AppState {
    pub db: Arc<DatabaseManager>,
    pub jwt_config: Arc<JwtConfig>,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .with_state(state)
}

pub fn init_auth_service(db: Arc<DatabaseManager>, jwt_config: Arc<JwtConfig>) -> Router {
    debug!("Initializing auth service");

    create_router(Arc::new(AppState { db, jwt_config }))
}
