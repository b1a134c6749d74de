use std::sync::Arc;

use axum::{Router, extract::DefaultBodyLimit, routing::get};
use be_remote_db::DatabaseManager;
use be_storage::StorageService;
use serde::Serialize;
use tracing::debug;

pub mod error;
pub mod favorites;
pub mod form;
pub mod handlers;
pub mod store;
pub mod validator;

pub use error::CardError;
pub use store::CardStore;
pub use validator::{CardDraft, ValidatedCard, ValidationError, validate_card};

/// Upper bound for one card form including its photos.
pub const MAX_FORM_BYTES: usize = 25 * 1024 * 1024;

pub struct AppState<S> {
    pub store: Arc<S>,
    pub storage: Arc<StorageService>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub fn create_router<S: CardStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route(
            "/api/cards",
            get(handlers::get_cards::<S>)
                .post(handlers::create_card::<S>)
                .put(handlers::update_card::<S>)
                .delete(handlers::delete_card::<S>),
        )
        .route(
            "/api/favorites",
            get(favorites::list_favorites::<S>)
                .post(favorites::add_favorite::<S>)
                .delete(favorites::remove_favorite::<S>),
        )
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .with_state(state)
}

pub fn init_card_service(db: Arc<DatabaseManager>, storage: Arc<StorageService>) -> Router {
    debug!(backend = storage.config().backend_name(), "Initializing card service");

    create_router(Arc::new(AppState { store: db, storage }))
}
