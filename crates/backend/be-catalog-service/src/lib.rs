use std::sync::Arc;

use axum::{Router, routing::get};
use be_remote_db::DatabaseManager;
use serde::Serialize;
use tracing::debug;

pub mod categories;
pub mod error;
pub mod promotions;
pub mod tariffs;

pub use error::CatalogError;

pub struct AppState {
    pub db: Arc<DatabaseManager>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: &'static str,
}

impl DeletedResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/categories",
            get(categories::list_categories)
                .post(categories::create_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        .route(
            "/api/categories/with_cards",
            get(categories::list_categories_with_cards),
        )
        .route(
            "/api/tariffs",
            get(tariffs::list_tariffs)
                .post(tariffs::create_tariff)
                .put(tariffs::update_tariff)
                .delete(tariffs::delete_tariff),
        )
        .route(
            "/api/promotions",
            get(promotions::list_promotions)
                .post(promotions::create_promotion)
                .put(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
        .with_state(state)
}

pub fn init_catalog_service(db: Arc<DatabaseManager>) -> Router {
    debug!("Initializing catalog service");

    create_router(Arc::new(AppState { db }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;

    /// Backed by a pool that never connects; only pre-query rejections are exercised.
    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        create_router(Arc::new(AppState {
            db: Arc::new(DatabaseManager { pool }),
        }))
    }

    async fn send(method: &str, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json["message"].as_str().unwrap_or_default().to_string())
    }

    #[tokio::test]
    async fn tariff_with_inverted_bounds_is_400() {
        let (status, message) = send(
            "POST",
            "/api/tariffs",
            serde_json::json!({ "tariffName": "Broken", "minPhones": 4, "maxPhones": 2 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "minPhones (4) cannot exceed maxPhones (2)");
    }

    #[tokio::test]
    async fn tariff_update_requires_id() {
        let (status, message) =
            send("PUT", "/api/tariffs", serde_json::json!({ "price": 10 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "tariffId is required");
    }

    #[tokio::test]
    async fn category_create_requires_name() {
        let (status, message) = send("POST", "/api/categories", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "categoryName is required");
    }

    #[tokio::test]
    async fn promotion_delete_requires_id() {
        let (status, message) = send("DELETE", "/api/promotions", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "promotionId is required");
    }

    #[tokio::test]
    async fn promotion_with_zero_duration_is_400() {
        let (status, message) = send(
            "POST",
            "/api/promotions",
            serde_json::json!({ "name": "Boost", "durationDays": 0, "price": 100 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "durationDays must be at least 1");
    }
}
