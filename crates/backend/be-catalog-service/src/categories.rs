use std::sync::Arc;

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use be_remote_db::{Card, Category};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, DeletedResponse, error::CatalogError};

/// Newest cards shown per category on the landing listing.
pub const CARDS_PER_CATEGORY: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRequest {
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
}

impl CategoryRequest {
    fn id(&self) -> Result<i64, CatalogError> {
        self.category_id
            .ok_or_else(|| CatalogError::InvalidInput("categoryId is required".into()))
    }

    fn name(&self) -> Result<&str, CatalogError> {
        self.category_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CatalogError::InvalidInput("categoryName is required".into()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCategory {
    pub category_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CategoryWithCards {
    #[serde(flatten)]
    pub category: Category,
    pub cards: Vec<Card>,
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, CatalogError> {
    Ok(Json(state.db.list_categories().await?))
}

pub async fn list_categories_with_cards(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CategoryWithCards>>, CatalogError> {
    let grouped = state
        .db
        .list_categories_with_cards()
        .per_category(CARDS_PER_CATEGORY)
        .call()
        .await?;

    Ok(Json(
        grouped
            .into_iter()
            .map(|(category, cards)| CategoryWithCards { category, cards })
            .collect(),
    ))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedCategory>), CatalogError> {
    let Json(body) = payload?;
    let name = body.name()?;

    let category = state.db.create_category().name(name).call().await?;
    info!(category_id = category.id, "Category created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedCategory {
            category_id: category.id,
        }),
    ))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<Category>, CatalogError> {
    let Json(body) = payload?;
    let category_id = body.id()?;
    let name = body.name()?;

    let category = state
        .db
        .update_category()
        .category_id(category_id)
        .name(name)
        .call()
        .await?;
    info!(category_id, "Category updated");

    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<DeletedResponse>, CatalogError> {
    let Json(body) = payload?;
    let category_id = body.id()?;

    state
        .db
        .delete_category()
        .category_id(category_id)
        .call()
        .await?;
    info!(category_id, "Category deleted");

    Ok(Json(DeletedResponse::new("Category deleted")))
}
